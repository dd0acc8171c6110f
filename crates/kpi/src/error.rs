use thiserror::Error;

use crate::model::KpiKind;

#[derive(Debug, Error)]
pub enum KpiError {
    /// TOML parse / deserialization error in a KPI table.
    #[error("KPI table parse error: {0}")]
    TableParse(String),
    /// A category rule that cannot be evaluated for its category.
    #[error("KPI table: {kind} cannot use strategy '{strategy}'")]
    UnsupportedStrategy { kind: KpiKind, strategy: &'static str },
    /// Rule parameters out of range (empty token, zero quota).
    #[error("KPI table: {kind}: {message}")]
    InvalidRule { kind: KpiKind, message: String },
    /// Product row rejected by the implementation form.
    #[error("product row: {0}")]
    InvalidProduct(String),
    /// Submitting a form session with no product rows.
    #[error("no product rows to submit for PDV '{0}'")]
    EmptyDraft(String),
    /// Unparseable filter value (date, compliance band, KPI name).
    #[error("invalid filter value for '{field}': {value}")]
    InvalidFilter { field: &'static str, value: String },
}
