//! Per-category aggregation rules.
//!
//! The dashboards do not agree on one formula: coverage and price count
//! successes, volume sums targets and actuals, visits either sum visit
//! events or count distinct PDVs against a fixed quota. Each category
//! gets one named rule here, chosen by configuration.

use serde::{Deserialize, Serialize};

use crate::error::KpiError;
use crate::model::KpiKind;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Aggregation {
    /// `meta` = number of records, `real` = records whose `estado` equals `token`.
    CountOfSuccess { token: String },
    /// `meta` = Σ target, `real` = Σ actual.
    SumOfFields,
    /// `meta` = `quota`, `real` = distinct PDV codes with at least one visit.
    DistinctPdvs { quota: u32 },
}

impl Aggregation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CountOfSuccess { .. } => "count_of_success",
            Self::SumOfFields => "sum_of_fields",
            Self::DistinctPdvs { .. } => "distinct_pdvs",
        }
    }

    /// Whether records of `kind` carry the fields this rule reads.
    pub fn supports(&self, kind: KpiKind) -> bool {
        match self {
            Self::CountOfSuccess { .. } => true,
            Self::SumOfFields => matches!(kind, KpiKind::Volume | KpiKind::Visits),
            Self::DistinctPdvs { .. } => kind == KpiKind::Visits,
        }
    }
}

/// Upper bound applied to the displayed percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clamp {
    #[default]
    None,
    AtHundred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub aggregation: Aggregation,
    #[serde(default)]
    pub clamp: Clamp,
}

impl CategoryRule {
    pub fn new(aggregation: Aggregation, clamp: Clamp) -> Self {
        Self { aggregation, clamp }
    }

    /// Status token that marks a record as completed, if the rule uses one.
    pub fn success_token(&self) -> Option<&str> {
        match &self.aggregation {
            Aggregation::CountOfSuccess { token } => Some(token),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Category → rule mapping shared by the OT and Mercadeo dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiTable {
    pub cobertura: CategoryRule,
    pub volumen: CategoryRule,
    pub visitas: CategoryRule,
    pub precios: CategoryRule,
}

/// Fixed visit quota per advisor used by the organization dashboards.
pub const DEFAULT_VISIT_QUOTA: u32 = 30;

impl Default for KpiTable {
    fn default() -> Self {
        Self {
            cobertura: CategoryRule::new(
                Aggregation::CountOfSuccess { token: "REGISTRADO".into() },
                Clamp::None,
            ),
            volumen: CategoryRule::new(Aggregation::SumOfFields, Clamp::None),
            visitas: CategoryRule::new(
                Aggregation::DistinctPdvs { quota: DEFAULT_VISIT_QUOTA },
                Clamp::AtHundred,
            ),
            precios: CategoryRule::new(
                Aggregation::CountOfSuccess { token: "REPORTADOS".into() },
                Clamp::None,
            ),
        }
    }
}

impl KpiTable {
    pub fn rule(&self, kind: KpiKind) -> &CategoryRule {
        match kind {
            KpiKind::Coverage => &self.cobertura,
            KpiKind::Volume => &self.volumen,
            KpiKind::Visits => &self.visitas,
            KpiKind::Price => &self.precios,
        }
    }

    pub fn rule_mut(&mut self, kind: KpiKind) -> &mut CategoryRule {
        match kind {
            KpiKind::Coverage => &mut self.cobertura,
            KpiKind::Volume => &mut self.volumen,
            KpiKind::Visits => &mut self.visitas,
            KpiKind::Price => &mut self.precios,
        }
    }

    /// Parse a TOML table; categories left out keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, KpiError> {
        let table: Self = toml::from_str(s).map_err(|e| KpiError::TableParse(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), KpiError> {
        for kind in KpiKind::ALL {
            let rule = self.rule(kind);
            if !rule.aggregation.supports(kind) {
                return Err(KpiError::UnsupportedStrategy { kind, strategy: rule.aggregation.name() });
            }
            match &rule.aggregation {
                Aggregation::CountOfSuccess { token } if token.trim().is_empty() => {
                    return Err(KpiError::InvalidRule { kind, message: "empty success token".into() });
                }
                Aggregation::DistinctPdvs { quota: 0 } => {
                    return Err(KpiError::InvalidRule { kind, message: "visit quota must be positive".into() });
                }
                _ => {}
            }
        }
        Ok(())
    }
}
