use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid sheet '{name}': {source}")]
    Sheet {
        name: String,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("failed to write cell {sheet}!R{row}C{col}: {source}")]
    Cell {
        sheet: String,
        row: u32,
        col: u16,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("failed to serialize workbook: {0}")]
    Serialize(#[source] rust_xlsxwriter::XlsxError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report has no sheets")]
    Empty,
}
