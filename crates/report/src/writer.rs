//! `.xlsx` serialization.
//!
//! The whole workbook is rendered into memory before anything touches the
//! disk. The bytes go to a `.tmp` sibling that is renamed into place, so a
//! failed report never leaves a partial file behind. An existing report of
//! the same name gets a numeric suffix instead of being replaced.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, Worksheet};

use crate::error::ReportError;
use crate::workbook::{Cell, ReportWorkbook, Sheet};

/// Timestamp part of report file names. Colons are not valid on every
/// filesystem.
pub const FILE_STAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

const BRAND_RED: u32 = 0xE3_06_13;

/// `{label}_{user_type}_{timestamp}.xlsx`
pub fn file_name(label: &str, user_type: &str, now: NaiveDateTime) -> String {
    format!("{}_{}_{}.xlsx", label, user_type, now.format(FILE_STAMP_FORMAT))
}

impl ReportWorkbook {
    /// Serialize every sheet to `.xlsx` bytes.
    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>, ReportError> {
        if self.sheets.is_empty() {
            return Err(ReportError::Empty);
        }

        let header = Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(BRAND_RED))
            .set_border(FormatBorder::Thin);
        let bold = Format::new().set_bold();
        let plain = Format::new();

        let mut workbook = Workbook::new();
        for sheet in &self.sheets {
            let worksheet = workbook
                .add_worksheet()
                .set_name(&sheet.name)
                .map_err(|source| ReportError::Sheet { name: sheet.name.clone(), source })?;

            for (col, title) in sheet.headers.iter().enumerate() {
                worksheet
                    .write_string_with_format(0, col as u16, title, &header)
                    .map_err(|source| cell_error(sheet, 0, col, source))?;
            }

            for (idx, row) in sheet.rows.iter().enumerate() {
                let format = if sheet.is_bold(idx) { &bold } else { &plain };
                write_row(worksheet, sheet, idx as u32 + 1, row, format)?;
            }

            for (col, width) in sheet.column_widths(self.max_column_width).into_iter().enumerate() {
                worksheet
                    .set_column_width(col as u16, width as f64)
                    .map_err(|source| cell_error(sheet, 0, col, source))?;
            }
        }

        workbook.save_to_buffer().map_err(ReportError::Serialize)
    }

    /// Write the report into `dir` and return the final path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        self.save_at(dir, chrono::Local::now().naive_local())
    }

    /// [`save`](Self::save) with an explicit timestamp for the file name.
    pub fn save_at(&self, dir: &Path, now: NaiveDateTime) -> Result<PathBuf, ReportError> {
        let bytes = self.to_xlsx_bytes()?;

        let path = unused_path(dir, &file_name(&self.label, &self.user_type, now));
        let tmp_path = path.with_extension("xlsx.tmp");

        if let Err(source) = std::fs::write(&tmp_path, &bytes) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(ReportError::Io { path: tmp_path, source });
        }
        if let Err(source) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(ReportError::Io { path, source });
        }

        tracing::info!(path = %path.display(), sheets = self.sheets.len(), bytes = bytes.len(), "report written");
        Ok(path)
    }
}

/// `dir/name`, or `dir/{stem}_2.xlsx`, `_3`... when a report written in the
/// same second already holds the name.
fn unused_path(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if !path.exists() {
        return path;
    }
    let stem = name.strip_suffix(".xlsx").unwrap_or(name);
    (2u32..)
        .map(|n| dir.join(format!("{}_{}.xlsx", stem, n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(path)
}

fn write_row(
    worksheet: &mut Worksheet,
    sheet: &Sheet,
    row: u32,
    cells: &[Cell],
    format: &Format,
) -> Result<(), ReportError> {
    for (col, cell) in cells.iter().enumerate() {
        let c = col as u16;
        let result = match cell {
            Cell::Empty => continue,
            Cell::Text(s) => worksheet.write_string_with_format(row, c, s, format),
            Cell::Number(n) => worksheet.write_number_with_format(row, c, *n, format),
        };
        result.map_err(|source| cell_error(sheet, row, col, source))?;
    }
    Ok(())
}

fn cell_error(sheet: &Sheet, row: u32, col: usize, source: rust_xlsxwriter::XlsxError) -> ReportError {
    ReportError::Cell { sheet: sheet.name.clone(), row, col: col as u16, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap().and_hms_opt(9, 5, 7).unwrap()
    }

    #[test]
    fn file_name_has_no_colons() {
        let name = file_name("Reporte_Plan_Choque", "OT", stamp());
        assert_eq!(name, "Reporte_Plan_Choque_OT_2025-03-14T09-05-07.xlsx");
    }

    #[test]
    fn empty_workbook_is_an_error() {
        let report = ReportWorkbook {
            label: "R".into(),
            user_type: "OT".into(),
            max_column_width: 50,
            sheets: vec![],
        };
        assert!(matches!(report.to_xlsx_bytes(), Err(ReportError::Empty)));
    }

    #[test]
    fn invalid_sheet_name_aborts_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = ReportWorkbook {
            label: "R".into(),
            user_type: "OT".into(),
            max_column_width: 50,
            sheets: vec![Sheet::new("bad[name]", &["A"])],
        };
        assert!(matches!(report.save_at(dir.path(), stamp()), Err(ReportError::Sheet { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn same_second_reports_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let report = ReportWorkbook {
            label: "R".into(),
            user_type: "OT".into(),
            max_column_width: 50,
            sheets: vec![Sheet::new("S", &["A"])],
        };
        let first = report.save_at(dir.path(), stamp()).unwrap();
        let second = report.save_at(dir.path(), stamp()).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
        assert_eq!(second.file_name().unwrap(), "R_OT_2025-03-14T09-05-07_2.xlsx");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn missing_directory_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let report = ReportWorkbook {
            label: "R".into(),
            user_type: "OT".into(),
            max_column_width: 50,
            sheets: vec![Sheet::new("S", &["A"])],
        };
        assert!(matches!(report.save_at(&missing, stamp()), Err(ReportError::Io { .. })));
        assert!(!missing.exists());
    }
}
