use std::collections::BTreeSet;

/// A cell value as it will land in the spreadsheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() { Self::Empty } else { Self::Text(s) }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text shown in the cell, used for column sizing.
    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Number(n) => format!("{:.2}", n),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}

impl From<Option<&str>> for Cell {
    fn from(s: Option<&str>) -> Self {
        s.map_or(Self::Empty, Self::text)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<u32> for Cell {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

/// One worksheet: a header row followed by data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// Indexes into `rows` rendered in bold.
    pub bold_rows: BTreeSet<usize>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            name: name.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            bold_rows: BTreeSet::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn push_bold(&mut self, row: Vec<Cell>) {
        self.bold_rows.insert(self.rows.len());
        self.rows.push(row);
    }

    pub fn is_bold(&self, row: usize) -> bool {
        self.bold_rows.contains(&row)
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).chain([self.headers.len()]).max().unwrap_or(0)
    }

    /// Width per column, in characters: the longest of header and cells
    /// plus two, capped at `max_width`.
    pub fn column_widths(&self, max_width: usize) -> Vec<usize> {
        (0..self.column_count())
            .map(|col| {
                let header = self.headers.get(col).map_or(0, |h| h.chars().count());
                let longest = self
                    .rows
                    .iter()
                    .filter_map(|r| r.get(col))
                    .map(|c| c.display().chars().count())
                    .max()
                    .unwrap_or(0);
                (header.max(longest) + 2).min(max_width)
            })
            .collect()
    }
}

/// Every sheet of a report, in tab order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportWorkbook {
    pub label: String,
    pub user_type: String,
    pub max_column_width: usize,
    pub sheets: Vec<Sheet>,
}

impl ReportWorkbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_take_longest_and_cap() {
        let mut sheet = Sheet::new("S", &["Código", "Nombre"]);
        sheet.push(vec!["A1".into(), "x".repeat(80).into()]);
        sheet.push(vec!["ABCDEFGHIJ".into(), Cell::Empty]);
        assert_eq!(sheet.column_widths(50), vec![12, 50]);
    }

    #[test]
    fn header_only_sheet_sizes_from_headers() {
        let sheet = Sheet::new("S", &["Fecha Implementación"]);
        assert_eq!(sheet.column_widths(50), vec![22]);
    }

    #[test]
    fn numbers_display_without_trailing_zeros() {
        assert_eq!(Cell::Number(150.0).display(), "150");
        assert_eq!(Cell::Number(2.5).display(), "2.50");
        assert_eq!(Cell::text(""), Cell::Empty);
    }

    #[test]
    fn bold_rows_track_position() {
        let mut sheet = Sheet::new("S", &["A"]);
        sheet.push(vec![1.0.into()]);
        sheet.push_bold(vec!["TOTAL".into()]);
        assert!(!sheet.is_bold(0));
        assert!(sheet.is_bold(1));
    }
}
