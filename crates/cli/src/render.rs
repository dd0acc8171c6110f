//! Text, CSV and JSON rendering of dashboard cards and detail tables.

use std::io::Write;

use clap::ValueEnum;
use plan_choque_kpi::aggregate::record_percentage;
use plan_choque_kpi::group::{PriceCheck, ProductRow, SegmentRow};
use plan_choque_kpi::{CategoryRule, KpiRecord, KpiSummary};
use serde_json::{json, Value};

use crate::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

/// Rows ready for text or CSV output.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&'static str]) -> Self {
        Self { headers: headers.to_vec(), rows: Vec::new() }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Left-aligned columns separated by two spaces.
    pub fn to_text(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let line = |cells: Vec<&str>| {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect();
            padded.join("  ").trim_end().to_string()
        };

        let mut out = line(self.headers.clone());
        out.push('\n');
        for row in &self.rows {
            out.push_str(&line(row.iter().map(String::as_str).collect()));
            out.push('\n');
        }
        out
    }

    pub fn write_csv(&self, out: impl Write) -> Result<(), CliError> {
        let mut writer = csv::Writer::from_writer(out);
        let csv_err = |e: csv::Error| CliError::error(format!("failed to write CSV: {}", e));
        writer.write_record(&self.headers).map_err(csv_err)?;
        for row in &self.rows {
            writer.write_record(row).map_err(csv_err)?;
        }
        writer.flush().map_err(|e| CliError::error(format!("failed to write CSV: {}", e)))
    }
}

/// Print a table or its JSON counterpart to stdout.
pub fn emit(format: OutputFormat, table: &Table, json: Value) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let io_err = |e: std::io::Error| CliError::error(format!("failed to write output: {}", e));
    match format {
        OutputFormat::Text => handle.write_all(table.to_text().as_bytes()).map_err(io_err),
        OutputFormat::Csv => table.write_csv(handle),
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(&json)
                .map_err(|e| CliError::error(format!("failed to encode JSON: {}", e)))?;
            writeln!(handle, "{}", text).map_err(io_err)
        }
    }
}

/// Whole numbers print without decimals.
pub fn number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

fn opt(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

// ── Cards ───────────────────────────────────────────────────────────

pub fn cards_table(cards: &[KpiSummary]) -> Table {
    let mut table = Table::new(&["KPI", "Meta", "Real", "%", "Registros", "PDVs", "Puntos"]);
    for card in cards {
        table.push(vec![
            card.kind.label().to_string(),
            number(card.meta),
            number(card.real),
            format!("{}%", card.porcentaje),
            card.registros.to_string(),
            card.pdvs_impactados.to_string(),
            number(card.puntos),
        ]);
    }
    table
}

// ── Detail tables ───────────────────────────────────────────────────

pub fn records_table(records: &[KpiRecord], rule: &CategoryRule) -> Table {
    let mut table = Table::new(&[
        "Código", "Nombre", "Compañía", "Segmento", "Asesor", "Estado", "Meta", "Real", "%", "Puntos", "Fecha",
    ]);
    for record in records {
        let pdv = record.pdv();
        table.push(vec![
            pdv.codigo.clone(),
            pdv.nombre.clone(),
            opt(pdv.compania.as_deref()),
            opt(pdv.segmento.as_deref()),
            opt(pdv.asesor_nombre.as_deref().or(pdv.asesor_id.as_deref())),
            opt(record.estado()),
            record.target().map(number).unwrap_or_default(),
            record.actual().map(number).unwrap_or_default(),
            format!("{}%", record_percentage(record, rule)),
            number(record.puntos()),
            opt(record.date()),
        ]);
    }
    table
}

pub fn records_json(records: &[KpiRecord], rule: &CategoryRule) -> Value {
    Value::Array(
        records
            .iter()
            .map(|record| {
                let mut value = serde_json::to_value(record).unwrap_or(Value::Null);
                if let Value::Object(map) = &mut value {
                    map.insert("porcentaje".into(), json!(record_percentage(record, rule)));
                }
                value
            })
            .collect(),
    )
}

pub fn segments_table(rows: &[SegmentRow]) -> Table {
    let mut table = Table::new(&["Segmento", "Cantidad PDVs", "Total Galones", "Promedio"]);
    for row in rows {
        table.push(vec![
            row.segmento.clone(),
            row.cantidad_pdvs.to_string(),
            number(row.total_galones),
            number(row.promedio),
        ]);
    }
    table
}

pub fn products_table(rows: &[ProductRow]) -> Table {
    let mut table = Table::new(&["Producto", "Cajas", "Galonaje", "%"]);
    for row in rows {
        table.push(vec![
            row.nombre.clone(),
            number(row.numero_cajas),
            number(row.galonaje),
            format!("{:.1}%", row.porcentaje),
        ]);
    }
    table
}

pub fn prices_table(rows: &[PriceCheck]) -> Table {
    let mut table = Table::new(&["Código", "Referencia", "PVP Real", "PVP Sugerido", "Diferencia", "Cumple"]);
    for row in rows {
        table.push(vec![
            row.codigo.clone(),
            row.referencia.clone(),
            number(row.pvp_real),
            number(row.pvp_sugerido),
            number(row.diferencia),
            if row.cumple { "Sí" } else { "No" }.to_string(),
        ]);
    }
    table
}
