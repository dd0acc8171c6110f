//! Report layout: which sheets exist and what each column holds.

use plan_choque_kpi::aggregate::{percentage, record_percentage, summarize};
use plan_choque_kpi::group::{group_by_product, group_by_segment};
use plan_choque_kpi::{Aggregation, CategoryRule, KpiDatasets, KpiKind, KpiRecord, KpiTable};
use serde::{Deserialize, Serialize};

use crate::workbook::{Cell, ReportWorkbook, Sheet};

pub const SUMMARY_SHEET: &str = "Resumen Ejecutivo";
const SEGMENT_SHEET: &str = "Volumen por Segmento";
const PRODUCT_SHEET: &str = "Volumen por Producto";
const TOTAL: &str = "TOTAL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    /// File name prefix.
    pub label: String,
    pub max_column_width: usize,
    /// Write a headers-only sheet for categories without records.
    pub include_empty_sheets: bool,
    /// Add the segment and product breakdowns.
    pub detail_sheets: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            label: "Reporte_Plan_Choque".to_string(),
            max_column_width: 50,
            include_empty_sheets: false,
            detail_sheets: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Column layouts
// ---------------------------------------------------------------------------

/// What the total row shows under a column.
#[derive(Clone, Copy)]
enum Total {
    Blank,
    Label,
    Sum,
    /// Target column. The column sum, or the card's quota for distinct-PDV rules.
    Meta,
    /// Actual column. The column sum, or the card's visited PDVs for distinct-PDV rules.
    Real,
    /// `round(total[real] / total[meta] * 100)`, recomputed from the totals.
    Ratio { real: usize, meta: usize },
}

struct Column {
    header: &'static str,
    value: fn(&KpiRecord, &CategoryRule) -> Cell,
    total: Total,
}

fn col(header: &'static str, value: fn(&KpiRecord, &CategoryRule) -> Cell, total: Total) -> Column {
    Column { header, value, total }
}

fn codigo(r: &KpiRecord, _: &CategoryRule) -> Cell {
    r.pdv().codigo.as_str().into()
}

fn nombre(r: &KpiRecord, _: &CategoryRule) -> Cell {
    r.pdv().nombre.as_str().into()
}

fn asesor(r: &KpiRecord, _: &CategoryRule) -> Cell {
    let pdv = r.pdv();
    pdv.asesor_nombre.as_deref().or(pdv.asesor_id.as_deref()).into()
}

fn estado(r: &KpiRecord, _: &CategoryRule) -> Cell {
    r.estado().into()
}

fn segmento(r: &KpiRecord, _: &CategoryRule) -> Cell {
    r.pdv().segmento.as_deref().into()
}

fn puntos(r: &KpiRecord, _: &CategoryRule) -> Cell {
    r.puntos().into()
}

fn fecha(r: &KpiRecord, _: &CategoryRule) -> Cell {
    r.date().into()
}

fn meta(r: &KpiRecord, _: &CategoryRule) -> Cell {
    r.target().map_or(Cell::Empty, Cell::Number)
}

fn real(r: &KpiRecord, _: &CategoryRule) -> Cell {
    r.actual().map_or(Cell::Empty, Cell::Number)
}

fn cumplimiento(r: &KpiRecord, rule: &CategoryRule) -> Cell {
    record_percentage(r, rule).into()
}

fn productos(r: &KpiRecord, _: &CategoryRule) -> Cell {
    r.productos().len().into()
}

fn columns(kind: KpiKind) -> Vec<Column> {
    use Total::*;
    match kind {
        KpiKind::Coverage => vec![
            col("Código", codigo, Label),
            col("Nombre", nombre, Blank),
            col("Asesor", asesor, Blank),
            col("Estado", estado, Blank),
            col("Puntos", puntos, Sum),
            col("Fecha Implementación", fecha, Blank),
        ],
        KpiKind::Volume => vec![
            col("Código", codigo, Label),
            col("Nombre", nombre, Blank),
            col("Asesor", asesor, Blank),
            col("Segmento", segmento, Blank),
            col("Meta (gal)", meta, Meta),
            col("Real (gal)", real, Real),
            col("% Cumplimiento", cumplimiento, Ratio { real: 5, meta: 4 }),
            col("Puntos", puntos, Sum),
        ],
        KpiKind::Visits => vec![
            col("Código", codigo, Label),
            col("Nombre", nombre, Blank),
            col("Asesor", asesor, Blank),
            col("Visitas", real, Real),
            col("Meta", meta, Meta),
            col("% Cumplimiento", cumplimiento, Ratio { real: 3, meta: 4 }),
            col("Puntos", puntos, Sum),
        ],
        KpiKind::Price => vec![
            col("Código", codigo, Label),
            col("Nombre", nombre, Blank),
            col("Asesor", asesor, Blank),
            col("Estado", estado, Blank),
            col("Productos", productos, Sum),
            col("Puntos", puntos, Sum),
            col("Fecha Reporte", fecha, Blank),
        ],
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Lay out the report for the (already filtered) datasets.
///
/// `user_type` is the role label that ends up in the file name.
pub fn build_report(
    datasets: &KpiDatasets,
    user_type: &str,
    options: &ReportOptions,
    table: &KpiTable,
) -> ReportWorkbook {
    let mut sheets = vec![summary_sheet(datasets)];

    for (kind, records) in datasets.iter() {
        if records.is_empty() && !options.include_empty_sheets {
            continue;
        }
        sheets.push(category_sheet(kind, records, table.rule(kind)));
    }

    if options.detail_sheets {
        let volume = datasets.get(KpiKind::Volume);
        if !volume.is_empty() || options.include_empty_sheets {
            sheets.push(segment_sheet(volume));
        }
        let with_products: Vec<KpiRecord> = [KpiKind::Volume, KpiKind::Price]
            .into_iter()
            .flat_map(|k| datasets.get(k).iter().cloned())
            .collect();
        let has_products = with_products.iter().any(|r| !r.productos().is_empty());
        if has_products || options.include_empty_sheets {
            sheets.push(product_sheet(&with_products));
        }
    }

    tracing::debug!(sheets = sheets.len(), user_type, "report laid out");

    ReportWorkbook {
        label: options.label.clone(),
        user_type: user_type.to_string(),
        max_column_width: options.max_column_width,
        sheets,
    }
}

fn summary_sheet(datasets: &KpiDatasets) -> Sheet {
    let mut sheet = Sheet::new(SUMMARY_SHEET, &["KPI", "Total Registros", "Total Puntos", "Promedio Puntos"]);

    let mut total_registros = 0usize;
    let mut total_puntos = 0.0;
    for (kind, records) in datasets.iter() {
        let puntos: f64 = records.iter().map(KpiRecord::puntos).sum();
        total_registros += records.len();
        total_puntos += puntos;
        sheet.push(vec![
            kind.label().into(),
            records.len().into(),
            puntos.into(),
            average(puntos, records.len()).into(),
        ]);
    }

    sheet.push_bold(vec![
        TOTAL.into(),
        total_registros.into(),
        total_puntos.into(),
        average(total_puntos, total_registros).into(),
    ]);
    sheet.push(vec!["PDVs Únicos".into(), datasets.distinct_pdvs().into()]);
    sheet
}

fn category_sheet(kind: KpiKind, records: &[KpiRecord], rule: &CategoryRule) -> Sheet {
    let columns = columns(kind);
    let headers: Vec<&str> = columns.iter().map(|c| c.header).collect();
    let mut sheet = Sheet::new(kind.label(), &headers);

    for record in records {
        sheet.push(columns.iter().map(|c| (c.value)(record, rule)).collect());
    }

    if !records.is_empty() {
        // quota rules have no per-row target, so the totals come from the card
        let card = matches!(rule.aggregation, Aggregation::DistinctPdvs { .. })
            .then(|| summarize(records, kind, rule));
        let totals: Vec<f64> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| match (c.total, &card) {
                (Total::Meta, Some(card)) => card.meta,
                (Total::Real, Some(card)) => card.real,
                _ => sheet.rows.iter().filter_map(|r| r.get(i)?.as_number()).sum(),
            })
            .collect();
        let total = columns
            .iter()
            .enumerate()
            .map(|(i, c)| match c.total {
                Total::Blank => Cell::Empty,
                Total::Label => TOTAL.into(),
                Total::Sum | Total::Meta | Total::Real => totals[i].into(),
                Total::Ratio { real, meta } => percentage(totals[real], totals[meta], rule.clamp).into(),
            })
            .collect();
        sheet.push_bold(total);
    }
    sheet
}

fn segment_sheet(records: &[KpiRecord]) -> Sheet {
    let mut sheet = Sheet::new(SEGMENT_SHEET, &["Segmento", "Cantidad PDVs", "Total Galones", "Promedio por PDV"]);
    for row in group_by_segment(records) {
        sheet.push(vec![
            row.segmento.into(),
            row.cantidad_pdvs.into(),
            row.total_galones.into(),
            row.promedio.into(),
        ]);
    }
    sheet
}

fn product_sheet(records: &[KpiRecord]) -> Sheet {
    let mut sheet = Sheet::new(PRODUCT_SHEET, &["Producto", "Cajas", "Galonaje", "% Participación"]);
    for row in group_by_product(records) {
        sheet.push(vec![
            row.nombre.into(),
            row.numero_cajas.into(),
            row.galonaje.into(),
            row.porcentaje.into(),
        ]);
    }
    sheet
}

fn average(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        (total / count as f64 * 100.0).round() / 100.0
    }
}
