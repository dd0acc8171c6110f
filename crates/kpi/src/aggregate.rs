use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{KpiDatasets, KpiKind, KpiRecord};
use crate::strategy::{Aggregation, CategoryRule, Clamp, KpiTable};

/// Card values for one KPI category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub kind: KpiKind,
    pub meta: f64,
    pub real: f64,
    pub porcentaje: u32,
    /// Informational only; never part of completion.
    pub puntos: f64,
    pub registros: usize,
    pub pdvs_impactados: usize,
}

/// `round(real / meta * 100)`, 0 when there is no target.
pub fn percentage(real: f64, meta: f64, clamp: Clamp) -> u32 {
    if !(meta > 0.0) || !real.is_finite() || !meta.is_finite() {
        return 0;
    }
    let pct = (real / meta * 100.0).round().max(0.0);
    let pct = match clamp {
        Clamp::AtHundred => pct.min(100.0),
        Clamp::None => pct,
    };
    pct.min(f64::from(u32::MAX)) as u32
}

/// Whether the record reached the rule's success state.
pub fn is_success(record: &KpiRecord, rule: &CategoryRule) -> bool {
    match &rule.aggregation {
        Aggregation::CountOfSuccess { token } => record.estado() == Some(token.as_str()),
        Aggregation::SumOfFields => match (record.actual(), record.target()) {
            (Some(real), Some(meta)) => meta > 0.0 && real >= meta,
            _ => false,
        },
        Aggregation::DistinctPdvs { .. } => is_visited(record),
    }
}

fn is_visited(record: &KpiRecord) -> bool {
    match record {
        KpiRecord::Visits(v) => v.cantidad_visitas > 0 || v.fecha_visita.is_some(),
        KpiRecord::Coverage(_) | KpiRecord::Volume(_) | KpiRecord::Price(_) => true,
    }
}

/// Compliance of a single record, used by the detail tables and the
/// marketing compliance bands.
pub fn record_percentage(record: &KpiRecord, rule: &CategoryRule) -> u32 {
    match &rule.aggregation {
        Aggregation::SumOfFields => percentage(
            record.actual().unwrap_or(0.0),
            record.target().unwrap_or(0.0),
            rule.clamp,
        ),
        Aggregation::CountOfSuccess { .. } | Aggregation::DistinctPdvs { .. } => {
            if is_success(record, rule) { 100 } else { 0 }
        }
    }
}

/// Aggregate the (already filtered) records of one category.
///
/// Records of another category are ignored.
pub fn summarize(records: &[KpiRecord], kind: KpiKind, rule: &CategoryRule) -> KpiSummary {
    let records: Vec<&KpiRecord> = records.iter().filter(|r| r.kind() == kind).collect();

    let puntos: f64 = records.iter().map(|r| r.puntos()).sum();

    let (meta, real, pdvs_impactados) = match &rule.aggregation {
        Aggregation::CountOfSuccess { .. } => {
            let done = records.iter().filter(|r| is_success(r, rule)).count();
            (records.len() as f64, done as f64, distinct_codes(records.iter().copied()))
        }
        Aggregation::SumOfFields => (
            records.iter().filter_map(|r| r.target()).sum(),
            records.iter().filter_map(|r| r.actual()).sum(),
            distinct_codes(records.iter().copied()),
        ),
        // only visited PDVs count as impacted
        Aggregation::DistinctPdvs { quota } => {
            let visited = distinct_codes(records.iter().copied().filter(|r| is_visited(r)));
            (f64::from(*quota), visited as f64, visited)
        }
    };

    KpiSummary {
        kind,
        meta,
        real,
        porcentaje: percentage(real, meta, rule.clamp),
        puntos,
        registros: records.len(),
        pdvs_impactados,
    }
}

/// One card per category, in dashboard order.
pub fn summarize_all(datasets: &KpiDatasets, table: &KpiTable) -> Vec<KpiSummary> {
    datasets
        .iter()
        .map(|(kind, records)| summarize(records, kind, table.rule(kind)))
        .collect()
}

/// Distinct non-empty PDV codes.
pub(crate) fn distinct_codes<'a>(records: impl Iterator<Item = &'a KpiRecord>) -> usize {
    records
        .map(|r| r.pdv().dedup_key())
        .filter(|k| !k.is_empty())
        .collect::<BTreeSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoverageRecord, PointOfSale, PriceRecord, VisitRecord, VolumeRecord};

    fn pdv(code: &str, estado: Option<&str>) -> PointOfSale {
        PointOfSale {
            id: code.into(),
            codigo: code.into(),
            estado: estado.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn percentage_guards_zero_meta() {
        assert_eq!(percentage(5.0, 0.0, Clamp::None), 0);
        assert_eq!(percentage(0.0, 0.0, Clamp::AtHundred), 0);
        assert_eq!(percentage(5.0, -3.0, Clamp::None), 0);
        assert_eq!(percentage(f64::NAN, 10.0, Clamp::None), 0);
    }

    #[test]
    fn percentage_rounds_half_up_and_clamps() {
        assert_eq!(percentage(130.0, 150.0, Clamp::None), 87);
        assert_eq!(percentage(1.0, 8.0, Clamp::None), 13); // 12.5
        assert_eq!(percentage(45.0, 30.0, Clamp::None), 150);
        assert_eq!(percentage(45.0, 30.0, Clamp::AtHundred), 100);
    }

    #[test]
    fn volume_sums_targets_and_actuals() {
        let records: Vec<KpiRecord> = vec![
            VolumeRecord { pdv: pdv("A", None), meta: 100.0, real: 80.0, puntos: 10.0, ..Default::default() }.into(),
            VolumeRecord { pdv: pdv("B", None), meta: 50.0, real: 50.0, puntos: 5.0, ..Default::default() }.into(),
        ];
        let s = summarize(&records, KpiKind::Volume, KpiTable::default().rule(KpiKind::Volume));
        assert_eq!(s.meta, 150.0);
        assert_eq!(s.real, 130.0);
        assert_eq!(s.porcentaje, 87);
        assert_eq!(s.puntos, 15.0);
        assert_eq!(s.registros, 2);
    }

    #[test]
    fn volume_is_not_clamped() {
        let records: Vec<KpiRecord> =
            vec![VolumeRecord { pdv: pdv("A", None), meta: 10.0, real: 25.0, ..Default::default() }.into()];
        let s = summarize(&records, KpiKind::Volume, KpiTable::default().rule(KpiKind::Volume));
        assert_eq!(s.porcentaje, 250);
    }

    #[test]
    fn coverage_counts_registered() {
        let records: Vec<KpiRecord> = ["REGISTRADO", "PENDIENTE", "REGISTRADO"]
            .iter()
            .enumerate()
            .map(|(i, e)| CoverageRecord { pdv: pdv(&i.to_string(), Some(e)), ..Default::default() }.into())
            .collect();
        let s = summarize(&records, KpiKind::Coverage, KpiTable::default().rule(KpiKind::Coverage));
        assert_eq!((s.meta, s.real, s.porcentaje), (3.0, 2.0, 67));
    }

    #[test]
    fn price_counts_reported() {
        let records: Vec<KpiRecord> = vec![
            PriceRecord { pdv: pdv("A", Some("REPORTADOS")), ..Default::default() }.into(),
            PriceRecord { pdv: pdv("B", Some("PENDIENTES")), ..Default::default() }.into(),
        ];
        let s = summarize(&records, KpiKind::Price, KpiTable::default().rule(KpiKind::Price));
        assert_eq!((s.meta, s.real, s.porcentaje), (2.0, 1.0, 50));
    }

    #[test]
    fn visits_count_distinct_codes_against_quota() {
        let records: Vec<KpiRecord> = ["A", "B", "A", "C"]
            .iter()
            .map(|c| VisitRecord { pdv: pdv(c, None), cantidad_visitas: 1, ..Default::default() }.into())
            .collect();
        let s = summarize(&records, KpiKind::Visits, KpiTable::default().rule(KpiKind::Visits));
        assert_eq!(s.pdvs_impactados, 3);
        assert_eq!(s.real, 3.0);
        assert_eq!(s.meta, 30.0);
        assert_eq!(s.porcentaje, 10);
    }

    #[test]
    fn visits_distinct_caps_at_hundred() {
        let rule = CategoryRule::new(Aggregation::DistinctPdvs { quota: 2 }, Clamp::AtHundred);
        let records: Vec<KpiRecord> = ["A", "B", "C"]
            .iter()
            .map(|c| VisitRecord { pdv: pdv(c, None), cantidad_visitas: 2, ..Default::default() }.into())
            .collect();
        assert_eq!(summarize(&records, KpiKind::Visits, &rule).porcentaje, 100);
    }

    #[test]
    fn visits_event_semantics_sum_counts() {
        let rule = CategoryRule::new(Aggregation::SumOfFields, Clamp::AtHundred);
        let records: Vec<KpiRecord> = vec![
            VisitRecord { pdv: pdv("A", None), cantidad_visitas: 3, meta: 4.0, ..Default::default() }.into(),
            VisitRecord { pdv: pdv("B", None), cantidad_visitas: 0, meta: 4.0, ..Default::default() }.into(),
        ];
        let s = summarize(&records, KpiKind::Visits, &rule);
        assert_eq!((s.meta, s.real, s.porcentaje), (8.0, 3.0, 38));
    }

    #[test]
    fn unvisited_rows_do_not_count() {
        let records: Vec<KpiRecord> = vec![
            VisitRecord { pdv: pdv("A", None), cantidad_visitas: 0, ..Default::default() }.into(),
            VisitRecord { pdv: pdv("B", None), fecha_visita: Some("2025-02-01".into()), ..Default::default() }.into(),
        ];
        let s = summarize(&records, KpiKind::Visits, KpiTable::default().rule(KpiKind::Visits));
        assert_eq!(s.real, 1.0);
        assert_eq!(s.pdvs_impactados, 1);
    }

    #[test]
    fn impacted_pdvs_match_visited_pdvs() {
        let records: Vec<KpiRecord> = vec![
            VisitRecord { pdv: pdv("A", None), cantidad_visitas: 1, ..Default::default() }.into(),
            VisitRecord { pdv: pdv("B", None), cantidad_visitas: 0, ..Default::default() }.into(),
            VisitRecord { pdv: pdv("C", None), cantidad_visitas: 0, ..Default::default() }.into(),
        ];
        let s = summarize(&records, KpiKind::Visits, KpiTable::default().rule(KpiKind::Visits));
        assert_eq!(s.real, 1.0);
        assert_eq!(s.pdvs_impactados, 1);
        assert_eq!(s.porcentaje, 3);
        assert_eq!(s.registros, 3);
    }

    #[test]
    fn empty_input_has_zero_percentage() {
        for kind in KpiKind::ALL {
            let s = summarize(&[], kind, KpiTable::default().rule(kind));
            if kind != KpiKind::Visits {
                assert_eq!(s.meta, 0.0);
            }
            assert_eq!(s.porcentaje, 0);
        }
    }

    #[test]
    fn other_categories_are_ignored() {
        let records: Vec<KpiRecord> = vec![
            CoverageRecord { pdv: pdv("A", Some("REGISTRADO")), ..Default::default() }.into(),
            VolumeRecord { pdv: pdv("B", None), meta: 10.0, real: 10.0, ..Default::default() }.into(),
        ];
        let s = summarize(&records, KpiKind::Coverage, KpiTable::default().rule(KpiKind::Coverage));
        assert_eq!(s.registros, 1);
    }

    #[test]
    fn record_percentage_per_strategy() {
        let table = KpiTable::default();
        let vol: KpiRecord = VolumeRecord { meta: 40.0, real: 30.0, ..Default::default() }.into();
        assert_eq!(record_percentage(&vol, table.rule(KpiKind::Volume)), 75);
        let cov: KpiRecord = CoverageRecord { pdv: pdv("A", Some("REGISTRADO")), ..Default::default() }.into();
        assert_eq!(record_percentage(&cov, table.rule(KpiKind::Coverage)), 100);
        let pending: KpiRecord = CoverageRecord { pdv: pdv("A", None), ..Default::default() }.into();
        assert_eq!(record_percentage(&pending, table.rule(KpiKind::Coverage)), 0);
    }

    #[test]
    fn summarize_all_follows_dashboard_order() {
        let datasets = KpiDatasets::new();
        let cards = summarize_all(&datasets, &KpiTable::default());
        let kinds: Vec<_> = cards.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, KpiKind::ALL);
    }
}
