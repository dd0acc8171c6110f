//! Segment and product breakdowns for detail tables and report sheets.

use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::model::KpiRecord;

/// Group label for PDVs the backend did not classify.
pub const NO_SEGMENT: &str = "Sin Segmento";
/// Group label for product rows without a reference.
pub const NO_REFERENCE: &str = "Sin Referencia";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRow {
    pub segmento: String,
    pub cantidad_pdvs: usize,
    pub total_galones: f64,
    /// Gallons per PDV in the segment.
    pub promedio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub nombre: String,
    pub numero_cajas: f64,
    pub galonaje: f64,
    /// Share of the grand total gallons, one decimal.
    pub porcentaje: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceCheck {
    pub codigo: String,
    pub referencia: String,
    pub pvp_real: f64,
    pub pvp_sugerido: f64,
    pub diferencia: f64,
    /// Sold at or below the suggested price.
    pub cumple: bool,
}

/// Group records by segment (exact match), sorted by segment name.
pub fn group_by_segment(records: &[KpiRecord]) -> Vec<SegmentRow> {
    let mut groups: BTreeMap<&str, (BTreeSet<&str>, f64)> = BTreeMap::new();

    for record in records {
        let pdv = record.pdv();
        let segment = pdv.segmento.as_deref().unwrap_or(NO_SEGMENT);
        let entry = groups.entry(segment).or_default();
        entry.0.insert(pdv.dedup_key());
        entry.1 += record.galones();
    }

    groups
        .into_iter()
        .map(|(segmento, (pdvs, total_galones))| {
            let cantidad_pdvs = pdvs.len();
            let promedio = if cantidad_pdvs > 0 { total_galones / cantidad_pdvs as f64 } else { 0.0 };
            SegmentRow {
                segmento: segmento.to_string(),
                cantidad_pdvs,
                total_galones,
                promedio,
            }
        })
        .collect()
}

/// Group reported product lines by reference, largest volume first.
pub fn group_by_product(records: &[KpiRecord]) -> Vec<ProductRow> {
    let mut groups: BTreeMap<&str, (f64, f64)> = BTreeMap::new();

    for product in records.iter().flat_map(|r| r.productos()) {
        let name = match product.referencia.trim() {
            "" => NO_REFERENCE,
            _ => product.referencia.as_str(),
        };
        let entry = groups.entry(name).or_default();
        entry.0 += product.numero_cajas;
        entry.1 += product.volumen_galones;
    }

    let grand_total: f64 = groups.values().map(|(_, gal)| gal).sum();

    let mut rows: Vec<ProductRow> = groups
        .into_iter()
        .map(|(nombre, (numero_cajas, galonaje))| ProductRow {
            nombre: nombre.to_string(),
            numero_cajas,
            galonaje,
            porcentaje: share(galonaje, grand_total),
        })
        .collect();

    // BTreeMap already ordered by name; stable sort keeps that for ties.
    rows.sort_by_key(|r| std::cmp::Reverse(OrderedFloat(r.galonaje)));
    rows
}

/// Reported vs suggested price for every product line.
pub fn price_checks(records: &[KpiRecord]) -> Vec<PriceCheck> {
    records
        .iter()
        .flat_map(|r| {
            let codigo = &r.pdv().codigo;
            r.productos().iter().map(move |p| PriceCheck {
                codigo: codigo.clone(),
                referencia: p.referencia.clone(),
                pvp_real: p.pvp_real,
                pvp_sugerido: p.pvp_sugerido,
                diferencia: p.pvp_real - p.pvp_sugerido,
                cumple: p.pvp_real <= p.pvp_sugerido,
            })
        })
        .collect()
}

fn share(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        (part / total * 1000.0).round() / 10.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PointOfSale, PriceRecord, Product, VolumeRecord};

    fn volume(code: &str, segment: Option<&str>, real: f64) -> KpiRecord {
        VolumeRecord {
            pdv: PointOfSale {
                id: code.into(),
                codigo: code.into(),
                segmento: segment.map(String::from),
                ..Default::default()
            },
            real,
            ..Default::default()
        }
        .into()
    }

    fn product(referencia: &str, cajas: f64, galones: f64) -> Product {
        Product {
            referencia: referencia.into(),
            numero_cajas: cajas,
            volumen_galones: galones,
            ..Default::default()
        }
    }

    #[test]
    fn segments_group_and_average() {
        let records = vec![
            volume("A", Some("Urbano"), 100.0),
            volume("B", Some("Urbano"), 50.0),
            volume("A", Some("Urbano"), 30.0),
            volume("C", None, 20.0),
        ];
        let rows = group_by_segment(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].segmento, NO_SEGMENT);
        assert_eq!(rows[0].total_galones, 20.0);
        assert_eq!(rows[1].segmento, "Urbano");
        assert_eq!(rows[1].cantidad_pdvs, 2);
        assert_eq!(rows[1].total_galones, 180.0);
        assert_eq!(rows[1].promedio, 90.0);
    }

    #[test]
    fn segment_match_is_exact() {
        let records = vec![volume("A", Some("Urbano"), 1.0), volume("B", Some("urbano"), 1.0)];
        assert_eq!(group_by_segment(&records).len(), 2);
    }

    #[test]
    fn products_share_of_total() {
        let records: Vec<KpiRecord> = vec![
            VolumeRecord {
                productos: vec![product("20W50", 2.0, 30.0), product("15W40", 1.0, 10.0)],
                ..Default::default()
            }
            .into(),
            PriceRecord {
                productos: vec![product("20W50", 1.0, 20.0), product("", 1.0, 0.0)],
                ..Default::default()
            }
            .into(),
        ];
        let rows = group_by_product(&records);
        assert_eq!(rows[0].nombre, "20W50");
        assert_eq!(rows[0].numero_cajas, 3.0);
        assert_eq!(rows[0].galonaje, 50.0);
        assert_eq!(rows[0].porcentaje, 83.3);
        assert_eq!(rows[1].nombre, "15W40");
        assert_eq!(rows[1].porcentaje, 16.7);
        assert_eq!(rows[2].nombre, NO_REFERENCE);
        assert_eq!(rows[2].porcentaje, 0.0);
    }

    #[test]
    fn products_without_volume_have_zero_share() {
        let records: Vec<KpiRecord> =
            vec![PriceRecord { productos: vec![product("X", 1.0, 0.0)], ..Default::default() }.into()];
        assert_eq!(group_by_product(&records)[0].porcentaje, 0.0);
    }

    #[test]
    fn price_check_flags_overpricing() {
        let mut over = product("20W50", 1.0, 1.0);
        over.pvp_real = 26000.0;
        over.pvp_sugerido = 25000.0;
        let mut ok = product("15W40", 1.0, 1.0);
        ok.pvp_real = 24000.0;
        ok.pvp_sugerido = 24000.0;
        let records: Vec<KpiRecord> = vec![PriceRecord {
            pdv: PointOfSale { codigo: "P1".into(), ..Default::default() },
            productos: vec![over, ok],
            ..Default::default()
        }
        .into()];
        let checks = price_checks(&records);
        assert_eq!(checks.len(), 2);
        assert!(!checks[0].cumple);
        assert_eq!(checks[0].diferencia, 1000.0);
        assert!(checks[1].cumple);
        assert_eq!(checks[1].codigo, "P1");
    }
}
