//! Filter engine shared by every dashboard page.
//!
//! Criteria are plain values; an empty string (or `None`) places no
//! constraint on its field. A set criterion whose field is missing on the
//! item rejects the item. `apply` is pure: it never mutates its input and
//! the result does not depend on the order criteria were set.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::record_percentage;
use crate::error::KpiError;
use crate::model::{Advisor, KpiKind, KpiRecord, PointOfSale};
use crate::strategy::KpiTable;

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// Equality-filtered fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    /// ↔ `asesor_id`
    Asesor,
    /// ↔ `id` (or `codigo`)
    Pdv,
    /// ↔ `compania`
    Compania,
    /// ↔ `agente`
    Agente,
    /// ↔ `segmento`
    Segmento,
}

impl FilterField {
    pub const ALL: [FilterField; 5] = [
        Self::Asesor,
        Self::Pdv,
        Self::Compania,
        Self::Agente,
        Self::Segmento,
    ];

    /// Backend JSON key(s) for raw-value filtering.
    fn json_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Asesor => &["asesor_id"],
            Self::Pdv => &["id", "codigo"],
            Self::Compania => &["compania"],
            Self::Agente => &["agente"],
            Self::Segmento => &["segmento"],
        }
    }
}

/// Anything the filter engine can test.
pub trait Filterable {
    /// Field value used for equality matching, `None` when absent.
    fn field(&self, field: FilterField) -> Option<&str>;

    /// Registration date (ISO, possibly with a time suffix).
    fn date(&self) -> Option<&str> {
        None
    }

    /// Whether the item's `field` equals `value`.
    fn matches_field(&self, field: FilterField, value: &str) -> bool {
        self.field(field).is_some_and(|v| v == value)
    }
}

impl Filterable for PointOfSale {
    fn field(&self, field: FilterField) -> Option<&str> {
        match field {
            FilterField::Asesor => self.asesor_id.as_deref(),
            FilterField::Pdv => non_empty(&self.id),
            FilterField::Compania => self.compania.as_deref(),
            FilterField::Agente => self.agente.as_deref(),
            FilterField::Segmento => self.segmento.as_deref(),
        }
    }

    fn matches_field(&self, field: FilterField, value: &str) -> bool {
        match field {
            FilterField::Pdv => self.id == value || (!self.codigo.is_empty() && self.codigo == value),
            _ => self.field(field).is_some_and(|v| v == value),
        }
    }
}

impl Filterable for KpiRecord {
    fn field(&self, field: FilterField) -> Option<&str> {
        self.pdv().field(field)
    }

    fn date(&self) -> Option<&str> {
        KpiRecord::date(self)
    }

    fn matches_field(&self, field: FilterField, value: &str) -> bool {
        self.pdv().matches_field(field, value)
    }
}

impl Filterable for Advisor {
    fn field(&self, field: FilterField) -> Option<&str> {
        match field {
            FilterField::Asesor => non_empty(&self.id),
            _ => None,
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// Inclusive date bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_unbounded(&self) -> bool {
        self.desde.is_none() && self.hasta.is_none()
    }

    /// Whether `date` (ISO, time suffix tolerated) falls inside the range.
    /// An unbounded range admits anything, even a missing date.
    pub fn contains(&self, date: Option<&str>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(date) = date.and_then(parse_iso_date) else {
            return false;
        };
        self.desde.map_or(true, |d| date >= d) && self.hasta.map_or(true, |h| date <= h)
    }
}

/// Parse `YYYY-MM-DD`, ignoring anything after the date part.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Compliance bands offered by the marketing dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceBand {
    /// 0–49 %
    Low,
    /// 50–79 %
    Medium,
    /// 80–100 %
    High,
    /// above 100 %
    Over,
}

impl ComplianceBand {
    pub fn contains(&self, pct: u32) -> bool {
        match self {
            Self::Low => pct < 50,
            Self::Medium => (50..80).contains(&pct),
            Self::High => (80..=100).contains(&pct),
            Self::Over => pct > 100,
        }
    }

    pub fn parse(s: &str) -> Result<Self, KpiError> {
        match s.trim() {
            "0-49" | "bajo" | "low" => Ok(Self::Low),
            "50-79" | "medio" | "medium" => Ok(Self::Medium),
            "80-100" | "alto" | "high" => Ok(Self::High),
            "100+" | "superado" | "over" => Ok(Self::Over),
            other => Err(KpiError::InvalidFilter { field: "rango", value: other.to_string() }),
        }
    }
}

/// Filter state of a dashboard page.
///
/// OT pages use `asesor`, `pdv`, `compania` and `agente`; Mercadeo pages
/// use `asesor`, `pdv`, `segmento`, the date range, `metrica` and `rango`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub asesor: String,
    pub pdv: String,
    pub compania: String,
    pub agente: String,
    pub segmento: String,
    pub fechas: DateRange,
    /// KPI category shown on the page; a selector, not a row filter.
    pub metrica: Option<KpiKind>,
    pub rango: Option<ComplianceBand>,
}

impl FilterCriteria {
    pub fn value(&self, field: FilterField) -> &str {
        match field {
            FilterField::Asesor => &self.asesor,
            FilterField::Pdv => &self.pdv,
            FilterField::Compania => &self.compania,
            FilterField::Agente => &self.agente,
            FilterField::Segmento => &self.segmento,
        }
    }

    fn value_mut(&mut self, field: FilterField) -> &mut String {
        match field {
            FilterField::Asesor => &mut self.asesor,
            FilterField::Pdv => &mut self.pdv,
            FilterField::Compania => &mut self.compania,
            FilterField::Agente => &mut self.agente,
            FilterField::Segmento => &mut self.segmento,
        }
    }

    /// Set one equality field without any cascade.
    pub fn with(mut self, field: FilterField, value: impl Into<String>) -> Self {
        *self.value_mut(field) = value.into();
        self
    }

    /// Equality constraints currently in force.
    pub fn active_fields(&self) -> impl Iterator<Item = (FilterField, &str)> + '_ {
        FilterField::ALL
            .into_iter()
            .map(move |f| (f, self.value(f).trim()))
            .filter(|(_, v)| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.active_fields().next().is_none() && self.fechas.is_unbounded() && self.rango.is_none()
    }

    /// Row test for equality fields and the date range.
    pub fn matches<T: Filterable + ?Sized>(&self, item: &T) -> bool {
        self.active_fields().all(|(field, value)| item.matches_field(field, value))
            && self.fechas.contains(item.date())
    }

    // ── Cascades ────────────────────────────────────────────────────

    /// Company changed: PDV and advisor no longer apply.
    pub fn set_compania(&mut self, compania: impl Into<String>) {
        self.compania = compania.into();
        self.pdv.clear();
        self.asesor.clear();
    }

    /// PDV changed: select its advisor, or clear the advisor when no PDV
    /// is chosen or the PDV has none.
    pub fn set_pdv(&mut self, pdv: impl Into<String>, points: &[PointOfSale]) {
        self.pdv = pdv.into();
        let advisor = if self.pdv.is_empty() {
            None
        } else {
            points
                .iter()
                .find(|p| p.matches_field(FilterField::Pdv, &self.pdv))
                .and_then(|p| p.asesor_id.clone())
        };
        self.asesor = advisor.unwrap_or_default();
    }

    /// Advisor changed: the PDV selection is dropped.
    pub fn set_asesor(&mut self, asesor: impl Into<String>) {
        self.asesor = asesor.into();
        self.pdv.clear();
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Items matching every set criterion.
pub fn apply<T: Filterable + Clone>(items: &[T], criteria: &FilterCriteria) -> Vec<T> {
    items.iter().filter(|item| criteria.matches(*item)).cloned().collect()
}

/// Records of `kind` whose per-record compliance falls in `band`.
pub fn apply_band(records: &[KpiRecord], band: ComplianceBand, table: &KpiTable) -> Vec<KpiRecord> {
    records
        .iter()
        .filter(|r| band.contains(record_percentage(r, table.rule(r.kind()))))
        .cloned()
        .collect()
}

/// Full page filter: equality fields, dates, then the compliance band.
pub fn apply_records(records: &[KpiRecord], criteria: &FilterCriteria, table: &KpiTable) -> Vec<KpiRecord> {
    let matched = apply(records, criteria);
    match criteria.rango {
        Some(band) => apply_band(&matched, band, table),
        None => matched,
    }
}

/// Filter a raw backend list. A non-array input yields nothing.
///
/// Supports the equality fields and the date range; compliance bands need
/// typed records.
pub fn apply_json(items: &Value, criteria: &FilterCriteria) -> Vec<Value> {
    let Some(items) = items.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| {
            criteria.active_fields().all(|(field, value)| {
                field.json_keys().iter().any(|key| json_field(item, key).is_some_and(|v| v == value))
            }) && criteria.fechas.contains(json_date(item).as_deref())
        })
        .cloned()
        .collect()
}

fn json_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_date(item: &Value) -> Option<String> {
    ["fecha_implementacion", "fecha_visita", "fecha_reporte", "fecha_registro", "fecha"]
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str).map(String::from))
}
