use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::KpiError;

// ---------------------------------------------------------------------------
// Reference entities
// ---------------------------------------------------------------------------

/// A point of sale (PDV) as returned by the backend.
///
/// `estado` is the per-KPI status of the PDV in the list it came from
/// ("REGISTRADO", "REPORTADOS", ...). Its valid values depend on the list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointOfSale {
    #[serde(default, deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub codigo: String,
    #[serde(default, deserialize_with = "de_string")]
    pub nombre: String,
    #[serde(default, deserialize_with = "de_string")]
    pub direccion: String,
    #[serde(default, deserialize_with = "de_string")]
    pub ciudad: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub compania: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub segmento: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub asesor_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub asesor_nombre: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub agente: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub estado: Option<String>,
}

impl PointOfSale {
    /// Key used to count distinct PDVs. Falls back to `id` when the
    /// backend omitted the code.
    pub fn dedup_key(&self) -> &str {
        if self.codigo.is_empty() {
            &self.id
        } else {
            &self.codigo
        }
    }
}

/// A sales advisor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Advisor {
    #[serde(default, deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, alias = "nombre", deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub email: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub telefono: Option<String>,
}

/// A product line inside an implementation or price report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default, deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub marca: String,
    #[serde(default, deserialize_with = "de_string")]
    pub referencia: String,
    #[serde(default, deserialize_with = "de_string")]
    pub presentacion: String,
    #[serde(default, deserialize_with = "de_f64")]
    pub numero_cajas: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub pvp_real: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub pvp_sugerido: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub volumen_galones: f64,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub comentario_venta: Option<String>,
    #[serde(default, deserialize_with = "de_bool")]
    pub tiene_comentarios: bool,
}

// ---------------------------------------------------------------------------
// KPI categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KpiKind {
    #[serde(rename = "cobertura")]
    Coverage,
    #[serde(rename = "volumen")]
    Volume,
    #[serde(rename = "visitas")]
    Visits,
    #[serde(rename = "precios")]
    Price,
}

impl KpiKind {
    /// Dashboard order.
    pub const ALL: [KpiKind; 4] = [Self::Coverage, Self::Volume, Self::Visits, Self::Price];

    /// Path segment / wire name.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Coverage => "cobertura",
            Self::Volume => "volumen",
            Self::Visits => "visitas",
            Self::Price => "precios",
        }
    }

    /// Human-facing name used on cards and sheet titles.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Coverage => "Cobertura",
            Self::Volume => "Volumen",
            Self::Visits => "Frecuencia de Visitas",
            Self::Price => "Precios",
        }
    }
}

impl fmt::Display for KpiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for KpiKind {
    type Err = KpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cobertura" | "coverage" => Ok(Self::Coverage),
            "volumen" | "volume" => Ok(Self::Volume),
            "visitas" | "visits" | "frecuencia" => Ok(Self::Visits),
            "precios" | "precio" | "price" | "profundidad" => Ok(Self::Price),
            _ => Err(KpiError::InvalidFilter { field: "metrica", value: s.to_string() }),
        }
    }
}

// ---------------------------------------------------------------------------
// KPI records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageRecord {
    #[serde(flatten)]
    pub pdv: PointOfSale,
    #[serde(default, deserialize_with = "de_f64")]
    pub puntos: f64,
    #[serde(default, alias = "fechaImplementacion", deserialize_with = "de_opt_string")]
    pub fecha_implementacion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeRecord {
    #[serde(flatten)]
    pub pdv: PointOfSale,
    #[serde(default, deserialize_with = "de_f64")]
    pub meta: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub real: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub puntos: f64,
    #[serde(default, alias = "fechaRegistro", deserialize_with = "de_opt_string")]
    pub fecha_registro: Option<String>,
    #[serde(default)]
    pub productos: Vec<Product>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    #[serde(flatten)]
    pub pdv: PointOfSale,
    #[serde(default, alias = "cantidadVisitas", deserialize_with = "de_u32")]
    pub cantidad_visitas: u32,
    #[serde(default, deserialize_with = "de_f64")]
    pub meta: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub puntos: f64,
    #[serde(default, alias = "fechaVisita", deserialize_with = "de_opt_string")]
    pub fecha_visita: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(flatten)]
    pub pdv: PointOfSale,
    #[serde(default, deserialize_with = "de_f64")]
    pub puntos: f64,
    #[serde(default, alias = "fechaReporte", deserialize_with = "de_opt_string")]
    pub fecha_reporte: Option<String>,
    #[serde(default)]
    pub productos: Vec<Product>,
}

/// One KPI row, tagged by category. Every consumer matches exhaustively
/// so a new category cannot be silently skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiRecord {
    Coverage(CoverageRecord),
    Volume(VolumeRecord),
    Visits(VisitRecord),
    Price(PriceRecord),
}

impl KpiRecord {
    /// Decode one backend row for the given category.
    pub fn from_value(kind: KpiKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            KpiKind::Coverage => Self::Coverage(serde_json::from_value(value)?),
            KpiKind::Volume => Self::Volume(serde_json::from_value(value)?),
            KpiKind::Visits => Self::Visits(serde_json::from_value(value)?),
            KpiKind::Price => Self::Price(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> KpiKind {
        match self {
            Self::Coverage(_) => KpiKind::Coverage,
            Self::Volume(_) => KpiKind::Volume,
            Self::Visits(_) => KpiKind::Visits,
            Self::Price(_) => KpiKind::Price,
        }
    }

    pub fn pdv(&self) -> &PointOfSale {
        match self {
            Self::Coverage(r) => &r.pdv,
            Self::Volume(r) => &r.pdv,
            Self::Visits(r) => &r.pdv,
            Self::Price(r) => &r.pdv,
        }
    }

    pub fn puntos(&self) -> f64 {
        match self {
            Self::Coverage(r) => r.puntos,
            Self::Volume(r) => r.puntos,
            Self::Visits(r) => r.puntos,
            Self::Price(r) => r.puntos,
        }
    }

    pub fn estado(&self) -> Option<&str> {
        self.pdv().estado.as_deref()
    }

    /// Numeric target, for categories that carry one.
    pub fn target(&self) -> Option<f64> {
        match self {
            Self::Volume(r) => Some(r.meta),
            Self::Visits(r) => Some(r.meta),
            Self::Coverage(_) | Self::Price(_) => None,
        }
    }

    /// Numeric actual, for categories that carry one.
    pub fn actual(&self) -> Option<f64> {
        match self {
            Self::Volume(r) => Some(r.real),
            Self::Visits(r) => Some(f64::from(r.cantidad_visitas)),
            Self::Coverage(_) | Self::Price(_) => None,
        }
    }

    /// Date the record was registered (ISO date, possibly with a time suffix).
    pub fn date(&self) -> Option<&str> {
        match self {
            Self::Coverage(r) => r.fecha_implementacion.as_deref(),
            Self::Volume(r) => r.fecha_registro.as_deref(),
            Self::Visits(r) => r.fecha_visita.as_deref(),
            Self::Price(r) => r.fecha_reporte.as_deref(),
        }
    }

    pub fn productos(&self) -> &[Product] {
        match self {
            Self::Volume(r) => &r.productos,
            Self::Price(r) => &r.productos,
            Self::Coverage(_) | Self::Visits(_) => &[],
        }
    }

    /// Gallons moved by this record: the volume actual, or the sum of the
    /// reported product volumes.
    pub fn galones(&self) -> f64 {
        match self {
            Self::Volume(r) => r.real,
            Self::Price(r) => r.productos.iter().map(|p| p.volumen_galones).sum(),
            Self::Coverage(_) | Self::Visits(_) => 0.0,
        }
    }
}

impl From<CoverageRecord> for KpiRecord {
    fn from(r: CoverageRecord) -> Self {
        Self::Coverage(r)
    }
}

impl From<VolumeRecord> for KpiRecord {
    fn from(r: VolumeRecord) -> Self {
        Self::Volume(r)
    }
}

impl From<VisitRecord> for KpiRecord {
    fn from(r: VisitRecord) -> Self {
        Self::Visits(r)
    }
}

impl From<PriceRecord> for KpiRecord {
    fn from(r: PriceRecord) -> Self {
        Self::Price(r)
    }
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

/// KPI records grouped by category. A record always lives under its own kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiDatasets {
    records: BTreeMap<KpiKind, Vec<KpiRecord>>,
}

impl KpiDatasets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = KpiRecord>) -> Self {
        let mut datasets = Self::new();
        for record in records {
            datasets.push(record);
        }
        datasets
    }

    pub fn push(&mut self, record: KpiRecord) {
        self.records.entry(record.kind()).or_default().push(record);
    }

    /// Replace one category. Records of another kind are dropped.
    pub fn set(&mut self, kind: KpiKind, mut records: Vec<KpiRecord>) {
        let before = records.len();
        records.retain(|r| r.kind() == kind);
        if records.len() != before {
            tracing::warn!(%kind, dropped = before - records.len(), "records of another KPI category ignored");
        }
        self.records.insert(kind, records);
    }

    pub fn get(&self, kind: KpiKind) -> &[KpiRecord] {
        self.records.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All categories in dashboard order, including empty ones.
    pub fn iter(&self) -> impl Iterator<Item = (KpiKind, &[KpiRecord])> + '_ {
        KpiKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }

    pub fn is_empty(&self) -> bool {
        self.records.values().all(Vec::is_empty)
    }

    pub fn total_records(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    /// Distinct PDVs across every category, deduplicated by code.
    pub fn distinct_pdvs(&self) -> usize {
        crate::aggregate::distinct_codes(self.records.values().flatten())
    }
}

/// Offline dump of everything a dashboard page fetches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub asesores: Vec<Advisor>,
    #[serde(default)]
    pub puntos_venta: Vec<PointOfSale>,
    #[serde(default)]
    pub cobertura: Vec<CoverageRecord>,
    #[serde(default)]
    pub volumen: Vec<VolumeRecord>,
    #[serde(default)]
    pub visitas: Vec<VisitRecord>,
    #[serde(default)]
    pub precios: Vec<PriceRecord>,
}

impl Snapshot {
    /// Move the KPI lists out as datasets; every category is present,
    /// possibly empty.
    pub fn take_datasets(&mut self) -> KpiDatasets {
        let mut datasets = KpiDatasets::new();
        datasets.set(KpiKind::Coverage, self.cobertura.drain(..).map(Into::into).collect());
        datasets.set(KpiKind::Volume, self.volumen.drain(..).map(Into::into).collect());
        datasets.set(KpiKind::Visits, self.visitas.drain(..).map(Into::into).collect());
        datasets.set(KpiKind::Price, self.precios.drain(..).map(Into::into).collect());
        datasets
    }
}

// ---------------------------------------------------------------------------
// Role scope
// ---------------------------------------------------------------------------

/// Which slice of the backend a dashboard reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataScope {
    /// Organization-wide view.
    Ot,
    /// Marketing view, scoped to one commercial agent.
    Mercadeo { agente: String },
}

impl DataScope {
    pub fn path_prefix(&self) -> String {
        match self {
            Self::Ot => "ot".to_string(),
            Self::Mercadeo { agente } => format!("mercadeo/{agente}"),
        }
    }

    /// Label used in report file names.
    pub fn user_type(&self) -> &'static str {
        match self {
            Self::Ot => "OT",
            Self::Mercadeo { .. } => "Mercadeo",
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient field decoding
//
// The backend mixes numeric and string ids, sends numbers as strings and
// uses null for missing text. Decode all of it into the typed fields.
// ---------------------------------------------------------------------------

fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn de_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.map(value_to_string).unwrap_or_default())
}

fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let s = de_string(d)?;
    let trimmed = s.trim();
    Ok(if trimmed.is_empty() { None } else { Some(trimmed.to_string()) })
}

fn de_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    let n = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().replace(',', ".").parse().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(if n.is_finite() { n } else { 0.0 })
}

fn de_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let n = de_f64(d)?;
    Ok(n.max(0.0).round().min(f64::from(u32::MAX)) as u32)
}

fn de_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "si" | "sí"),
        _ => false,
    })
}
