//! `plan-choque-kpi`: KPI engine for the Plan Choque dashboards.
//!
//! Pure engine crate: receives records already fetched from the backend,
//! filters and aggregates them. No HTTP, no file IO.

pub mod access;
pub mod aggregate;
pub mod dashboard;
pub mod draft;
pub mod error;
pub mod filter;
pub mod group;
pub mod model;
pub mod strategy;

pub use aggregate::{percentage, summarize, summarize_all, KpiSummary};
pub use dashboard::{Dashboard, Dataset, DatasetResult, FetchState, LoadTicket, PageState};
pub use error::KpiError;
pub use filter::{apply, ComplianceBand, DateRange, FilterCriteria, FilterField, Filterable};
pub use model::{
    Advisor, CoverageRecord, DataScope, KpiDatasets, KpiKind, KpiRecord, PointOfSale,
    PriceRecord, Product, VisitRecord, VolumeRecord,
};
pub use strategy::{Aggregation, CategoryRule, Clamp, KpiTable};
