//! Dashboard page state.
//!
//! A page tracks one fetch slot per dataset: the two reference lists and
//! the four KPI categories. Loads are issued in parallel by the caller;
//! this module only records their outcomes.
//!
//! Every load hands out a [`LoadTicket`]. A dataset remembers the
//! generation of its latest request, and a result carrying an older
//! generation is discarded. That covers both a reload that overtakes a
//! slow request and a page that was torn down while requests were in flight.

use std::collections::BTreeMap;

use crate::aggregate::{summarize, KpiSummary};
use crate::filter::{apply, apply_records, FilterCriteria};
use crate::model::{Advisor, KpiDatasets, KpiKind, KpiRecord, PointOfSale};
use crate::strategy::KpiTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dataset {
    Advisors,
    PointsOfSale,
    Kpi(KpiKind),
}

impl Dataset {
    pub const ALL: [Dataset; 6] = [
        Self::Advisors,
        Self::PointsOfSale,
        Self::Kpi(KpiKind::Coverage),
        Self::Kpi(KpiKind::Volume),
        Self::Kpi(KpiKind::Visits),
        Self::Kpi(KpiKind::Price),
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Advisors => "asesores",
            Self::PointsOfSale => "puntos-venta",
            Self::Kpi(kind) => kind.slug(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchState<T> {
    #[default]
    Idle,
    Loading,
    Ready(T),
    /// User-facing message.
    Failed(String),
}

impl<T> FetchState<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Ready(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Idle,
    Loading,
    Ready,
    /// Some datasets failed; the rest are usable.
    PartialError,
}

/// Outcome of one fetch, as delivered by the caller.
#[derive(Debug, Clone)]
pub enum DatasetResult {
    Advisors(Result<Vec<Advisor>, String>),
    PointsOfSale(Result<Vec<PointOfSale>, String>),
    Kpi(KpiKind, Result<Vec<KpiRecord>, String>),
}

impl DatasetResult {
    pub fn dataset(&self) -> Dataset {
        match self {
            Self::Advisors(_) => Dataset::Advisors,
            Self::PointsOfSale(_) => Dataset::PointsOfSale,
            Self::Kpi(kind, _) => Dataset::Kpi(*kind),
        }
    }
}

/// Requests issued together; results must present the same generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    table: KpiTable,
    criteria: FilterCriteria,
    generation: u64,
    in_flight: BTreeMap<Dataset, u64>,
    advisors: FetchState<Vec<Advisor>>,
    points: FetchState<Vec<PointOfSale>>,
    kpis: BTreeMap<KpiKind, FetchState<Vec<KpiRecord>>>,
}

impl Dashboard {
    pub fn new(table: KpiTable) -> Self {
        Self { table, ..Self::default() }
    }

    pub fn table(&self) -> &KpiTable {
        &self.table
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// Mark every dataset as loading.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.begin(Dataset::ALL.to_vec())
    }

    /// Manual retry of a single dataset.
    pub fn refetch(&mut self, dataset: Dataset) -> LoadTicket {
        self.begin(vec![dataset])
    }

    /// Mark `datasets` as loading under a fresh generation.
    pub fn begin(&mut self, datasets: Vec<Dataset>) -> LoadTicket {
        self.generation += 1;
        for dataset in &datasets {
            self.in_flight.insert(*dataset, self.generation);
            self.set_loading(*dataset);
        }
        tracing::debug!(generation = self.generation, count = datasets.len(), "dashboard load started");
        LoadTicket { generation: self.generation, datasets }
    }

    /// Forget every in-flight request; late results will be dropped.
    pub fn detach(&mut self) {
        self.in_flight.clear();
    }

    /// Record a fetch outcome. Returns false when the result is stale.
    pub fn apply(&mut self, generation: u64, result: DatasetResult) -> bool {
        let dataset = result.dataset();
        if self.in_flight.get(&dataset) != Some(&generation) {
            tracing::debug!(dataset = dataset.name(), generation, "stale result dropped");
            return false;
        }
        self.in_flight.remove(&dataset);

        match result {
            DatasetResult::Advisors(r) => self.advisors = settle(dataset, r),
            DatasetResult::PointsOfSale(r) => self.points = settle(dataset, r),
            DatasetResult::Kpi(kind, r) => {
                self.kpis.insert(kind, settle(dataset, r));
            }
        }
        true
    }

    fn set_loading(&mut self, dataset: Dataset) {
        match dataset {
            Dataset::Advisors => self.advisors = FetchState::Loading,
            Dataset::PointsOfSale => self.points = FetchState::Loading,
            Dataset::Kpi(kind) => {
                self.kpis.insert(kind, FetchState::Loading);
            }
        }
    }

    // ── State ───────────────────────────────────────────────────────

    pub fn dataset_error(&self, dataset: Dataset) -> Option<&str> {
        match dataset {
            Dataset::Advisors => self.advisors.error(),
            Dataset::PointsOfSale => self.points.error(),
            Dataset::Kpi(kind) => self.kpis.get(&kind).and_then(FetchState::error),
        }
    }

    fn dataset_loading(&self, dataset: Dataset) -> bool {
        match dataset {
            Dataset::Advisors => self.advisors.is_loading(),
            Dataset::PointsOfSale => self.points.is_loading(),
            Dataset::Kpi(kind) => self.kpis.get(&kind).is_some_and(FetchState::is_loading),
        }
    }

    fn dataset_idle(&self, dataset: Dataset) -> bool {
        match dataset {
            Dataset::Advisors => matches!(self.advisors, FetchState::Idle),
            Dataset::PointsOfSale => matches!(self.points, FetchState::Idle),
            Dataset::Kpi(kind) => self.kpis.get(&kind).map_or(true, |s| matches!(s, FetchState::Idle)),
        }
    }

    /// Failed datasets with their messages.
    pub fn errors(&self) -> Vec<(Dataset, &str)> {
        Dataset::ALL
            .into_iter()
            .filter_map(|d| self.dataset_error(d).map(|e| (d, e)))
            .collect()
    }

    pub fn state(&self) -> PageState {
        if Dataset::ALL.iter().all(|d| self.dataset_idle(*d)) {
            PageState::Idle
        } else if Dataset::ALL.iter().any(|d| self.dataset_loading(*d)) {
            PageState::Loading
        } else if Dataset::ALL.iter().any(|d| self.dataset_error(*d).is_some()) {
            PageState::PartialError
        } else {
            PageState::Ready
        }
    }

    // ── Filters ─────────────────────────────────────────────────────

    /// Replace the filter state. Returns the datasets that must be
    /// reloaded because the backend applies part of the filter (the date
    /// range); every other change is re-derived locally.
    pub fn set_criteria(&mut self, criteria: FilterCriteria) -> Vec<Dataset> {
        let dates_changed = criteria.fechas != self.criteria.fechas;
        self.criteria = criteria;
        if dates_changed {
            KpiKind::ALL.into_iter().map(Dataset::Kpi).collect()
        } else {
            Vec::new()
        }
    }

    /// Mutate the filter in place, e.g. through the cascade helpers.
    pub fn update_criteria(&mut self, f: impl FnOnce(&mut FilterCriteria, &[PointOfSale])) -> Vec<Dataset> {
        let mut next = self.criteria.clone();
        f(&mut next, self.points());
        self.set_criteria(next)
    }

    // ── Derived views ───────────────────────────────────────────────

    pub fn advisors(&self) -> &[Advisor] {
        self.advisors.data().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn points(&self) -> &[PointOfSale] {
        self.points.data().map(Vec::as_slice).unwrap_or(&[])
    }

    /// PDV options for the selector, narrowed by company and advisor.
    pub fn point_options(&self) -> Vec<PointOfSale> {
        let scoped = FilterCriteria {
            compania: self.criteria.compania.clone(),
            asesor: self.criteria.asesor.clone(),
            agente: self.criteria.agente.clone(),
            ..FilterCriteria::default()
        };
        apply(self.points(), &scoped)
    }

    /// Filtered records of one category; empty unless the dataset is ready.
    pub fn filtered(&self, kind: KpiKind) -> Vec<KpiRecord> {
        match self.kpis.get(&kind).and_then(FetchState::data) {
            Some(records) => apply_records(records, &self.criteria, &self.table),
            None => Vec::new(),
        }
    }

    /// Categories shown on the page: the selected metric, or all of them.
    pub fn visible_kinds(&self) -> Vec<KpiKind> {
        match self.criteria.metrica {
            Some(kind) => vec![kind],
            None => KpiKind::ALL.to_vec(),
        }
    }

    /// Metric cards for the ready, visible categories.
    pub fn cards(&self) -> Vec<KpiSummary> {
        self.visible_kinds()
            .into_iter()
            .filter(|kind| self.kpis.get(kind).and_then(FetchState::data).is_some())
            .map(|kind| summarize(&self.filtered(kind), kind, self.table.rule(kind)))
            .collect()
    }

    /// Currently filtered records of every ready category, for the report.
    pub fn report_datasets(&self) -> KpiDatasets {
        let mut datasets = KpiDatasets::new();
        for kind in KpiKind::ALL {
            if self.kpis.get(&kind).and_then(FetchState::data).is_some() {
                datasets.set(kind, self.filtered(kind));
            }
        }
        datasets
    }
}

fn settle<T>(dataset: Dataset, result: Result<T, String>) -> FetchState<T> {
    match result {
        Ok(data) => FetchState::Ready(data),
        Err(msg) => {
            tracing::warn!(dataset = dataset.name(), error = %msg, "dataset failed to load");
            FetchState::Failed(msg)
        }
    }
}
