//! Where a dashboard page gets its datasets: the live backend or an
//! offline snapshot file.

use std::path::Path;

use plan_choque_client::{ApiClient, ApiError};
use plan_choque_kpi::model::Snapshot;
use plan_choque_kpi::{DataScope, Dataset, DatasetResult, DateRange, KpiDatasets, KpiKind, KpiRecord};
use plan_choque_kpi::{Advisor, PointOfSale};

/// One fetch per dataset. Called concurrently from scoped threads.
pub trait DataSource: Sync {
    /// Fetch `dataset`; the date range only applies to KPI datasets.
    fn fetch(&self, dataset: Dataset, range: &DateRange) -> DatasetResult;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Result slot for a fetch that never produced one.
pub fn failed(dataset: Dataset, message: impl Into<String>) -> DatasetResult {
    let message = message.into();
    match dataset {
        Dataset::Advisors => DatasetResult::Advisors(Err(message)),
        Dataset::PointsOfSale => DatasetResult::PointsOfSale(Err(message)),
        Dataset::Kpi(kind) => DatasetResult::Kpi(kind, Err(message)),
    }
}

// ── Live backend ────────────────────────────────────────────────────

pub struct LiveSource {
    client: ApiClient,
    scope: DataScope,
}

impl LiveSource {
    pub fn new(client: ApiClient, scope: DataScope) -> Self {
        Self { client, scope }
    }
}

impl DataSource for LiveSource {
    fn fetch(&self, dataset: Dataset, range: &DateRange) -> DatasetResult {
        let message = |e: ApiError| e.user_message();
        match dataset {
            Dataset::Advisors => DatasetResult::Advisors(self.client.advisors(&self.scope).map_err(message)),
            Dataset::PointsOfSale => {
                DatasetResult::PointsOfSale(self.client.points_of_sale(&self.scope).map_err(message))
            }
            Dataset::Kpi(kind) => DatasetResult::Kpi(kind, self.client.kpi(kind, &self.scope, range).map_err(message)),
        }
    }

    fn name(&self) -> &'static str {
        "backend"
    }
}

// ── Snapshot file ───────────────────────────────────────────────────

/// Offline dump of a page. The date range is applied here the way the
/// backend applies it.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    advisors: Vec<Advisor>,
    points: Vec<PointOfSale>,
    datasets: KpiDatasets,
}

impl SnapshotSource {
    pub fn from_snapshot(mut snapshot: Snapshot) -> Self {
        let datasets = snapshot.take_datasets();
        Self { advisors: snapshot.asesores, points: snapshot.puntos_venta, datasets }
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Snapshot>(contents).map(Self::from_snapshot)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
        Self::from_json(&contents).map_err(|e| format!("{}: invalid snapshot: {}", path.display(), e))
    }

    fn records(&self, kind: KpiKind, range: &DateRange) -> Vec<KpiRecord> {
        self.datasets
            .get(kind)
            .iter()
            .filter(|r| range.contains(r.date()))
            .cloned()
            .collect()
    }
}

impl DataSource for SnapshotSource {
    fn fetch(&self, dataset: Dataset, range: &DateRange) -> DatasetResult {
        match dataset {
            Dataset::Advisors => DatasetResult::Advisors(Ok(self.advisors.clone())),
            Dataset::PointsOfSale => DatasetResult::PointsOfSale(Ok(self.points.clone())),
            Dataset::Kpi(kind) => DatasetResult::Kpi(kind, Ok(self.records(kind, range))),
        }
    }

    fn name(&self) -> &'static str {
        "snapshot"
    }
}
