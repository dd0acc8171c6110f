//! Dashboard page controller.
//!
//! Wires a [`DataSource`] into a [`Dashboard`]: every dataset of a load is
//! fetched on its own scoped thread, and the results go back through the
//! load ticket so a superseded load can never overwrite a newer one.

use std::thread;

use plan_choque_kpi::{Dashboard, Dataset, DatasetResult, FilterCriteria, KpiTable, LoadTicket, PageState};

use crate::source::{self, DataSource};

pub struct Page<'a> {
    dashboard: Dashboard,
    source: &'a dyn DataSource,
}

impl<'a> Page<'a> {
    pub fn new(table: KpiTable, source: &'a dyn DataSource) -> Self {
        Self { dashboard: Dashboard::new(table), source }
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    /// Initial load with the given filter.
    pub fn open(&mut self, criteria: FilterCriteria) -> PageState {
        self.dashboard.set_criteria(criteria);
        let ticket = self.dashboard.begin_load();
        self.run(ticket);
        self.dashboard.state()
    }

    /// Change the filter; reloads only what the backend filters.
    pub fn set_criteria(&mut self, criteria: FilterCriteria) -> PageState {
        let reload = self.dashboard.set_criteria(criteria);
        if !reload.is_empty() {
            let ticket = self.dashboard.begin(reload);
            self.run(ticket);
        }
        self.dashboard.state()
    }

    /// Manual retry of one dataset.
    pub fn refetch(&mut self, dataset: Dataset) -> PageState {
        let ticket = self.dashboard.refetch(dataset);
        self.run(ticket);
        self.dashboard.state()
    }

    fn run(&mut self, ticket: LoadTicket) {
        let range = self.dashboard.criteria().fechas;
        let source = self.source;
        tracing::info!(generation = ticket.generation, source = source.name(), datasets = ticket.datasets.len(), "loading");

        let results: Vec<DatasetResult> = thread::scope(|s| {
            let handles: Vec<_> = ticket
                .datasets
                .iter()
                .map(|&dataset| (dataset, s.spawn(move || source.fetch(dataset, &range))))
                .collect();
            handles
                .into_iter()
                .map(|(dataset, handle)| {
                    handle.join().unwrap_or_else(|_| source::failed(dataset, "la consulta terminó inesperadamente"))
                })
                .collect()
        });

        for result in results {
            self.dashboard.apply(ticket.generation, result);
        }
    }
}
