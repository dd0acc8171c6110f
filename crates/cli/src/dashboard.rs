//! `pchoque summary`, `detail` and `report`: the OT and Mercadeo pages.
//!
//! Both roles share one code path; the scope only changes which backend
//! slice is read and the label on the report file.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use plan_choque_client::{ChainedCredentials, StaticToken};
use plan_choque_config::Settings;
use plan_choque_kpi::access::{can_download_privileged_report, Role, UserIdentity};
use plan_choque_kpi::filter::parse_iso_date;
use plan_choque_kpi::group::{group_by_product, group_by_segment, price_checks};
use plan_choque_kpi::{ComplianceBand, DataScope, DateRange, FilterCriteria, KpiKind, PageState};
use plan_choque_report::build_report;
use serde_json::json;

use crate::exit_codes::{EXIT_FORBIDDEN, EXIT_PARTIAL_LOAD, EXIT_REPORT_DENIED};
use crate::page::Page;
use crate::render::{self, emit, OutputFormat};
use crate::source::{DataSource, LiveSource, SnapshotSource};
use crate::{settings, CliError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Ot,
    Mercadeo,
}

/// Detail table layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DetailView {
    /// One row per record
    Registros,
    /// Gallons per segment
    Segmento,
    /// Gallons per product reference
    Producto,
    /// Reported vs suggested price per product line
    Precios,
}

/// Page selection and filters shared by summary, detail and report.
#[derive(Debug, Clone, Default, Args)]
pub struct PageArgs {
    /// Read an offline snapshot instead of the backend
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Dashboard to open (default: the logged-in user's role; ot for snapshots)
    #[arg(long, value_enum)]
    pub scope: Option<ScopeArg>,

    /// Commercial agent: the mercadeo dashboard to open, or a filter on the ot dashboard
    #[arg(long)]
    pub agente: Option<String>,

    /// Advisor id
    #[arg(long)]
    pub asesor: Option<String>,

    /// PDV id or code
    #[arg(long)]
    pub pdv: Option<String>,

    /// Company
    #[arg(long)]
    pub compania: Option<String>,

    /// Segment
    #[arg(long)]
    pub segmento: Option<String>,

    /// Start date (YYYY-MM-DD), sent to the backend
    #[arg(long, value_parser = parse_date)]
    pub desde: Option<NaiveDate>,

    /// End date (YYYY-MM-DD), sent to the backend
    #[arg(long, value_parser = parse_date)]
    pub hasta: Option<NaiveDate>,

    /// Compliance band: 0-49, 50-79, 80-100, 100+
    #[arg(long, value_parser = parse_band)]
    pub rango: Option<ComplianceBand>,

    /// Show a single KPI category
    #[arg(long, value_parser = parse_kind)]
    pub metrica: Option<KpiKind>,

    /// KPI strategy table (TOML) overriding the settings for this run
    #[arg(long, value_name = "FILE")]
    pub kpi_table: Option<PathBuf>,

    /// Identity for offline privileged reports (checked against access.privilegedDomain)
    #[arg(long)]
    pub email: Option<String>,

    /// Use this token instead of the saved one
    #[arg(long, env = "PCHOQUE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    parse_iso_date(s).ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_band(s: &str) -> Result<ComplianceBand, String> {
    ComplianceBand::parse(s).map_err(|e| e.to_string())
}

pub fn parse_kind(s: &str) -> Result<KpiKind, String> {
    s.parse::<KpiKind>().map_err(|e| e.to_string())
}

impl PageArgs {
    /// Filters for a page opened under `scope`. On Mercadeo pages `--agente`
    /// picks the backend slice, so it is only a row filter on OT pages.
    pub fn criteria(&self, scope: &DataScope) -> Result<FilterCriteria, CliError> {
        let fechas = DateRange { desde: self.desde, hasta: self.hasta };
        if let (Some(desde), Some(hasta)) = (fechas.desde, fechas.hasta) {
            if desde > hasta {
                return Err(CliError::usage(format!("--desde {} is after --hasta {}", desde, hasta)));
            }
        }
        let text = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or_default().to_string();
        Ok(FilterCriteria {
            asesor: text(&self.asesor),
            pdv: text(&self.pdv),
            compania: text(&self.compania),
            agente: match scope {
                DataScope::Ot => text(&self.agente),
                DataScope::Mercadeo { .. } => String::new(),
            },
            segmento: text(&self.segmento),
            fechas,
            metrica: self.metrica,
            rango: self.rango,
        })
    }

    /// Scope asked for on the command line, if any.
    fn requested_scope(&self, user: Option<&UserIdentity>) -> Result<Option<DataScope>, CliError> {
        match self.scope {
            None => Ok(None),
            Some(ScopeArg::Ot) => Ok(Some(DataScope::Ot)),
            Some(ScopeArg::Mercadeo) => {
                let agente = self
                    .agente
                    .clone()
                    .filter(|a| !a.trim().is_empty())
                    .or_else(|| match user.and_then(UserIdentity::scope) {
                        Some(DataScope::Mercadeo { agente }) => Some(agente),
                        _ => None,
                    })
                    .ok_or_else(|| CliError::usage("--scope mercadeo needs --agente"))?;
                Ok(Some(DataScope::Mercadeo { agente }))
            }
        }
    }
}

/// Where a page's data and identity come from.
pub struct Session {
    pub scope: DataScope,
    pub user: Option<UserIdentity>,
    source: Box<dyn DataSource>,
}

impl Session {
    pub fn open(settings: &Settings, args: &PageArgs) -> Result<Self, CliError> {
        if let Some(path) = &args.input {
            let source = SnapshotSource::load(path).map_err(CliError::usage)?;
            let scope = args.requested_scope(None)?.unwrap_or(DataScope::Ot);
            let user = args.email.as_ref().map(|email| offline_identity(email));
            return Ok(Self { scope, user, source: Box::new(source) });
        }

        let client = match args.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => settings::client(settings, StaticToken(token.to_string()))?,
            None => settings::client(settings, ChainedCredentials::standard())?,
        };
        let user = client.me().map_err(CliError::api)?;

        let scope = match args.requested_scope(Some(&user))? {
            Some(scope) => scope,
            None => user.scope().ok_or_else(|| {
                CliError::new(EXIT_FORBIDDEN, "this account has no OT or Mercadeo dashboard")
                    .with_hint("pass --scope ot or --scope mercadeo --agente <ID>")
            })?,
        };
        tracing::info!(scope = %scope.path_prefix(), email = %user.email, "session opened");
        let source = Box::new(LiveSource::new(client, scope.clone()));
        Ok(Self { scope, user: Some(user), source })
    }

    pub fn page(&self, settings: &Settings, args: &PageArgs) -> Result<Page<'_>, CliError> {
        let table = settings::kpi_table(settings, args.kpi_table.as_deref())?;
        let mut page = Page::new(table, self.source.as_ref());
        page.open(args.criteria(&self.scope)?);
        Ok(page)
    }
}

fn offline_identity(email: &str) -> UserIdentity {
    UserIdentity {
        id: serde_json::Value::Null,
        name: String::new(),
        email: email.trim().to_string(),
        rol: Role::Other,
        agente_id: None,
        reporte_privilegiado: None,
    }
}

/// Warn about failed datasets; Err when any failed.
fn check_partial(page: &Page<'_>) -> Result<(), CliError> {
    if page.dashboard().state() != PageState::PartialError {
        return Ok(());
    }
    let errors = page.dashboard().errors();
    for (dataset, message) in &errors {
        eprintln!("warning: {}: {}", dataset.name(), message);
    }
    Err(CliError::new(EXIT_PARTIAL_LOAD, format!("{} dataset(s) failed to load", errors.len()))
        .with_hint("run the command again to retry"))
}

// ── summary ─────────────────────────────────────────────────────────

pub fn cmd_summary(settings: &Settings, args: &PageArgs, format: OutputFormat) -> Result<(), CliError> {
    let session = Session::open(settings, args)?;
    let page = session.page(settings, args)?;
    let dashboard = page.dashboard();

    let cards = dashboard.cards();
    let errors: Vec<_> = dashboard
        .errors()
        .into_iter()
        .map(|(dataset, message)| json!({ "dataset": dataset.name(), "message": message }))
        .collect();
    let value = json!({
        "scope": session.scope.path_prefix(),
        "cards": cards,
        "errores": errors,
    });
    emit(format, &render::cards_table(&cards), value)?;
    check_partial(&page)
}

// ── detail ──────────────────────────────────────────────────────────

pub fn cmd_detail(
    settings: &Settings,
    args: &PageArgs,
    kind: KpiKind,
    view: DetailView,
    format: OutputFormat,
) -> Result<(), CliError> {
    let session = Session::open(settings, args)?;
    let page = session.page(settings, args)?;
    let dashboard = page.dashboard();

    if let Some(message) = dashboard.dataset_error(plan_choque_kpi::Dataset::Kpi(kind)) {
        return Err(CliError::new(EXIT_PARTIAL_LOAD, format!("{}: {}", kind.label(), message)));
    }

    let records = dashboard.filtered(kind);
    let rule = dashboard.table().rule(kind);
    match view {
        DetailView::Registros => emit(format, &render::records_table(&records, rule), render::records_json(&records, rule)),
        DetailView::Segmento => {
            let rows = group_by_segment(&records);
            emit(format, &render::segments_table(&rows), json!(rows))
        }
        DetailView::Producto => {
            let rows = group_by_product(&records);
            emit(format, &render::products_table(&rows), json!(rows))
        }
        DetailView::Precios => {
            let rows = price_checks(&records);
            emit(format, &render::prices_table(&rows), json!(rows))
        }
    }
}

// ── report ──────────────────────────────────────────────────────────

/// The organization-wide report is privileged; agent-scoped ones are not.
pub fn check_report_access(settings: &Settings, scope: &DataScope, user: Option<&UserIdentity>) -> Result<(), CliError> {
    if !matches!(scope, DataScope::Ot) {
        return Ok(());
    }
    let allowed = user.is_some_and(|u| can_download_privileged_report(u, settings.privileged_domain()));
    if allowed {
        return Ok(());
    }
    let hint = if user.is_none() {
        "offline snapshots need --email with an address in access.privilegedDomain"
    } else {
        "ask an administrator for the privileged report capability"
    };
    Err(CliError::new(EXIT_REPORT_DENIED, "the OT report is not available for this user").with_hint(hint))
}

pub fn cmd_report(settings: &Settings, args: &PageArgs, out: &Path) -> Result<(), CliError> {
    let session = Session::open(settings, args)?;
    check_report_access(settings, &session.scope, session.user.as_ref())?;

    let page = session.page(settings, args)?;
    let dashboard = page.dashboard();
    let datasets = dashboard.report_datasets();
    if datasets.iter().all(|(kind, _)| dashboard.dataset_error(plan_choque_kpi::Dataset::Kpi(kind)).is_some()) {
        check_partial(&page)?;
    }

    let workbook = build_report(&datasets, session.scope.user_type(), &settings::report_options(settings), dashboard.table());
    let path = workbook.save(out).map_err(CliError::report)?;
    println!("{}", path.display());

    check_partial(&page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criteria_from_flags() {
        let args = PageArgs {
            compania: Some(" Terpel ".into()),
            desde: parse_iso_date("2025-03-01"),
            rango: Some(ComplianceBand::High),
            ..PageArgs::default()
        };
        let criteria = args.criteria(&DataScope::Ot).unwrap();
        assert_eq!(criteria.compania, "Terpel");
        assert!(criteria.asesor.is_empty());
        assert_eq!(criteria.rango, Some(ComplianceBand::High));
        assert!(!criteria.fechas.is_unbounded());
    }

    #[test]
    fn agente_filters_ot_pages_only() {
        let args = PageArgs { scope: Some(ScopeArg::Ot), agente: Some(" 12 ".into()), ..PageArgs::default() };
        assert_eq!(args.criteria(&DataScope::Ot).unwrap().agente, "12");

        let mercadeo = DataScope::Mercadeo { agente: "12".into() };
        assert!(args.criteria(&mercadeo).unwrap().agente.is_empty());
    }

    #[test]
    fn reversed_dates_are_rejected() {
        let args = PageArgs {
            desde: parse_iso_date("2025-04-01"),
            hasta: parse_iso_date("2025-03-01"),
            ..PageArgs::default()
        };
        assert_eq!(args.criteria(&DataScope::Ot).unwrap_err().code, crate::exit_codes::EXIT_USAGE);
    }

    #[test]
    fn mercadeo_scope_needs_an_agent() {
        let args = PageArgs { scope: Some(ScopeArg::Mercadeo), ..PageArgs::default() };
        assert!(args.requested_scope(None).is_err());

        let args = PageArgs { scope: Some(ScopeArg::Mercadeo), agente: Some("12".into()), ..PageArgs::default() };
        assert_eq!(
            args.requested_scope(None).unwrap(),
            Some(DataScope::Mercadeo { agente: "12".into() })
        );
    }

    #[test]
    fn ot_report_requires_privilege() {
        let mut settings = Settings::default();
        let user = offline_identity("ana@terpel.com");

        let denied = check_report_access(&settings, &DataScope::Ot, Some(&user)).unwrap_err();
        assert_eq!(denied.code, EXIT_REPORT_DENIED);
        assert_eq!(check_report_access(&settings, &DataScope::Ot, None).unwrap_err().code, EXIT_REPORT_DENIED);

        settings.privileged_domain = "terpel.com".into();
        assert!(check_report_access(&settings, &DataScope::Ot, Some(&user)).is_ok());

        let mercadeo = DataScope::Mercadeo { agente: "4".into() };
        assert!(check_report_access(&Settings::default(), &mercadeo, None).is_ok());
    }

    #[test]
    fn value_parsers() {
        assert_eq!(parse_kind("volumen").unwrap(), KpiKind::Volume);
        assert!(parse_kind("ventas").is_err());
        assert_eq!(parse_band("100+").unwrap(), ComplianceBand::Over);
        assert!(parse_date("01/03/2025").is_err());
    }
}
