//! Settings for one invocation, and the `config` commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use plan_choque_client::{ApiClient, CredentialProvider};
use plan_choque_config::Settings;
use plan_choque_kpi::KpiTable;
use plan_choque_report::ReportOptions;

use crate::CliError;

/// `--config` is strict: a broken file is a usage error. Without it the
/// default location is read leniently.
pub fn load(path: Option<&Path>) -> Result<Settings, CliError> {
    match path {
        Some(path) => {
            let mut settings = Settings::load_from(path).map_err(|e| CliError::usage(e.to_string()))?;
            settings.apply_env(|key| std::env::var(key).ok());
            Ok(settings)
        }
        None => Ok(Settings::load()),
    }
}

/// The KPI table from `--kpi-table`, or the one in the settings.
pub fn kpi_table(settings: &Settings, override_path: Option<&Path>) -> Result<KpiTable, CliError> {
    let Some(path) = override_path else {
        return Ok(settings.kpi.clone());
    };
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CliError::usage(format!("{}: {}", path.display(), e)))?;
    KpiTable::from_toml_str(&contents)
        .map_err(|e| CliError::usage(format!("{}: {}", path.display(), e)))
        .map_err(|e| e.with_hint("strategies: count_of_success (token), sum_of_fields, distinct_pdvs (quota)"))
}

pub fn report_options(settings: &Settings) -> ReportOptions {
    ReportOptions {
        label: settings.report_label.clone(),
        max_column_width: settings.max_column_width,
        include_empty_sheets: settings.include_empty_sheets,
        detail_sheets: settings.detail_sheets,
    }
}

pub fn client(settings: &Settings, credentials: impl CredentialProvider + 'static) -> Result<ApiClient, CliError> {
    ApiClient::new(&settings.api_base, Duration::from_secs(settings.timeout_secs.max(1)), credentials)
        .map_err(CliError::api)
}

// ── config commands ─────────────────────────────────────────────────

fn target(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(Settings::config_path)
}

pub fn cmd_config_init(path: Option<PathBuf>) -> Result<(), CliError> {
    let path = target(path);
    let created = Settings::write_default_file(&path).map_err(|e| CliError::error(e.to_string()))?;
    if created {
        eprintln!("Created {}", path.display());
    } else {
        eprintln!("{} already exists; left unchanged", path.display());
    }
    Ok(())
}

pub fn cmd_config_path(path: Option<PathBuf>) -> Result<(), CliError> {
    println!("{}", target(path).display());
    Ok(())
}

pub fn cmd_config_show(settings: &Settings) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(settings)
        .map_err(|e| CliError::error(format!("failed to encode settings: {}", e)))?;
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_load_reports_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load(Some(&path)).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_USAGE);
    }

    #[test]
    fn kpi_table_override_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kpi.toml");
        std::fs::write(&path, "[visitas]\naggregation = { strategy = \"sum_of_fields\" }\n").unwrap();

        let table = kpi_table(&Settings::default(), Some(&path)).unwrap();
        assert_eq!(
            table.rule(plan_choque_kpi::KpiKind::Visits).aggregation,
            plan_choque_kpi::Aggregation::SumOfFields
        );

        std::fs::write(&path, "[precios]\naggregation = { strategy = \"distinct_pdvs\", quota = 3 }\n").unwrap();
        assert!(kpi_table(&Settings::default(), Some(&path)).unwrap_err().hint.is_some());
    }

    #[test]
    fn report_options_follow_settings() {
        let mut settings = Settings::default();
        settings.report_label = "Informe".into();
        settings.detail_sheets = false;
        let options = report_options(&settings);
        assert_eq!(options.label, "Informe");
        assert!(!options.detail_sheets);
        assert_eq!(options.max_column_width, 50);
    }
}
