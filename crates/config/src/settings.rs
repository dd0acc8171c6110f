// Application settings
// Loaded from ~/.config/plan-choque/settings.json

use std::fs;
use std::path::{Path, PathBuf};

use plan_choque_kpi::KpiTable;
use serde::{Deserialize, Serialize};

/// Overrides `api.base` when set.
pub const API_BASE_ENV: &str = "PCHOQUE_API_BASE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid KPI table in {path}: {source}")]
    Kpi {
        path: PathBuf,
        #[source]
        source: plan_choque_kpi::KpiError,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Backend
    #[serde(rename = "api.base")]
    pub api_base: String,

    #[serde(rename = "api.timeoutSecs")]
    pub timeout_secs: u64,

    // Report
    #[serde(rename = "report.label")]
    pub report_label: String,

    #[serde(rename = "report.maxColumnWidth")]
    pub max_column_width: usize,

    #[serde(rename = "report.includeEmptySheets")]
    pub include_empty_sheets: bool,

    #[serde(rename = "report.detailSheets")]
    pub detail_sheets: bool,

    // Access
    /// Email domain allowed to download the privileged report when the
    /// backend does not say. Empty = nobody.
    #[serde(rename = "access.privilegedDomain")]
    pub privileged_domain: String,

    // KPI strategies
    #[serde(rename = "kpi")]
    pub kpi: KpiTable,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:4000".to_string(),
            timeout_secs: 30,
            report_label: "Reporte_Plan_Choque".to_string(),
            max_column_width: 50,
            include_empty_sheets: false,
            detail_sheets: true,
            privileged_domain: String::new(),
            kpi: KpiTable::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("plan-choque")
            .join("settings.json")
    }

    /// Load settings from disk, falling back to defaults. The environment
    /// override is applied in both cases.
    pub fn load() -> Self {
        let path = Self::config_path();
        let mut settings = if path.exists() {
            Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "using default settings");
                Self::default()
            })
        } else {
            Self::default()
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    /// Strict load: any read, parse or KPI table error is returned.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let settings = Self::parse(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        settings
            .kpi
            .validate()
            .map_err(|source| ConfigError::Kpi { path: path.to_path_buf(), source })?;
        Ok(settings)
    }

    /// Parse settings JSON, skipping `//` comment lines.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    /// Apply environment overrides, reading variables through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(base) = var(API_BASE_ENV).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            tracing::debug!(api_base = %base, "api base from environment");
            self.api_base = base;
        }
    }

    /// Configured domain, or None when the fallback is disabled.
    pub fn privileged_domain(&self) -> Option<&str> {
        Some(self.privileged_domain.trim()).filter(|d| !d.is_empty())
    }

    /// Save current settings to disk
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source: std::io::Error| ConfigError::Write { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        fs::write(path, json).map_err(write_err)
    }

    /// Write the commented default file. Never overwrites an existing one;
    /// returns false in that case.
    pub fn write_default_file(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        let write_err = |source: std::io::Error| ConfigError::Write { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, DEFAULT_CONFIG).map_err(write_err)?;
        Ok(true)
    }
}

const DEFAULT_CONFIG: &str = r#"{
    // Backend (PCHOQUE_API_BASE overrides api.base)
    "api.base": "http://localhost:4000",
    "api.timeoutSecs": 30,

    // Excel report
    "report.label": "Reporte_Plan_Choque",
    "report.maxColumnWidth": 50,
    "report.includeEmptySheets": false,
    "report.detailSheets": true,

    // Privileged report fallback, used only when the backend does not
    // send reporte_privilegiado. Empty = nobody.
    "access.privilegedDomain": "",

    // KPI strategy per category
    // strategies: count_of_success (token), sum_of_fields, distinct_pdvs (quota)
    // clamp: "none" or "at_hundred"
    "kpi": {
        "cobertura": { "aggregation": { "strategy": "count_of_success", "token": "REGISTRADO" }, "clamp": "none" },
        "volumen":   { "aggregation": { "strategy": "sum_of_fields" }, "clamp": "none" },
        "visitas":   { "aggregation": { "strategy": "distinct_pdvs", "quota": 30 }, "clamp": "at_hundred" },
        "precios":   { "aggregation": { "strategy": "count_of_success", "token": "REPORTADOS" }, "clamp": "none" }
    }
}
"#;
