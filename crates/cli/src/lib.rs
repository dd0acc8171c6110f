// Plan Choque CLI - dashboards, detail tables and Excel reports from the terminal

pub mod auth;
pub mod dashboard;
pub mod exit_codes;
pub mod implementation;
pub mod logging;
pub mod page;
pub mod render;
pub mod settings;
pub mod source;

use plan_choque_client::ApiError;
use plan_choque_report::ReportError;

use exit_codes::{api_exit_code, EXIT_ERROR, EXIT_REPORT_FAILED, EXIT_SESSION_EXPIRED, EXIT_USAGE};

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Create error from an API error with the matching exit code.
    pub fn api(err: ApiError) -> Self {
        let code = api_exit_code(&err);
        let hint = match &err {
            ApiError::SessionExpired => Some("run `pchoque login --token <TOKEN>` or set PCHOQUE_TOKEN".to_string()),
            ApiError::Network(_) => Some("check api.base in the settings file or PCHOQUE_API_BASE".to_string()),
            _ => None,
        };
        let message = match &err {
            // the backend body is logged at debug level, not shown
            ApiError::Http(..) => err.user_message(),
            _ => format!("{} ({})", err.user_message(), err),
        };
        tracing::debug!(error = %err, code, "api error");
        Self { code, message, hint }
    }

    pub fn report(err: ReportError) -> Self {
        Self::new(EXIT_REPORT_FAILED, format!("no se pudo generar el reporte: {}", err))
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_session_expired(&self) -> bool {
        self.code == EXIT_SESSION_EXPIRED
    }
}
