//! `pchoque login`, `logout` and `whoami`.

use plan_choque_client::{
    delete_auth, load_auth, save_auth, ChainedCredentials, StaticToken, StoredCredentials,
};
use plan_choque_config::Settings;
use plan_choque_kpi::access::{can_download_privileged_report, Role, UserIdentity};
use plan_choque_kpi::DataScope;
use serde_json::json;

use crate::exit_codes::EXIT_USAGE;
use crate::render::{emit, OutputFormat, Table};
use crate::{settings, CliError};

pub fn role_name(role: Role) -> &'static str {
    match role {
        Role::Asesor => "asesor",
        Role::Mercadeo => "mercadeo",
        Role::Ot => "ot",
        Role::Admin => "admin",
        Role::Other => "otro",
    }
}

pub fn scope_name(scope: &DataScope) -> String {
    match scope {
        DataScope::Ot => "ot".to_string(),
        DataScope::Mercadeo { agente } => format!("mercadeo (agente {})", agente),
    }
}

// ── Login ───────────────────────────────────────────────────────────

pub fn cmd_login(settings: &Settings, token: Option<String>) -> Result<(), CliError> {
    let token = token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).ok_or_else(|| CliError {
        code: EXIT_USAGE,
        message: "No token provided".into(),
        hint: Some("pass --token or set PCHOQUE_TOKEN".into()),
    })?;

    // Verify the token works before saving it
    let client = settings::client(settings, StaticToken(token.clone()))?;
    let user = client.me().map_err(CliError::api)?;

    let creds = StoredCredentials {
        token,
        api_base: Some(settings.api_base.clone()),
        email: Some(user.email.clone()).filter(|e| !e.is_empty()),
    };
    let path = save_auth(&creds).map_err(|e| CliError::error(e.to_string()))?;

    tracing::info!(path = %path.display(), "credentials saved");
    eprintln!("Authenticated as {} ({})", display_name(&user), user.email);
    Ok(())
}

pub fn cmd_logout() -> Result<(), CliError> {
    delete_auth().map_err(|e| CliError::error(e.to_string()))?;
    eprintln!("Logged out");
    Ok(())
}

// ── Whoami ──────────────────────────────────────────────────────────

pub fn cmd_whoami(settings: &Settings, format: OutputFormat) -> Result<(), CliError> {
    if let Some(stored) = load_auth() {
        if let Some(base) = stored.api_base.filter(|b| *b != settings.api_base) {
            tracing::warn!(saved = %base, current = %settings.api_base, "token was saved for another backend");
        }
    }

    let client = settings::client(settings, ChainedCredentials::standard())?;
    let user = client.me().map_err(CliError::api)?;
    let privileged = can_download_privileged_report(&user, settings.privileged_domain());
    let scope = user.scope();

    let mut table = Table::new(&["Campo", "Valor"]);
    table.push(vec!["Nombre".into(), display_name(&user).to_string()]);
    table.push(vec!["Email".into(), user.email.clone()]);
    table.push(vec!["Rol".into(), role_name(user.rol).into()]);
    table.push(vec!["Tablero".into(), scope.as_ref().map(scope_name).unwrap_or_else(|| "-".into())]);
    table.push(vec!["Reporte privilegiado".into(), if privileged { "sí" } else { "no" }.into()]);

    let value = json!({
        "name": user.name,
        "email": user.email,
        "rol": role_name(user.rol),
        "scope": scope.as_ref().map(DataScope::path_prefix),
        "reporte_privilegiado": privileged,
    });
    emit(format, &table, value)
}

fn display_name(user: &UserIdentity) -> &str {
    if user.name.trim().is_empty() {
        &user.email
    } else {
        &user.name
    }
}
