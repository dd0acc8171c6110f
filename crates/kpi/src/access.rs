//! Who is looking at the dashboard and which reports they may download.

use serde::{Deserialize, Serialize};

use crate::model::DataScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Asesor,
    Mercadeo,
    Ot,
    Admin,
    #[serde(other)]
    Other,
}

/// Identity returned by the backend's `auth/me` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_role", alias = "role")]
    pub rol: Role,
    /// Agent the marketing user is scoped to.
    #[serde(default)]
    pub agente_id: Option<serde_json::Value>,
    /// Capability granted by the backend; authoritative when present.
    #[serde(default)]
    pub reporte_privilegiado: Option<bool>,
}

fn default_role() -> Role {
    Role::Other
}

impl UserIdentity {
    /// Dashboard scope for this user, when the role has one.
    pub fn scope(&self) -> Option<DataScope> {
        match self.rol {
            Role::Ot | Role::Admin => Some(DataScope::Ot),
            Role::Mercadeo => {
                let agente = match self.agente_id.as_ref()? {
                    serde_json::Value::String(s) if !s.is_empty() => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    _ => return None,
                };
                Some(DataScope::Mercadeo { agente })
            }
            Role::Asesor | Role::Other => None,
        }
    }
}

/// Whether the privileged (organization-wide) report is offered.
///
/// The backend capability decides. Only when the backend does not send
/// one is the configured email domain consulted; no domain means no access.
pub fn can_download_privileged_report(user: &UserIdentity, fallback_domain: Option<&str>) -> bool {
    if let Some(granted) = user.reporte_privilegiado {
        return granted;
    }
    let Some(domain) = fallback_domain.map(str::trim).filter(|d| !d.is_empty()) else {
        return false;
    };
    let domain = domain.trim_start_matches('@').to_ascii_lowercase();
    user.email
        .trim()
        .to_ascii_lowercase()
        .rsplit_once('@')
        .is_some_and(|(_, host)| host == domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(email: &str, flag: Option<bool>) -> UserIdentity {
        UserIdentity {
            id: json!(1),
            name: "Ana".into(),
            email: email.into(),
            rol: Role::Ot,
            agente_id: None,
            reporte_privilegiado: flag,
        }
    }

    #[test]
    fn backend_flag_wins() {
        assert!(can_download_privileged_report(&user("a@gmail.com", Some(true)), Some("terpel.com")));
        assert!(!can_download_privileged_report(&user("a@terpel.com", Some(false)), Some("terpel.com")));
    }

    #[test]
    fn domain_fallback_matches_host_exactly() {
        let domain = Some("@terpel.com");
        assert!(can_download_privileged_report(&user("Ana@Terpel.com", None), domain));
        assert!(!can_download_privileged_report(&user("ana@noterpel.com", None), domain));
        assert!(!can_download_privileged_report(&user("ana@terpel.com.co", None), domain));
    }

    #[test]
    fn no_flag_no_domain_denies() {
        assert!(!can_download_privileged_report(&user("a@terpel.com", None), None));
        assert!(!can_download_privileged_report(&user("a@terpel.com", None), Some(" ")));
    }

    #[test]
    fn identity_decodes_role_and_scope() {
        let u: UserIdentity = serde_json::from_value(json!({
            "id": 5, "name": "Luis", "email": "l@x.co", "rol": "mercadeo", "agente_id": 12
        }))
        .unwrap();
        assert_eq!(u.rol, Role::Mercadeo);
        assert_eq!(u.scope(), Some(DataScope::Mercadeo { agente: "12".into() }));

        let u: UserIdentity = serde_json::from_value(json!({ "email": "x@y.z", "rol": "supervisor" })).unwrap();
        assert_eq!(u.rol, Role::Other);
        assert_eq!(u.scope(), None);
    }
}
