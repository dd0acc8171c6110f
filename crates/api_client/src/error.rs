/// Error type for backend calls.
///
/// Authentication and authorization failures are their own variants so
/// callers can tell "log in again" apart from "you may not see this" and
/// from a server or network fault.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// No token available, or the backend answered 401.
    #[error("session expired or missing")]
    SessionExpired,

    /// The backend answered 403.
    #[error("forbidden")]
    Forbidden,

    /// Body is not the expected JSON envelope.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Connection, TLS or timeout failure; no HTTP status received.
    #[error("network error: {0}")]
    Network(String),

    /// Any other non-success status.
    #[error("HTTP {0}: {1}")]
    Http(u16, String),

    /// `success: false` in the response envelope.
    #[error("rejected by server: {0}")]
    Rejected(String),
}

impl ApiError {
    /// Text shown to the dashboard user.
    pub fn user_message(&self) -> String {
        match self {
            Self::SessionExpired => "Tu sesión ha expirado. Inicia sesión nuevamente.".to_string(),
            Self::Forbidden => "No tienes permisos para ver esta información.".to_string(),
            Self::UnexpectedResponse(_) => "El servidor envió una respuesta inesperada.".to_string(),
            Self::Network(_) => "Error de conexión con el servidor.".to_string(),
            Self::Http(status, _) => format!("Error del servidor ({status})."),
            Self::Rejected(msg) if msg.trim().is_empty() => "El servidor rechazó la solicitud.".to_string(),
            Self::Rejected(msg) => msg.clone(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::Forbidden)
    }
}
