//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 40-49   | backend          | Auth, network and dashboard load codes   |
//! | 50-59   | report           | Excel report generation and access       |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use plan_choque_client::ApiError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable input or settings file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Backend (40-49)
// =============================================================================

/// No token, or the backend answered 401.
pub const EXIT_SESSION_EXPIRED: u8 = 40;

/// Backend answered 403, or the role has no dashboard.
pub const EXIT_FORBIDDEN: u8 = 41;

/// Backend unreachable, timed out, or answered a non-auth HTTP error.
pub const EXIT_NETWORK: u8 = 42;

/// Backend answered 2xx with a body we cannot use (bad JSON, `success:false`).
pub const EXIT_UNEXPECTED_RESPONSE: u8 = 43;

/// At least one dataset failed to load; the rest were still printed.
pub const EXIT_PARTIAL_LOAD: u8 = 44;

// =============================================================================
// Report (50-59)
// =============================================================================

/// Workbook could not be built or written. No file was left behind.
pub const EXIT_REPORT_FAILED: u8 = 50;

/// The privileged report is not available to this user.
pub const EXIT_REPORT_DENIED: u8 = 51;

/// Map an API error to its exit code.
pub fn api_exit_code(err: &ApiError) -> u8 {
    match err {
        ApiError::SessionExpired => EXIT_SESSION_EXPIRED,
        ApiError::Forbidden => EXIT_FORBIDDEN,
        ApiError::Network(_) | ApiError::Http(..) => EXIT_NETWORK,
        ApiError::UnexpectedResponse(_) | ApiError::Rejected(_) => EXIT_UNEXPECTED_RESPONSE,
    }
}
