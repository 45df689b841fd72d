//! Exit codes and user-facing messages.

use semauth_auth::{AuthError, FailureKind};

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CliExitCode {
    Success = 0,
    /// The login comparison ran and did not pass.
    IncorrectCredentials = 1,
    InvalidInput = 2,
    Rejected = 3,
    Unavailable = 4,
    Internal = 5,
    Config = 6,
    Conflict = 7,
    NotFound = 8,
    Cancelled = 130,
}

impl From<CliExitCode> for i32 {
    fn from(code: CliExitCode) -> Self {
        code as i32
    }
}

/// Exit code for a failed operation.
pub fn exit_code_for(kind: FailureKind) -> CliExitCode {
    match kind {
        FailureKind::Rejected => CliExitCode::Rejected,
        FailureKind::Unavailable => CliExitCode::Unavailable,
        FailureKind::Internal => CliExitCode::Internal,
        FailureKind::Config => CliExitCode::Config,
        FailureKind::Cancelled => CliExitCode::Cancelled,
        FailureKind::InvalidInput => CliExitCode::InvalidInput,
        FailureKind::Conflict => CliExitCode::Conflict,
        FailureKind::NotFound => CliExitCode::NotFound,
    }
}

/// Message shown to the user. Outages never read like bad credentials.
pub fn user_message(err: &AuthError) -> String {
    match err {
        AuthError::ContentRejected { message } => format!("rejected by policy: {message}"),
        AuthError::UserExists(name) => format!("user {name} is already registered"),
        AuthError::UserNotFound(name) => format!("user {name} is not registered"),
        AuthError::InvalidInput(detail) => detail.clone(),
        AuthError::Config(detail) => format!("misconfigured: {detail}"),
        AuthError::Cancelled => "cancelled".to_string(),
        _ => match err.kind() {
            FailureKind::Unavailable => {
                "service temporarily unavailable, try again later".to_string()
            }
            _ => "internal error: stored credentials failed an integrity check".to_string(),
        },
    }
}
