use ulid::Ulid;

use crate::model::RestLevel;

#[derive(Debug)]
pub enum EngineError {
    /// No semester is marked active for the tenant.
    NoActiveSemester,
    NoActiveAreas,
    NoEligibleRooms { rest_level: Option<RestLevel> },
    PermissionDenied(&'static str),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    InvalidInput(String),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NoActiveSemester => {
                write!(f, "no active semester configured")
            }
            EngineError::NoActiveAreas => {
                write!(f, "no active cleaning areas: add or activate an area before generating")
            }
            EngineError::NoEligibleRooms { rest_level } => match rest_level {
                Some(level) => write!(
                    f,
                    "no eligible rooms with rest level {level}: check rest-level settings and room data"
                ),
                None => write!(f, "no eligible rooms: check rest-level settings and room data"),
            },
            EngineError::PermissionDenied(msg) => write!(f, "permission denied: {msg}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
