use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Adviser,
    StudentAssistant,
    Treasurer,
    Officer,
    Occupant,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "adviser" => Some(Role::Adviser),
            "student_assistant" | "sa" => Some(Role::StudentAssistant),
            "treasurer" => Some(Role::Treasurer),
            "officer" => Some(Role::Officer),
            "occupant" => Some(Role::Occupant),
            _ => None,
        }
    }

    /// Roles allowed to run the cleaning rota.
    pub fn can_manage_cleaning(self) -> bool {
        matches!(self, Role::Admin | Role::Adviser | Role::StudentAssistant)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Adviser => "adviser",
            Role::StudentAssistant => "student_assistant",
            Role::Treasurer => "treasurer",
            Role::Officer => "officer",
            Role::Occupant => "occupant",
        };
        write!(f, "{s}")
    }
}

/// The caller of one request. Passed explicitly into every mutating engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub role: Role,
}

impl Actor {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    pub fn can_manage(&self) -> bool {
        self.role.can_manage_cleaning()
    }

    /// Fails before any work is done when the caller may not manage cleaning.
    pub fn require_manage(&self) -> Result<(), EngineError> {
        if self.can_manage() {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied("cleaning management requires a manager role"))
        }
    }
}
