//! Role values granted to subjects.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capability role mirrored between identity claims and profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Delivery personnel.
    Rider,
    Admin,
    SuperAdmin,
    /// No role granted.
    #[default]
    None,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Rider => "RIDER",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::None => "NONE",
        }
    }

    /// Returns true for any role other than [`Role::None`].
    pub fn is_granted(&self) -> bool {
        !matches!(self, Role::None)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RIDER" => Ok(Role::Rider),
            "ADMIN" => Ok(Role::Admin),
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            "NONE" => Ok(Role::None),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}
