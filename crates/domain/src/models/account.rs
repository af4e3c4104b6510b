//! Account models (guardians, students, administrators).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Role of an account in a school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountRole {
    Guardian,
    Student,
    Admin,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Guardian => "GUARDIAN",
            AccountRole::Student => "STUDENT",
            AccountRole::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GUARDIAN" => Ok(AccountRole::Guardian),
            "STUDENT" => Ok(AccountRole::Student),
            "ADMIN" => Ok(AccountRole::Admin),
            other => Err(format!("Unknown account role: {}", other)),
        }
    }
}

/// A user account as held by the account directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Account {
    pub id: Uuid,
    pub school_id: Uuid,
    pub role: AccountRole,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Student code for students; guardians get one too but rarely use it.
    pub code: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub active: bool,
    /// Students associated with a guardian, in association order.
    pub associated_student_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.last_name)
    }
}
