//! Course roster models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::Account;

/// A course and its student roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Course {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub grade: String,
    pub section: String,
    /// Roster; a student appears at most once.
    pub student_ids: Vec<Uuid>,
}

impl Course {
    /// Human-readable label such as `"3rd Grade B"`.
    pub fn label(&self) -> String {
        match (self.grade.is_empty(), self.section.is_empty()) {
            (false, false) => format!("{} {}", self.grade, self.section),
            (false, true) => self.grade.clone(),
            (true, false) => self.section.clone(),
            (true, true) => self.name.clone(),
        }
    }
}

/// Course info exposed alongside a validated invitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CourseSummary {
    pub id: Uuid,
    pub name: String,
    pub grade: String,
    pub section: String,
}

impl From<&Course> for CourseSummary {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id,
            name: course.name.clone(),
            grade: course.grade.clone(),
            section: course.section.clone(),
        }
    }
}

/// Student info exposed alongside a validated invitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StudentSummary {
    pub id: Uuid,
    pub name: String,
    pub last_name: String,
}

impl From<&Account> for StudentSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            last_name: account.last_name.clone(),
        }
    }
}
