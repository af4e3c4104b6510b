//! Registration request domain models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use shared::validation::{parse_object_id, validate_invitation_code, validate_not_blank, validate_object_id};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::invitation::UsageResult;

/// Registration request lifecycle. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Pending,
    Approved,
    Rejected,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Pending => "PENDING",
            RequestState::Approved => "APPROVED",
            RequestState::Rejected => "REJECTED",
        }
    }
}

impl FromStr for RequestState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(RequestState::Pending),
            "APPROVED" => Ok(RequestState::Approved),
            "REJECTED" => Ok(RequestState::Rejected),
            other => Err(format!("Unknown request state: {}", other)),
        }
    }
}

/// Guardian details as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GuardianInfo {
    pub name: String,
    pub last_name: String,
    /// Stored trimmed and lower-cased.
    pub email: String,
    pub phone: Option<String>,
}

/// One student entry of a registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StudentEntry {
    pub name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub course_id: Uuid,
    pub student_code: Option<String>,
    pub email: Option<String>,
    pub is_existing_student: bool,
    pub existing_student_id: Option<Uuid>,
}

/// A guardian's application to create accounts for themselves and their students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegistrationRequest {
    pub id: Uuid,
    pub invitation_id: Uuid,
    pub school_id: Uuid,
    pub guardian: GuardianInfo,
    pub students: Vec<StudentEntry>,
    pub state: RequestState,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer_id: Option<Uuid>,
    pub comments: Option<String>,
    /// Guardian first, then newly created students in submission order.
    /// Empty unless the request is approved.
    pub created_account_ids: Vec<Uuid>,
}

/// Outcome of an approval.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ApprovalResult {
    pub request_id: Uuid,
    pub guardian_account_id: Uuid,
    /// Every student linked to the guardian, existing ones included, in submission order.
    pub student_account_ids: Vec<Uuid>,
    pub created_account_ids: Vec<Uuid>,
    pub invitation: UsageResult,
}

/// Filter for administrative request listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub school_id: Option<Uuid>,
    pub state: Option<RequestState>,
}

/// Public submission payload.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct SubmitRegistrationRequest {
    #[validate(custom(function = "validate_invitation_code"))]
    pub invitation_code: String,

    #[validate(nested)]
    pub guardian: GuardianInput,

    #[validate(length(min = 1, message = "At least one student is required"))]
    #[validate(nested)]
    pub students: Vec<StudentInput>,
}

/// Guardian part of the submission payload.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct GuardianInput {
    #[validate(custom(function = "validate_not_blank"))]
    #[validate(length(max = 100, message = "name must be at most 100 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_not_blank"))]
    #[validate(length(max = 100, message = "last_name must be at most 100 characters"))]
    pub last_name: String,

    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "Invalid guardian email"))]
    pub email: String,

    #[validate(length(max = 30, message = "phone must be at most 30 characters"))]
    pub phone: Option<String>,
}

/// Student part of the submission payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct StudentInput {
    #[validate(custom(function = "validate_not_blank"))]
    #[validate(length(max = 100, message = "name must be at most 100 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_not_blank"))]
    #[validate(length(max = 100, message = "last_name must be at most 100 characters"))]
    pub last_name: String,

    pub birth_date: Option<NaiveDate>,

    #[validate(custom(function = "validate_object_id"))]
    pub course_id: String,

    #[validate(length(min = 1, max = 32, message = "student_code must be 1-32 characters"))]
    pub student_code: Option<String>,

    #[serde(default, deserialize_with = "trimmed_option")]
    #[validate(email(message = "Invalid student email"))]
    pub email: Option<String>,

    /// Set when the student already has an account in the school.
    #[validate(custom(function = "validate_object_id"))]
    pub existing_student_id: Option<String>,
}

/// Emails are trimmed on the way in so that validation sees the final value.
fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

fn trimmed_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|v| v.trim().to_string()))
}

fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}

impl GuardianInput {
    pub fn into_info(self) -> GuardianInfo {
        GuardianInfo {
            name: self.name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: normalize_email(&self.email),
            phone: self.phone.filter(|p| !p.trim().is_empty()),
        }
    }
}

impl StudentInput {
    /// Converts into a stored entry, failing on malformed identifiers.
    pub fn into_entry(self) -> Result<StudentEntry, String> {
        let course_id = parse_object_id(&self.course_id)
            .ok_or_else(|| format!("Malformed course_id: {}", self.course_id))?;
        let existing_student_id = match self.existing_student_id.as_deref() {
            Some(raw) => Some(
                parse_object_id(raw).ok_or_else(|| format!("Malformed existing_student_id: {}", raw))?,
            ),
            None => None,
        };
        Ok(StudentEntry {
            name: self.name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            birth_date: self.birth_date,
            course_id,
            student_code: self.student_code,
            email: self.email.as_deref().map(normalize_email),
            is_existing_student: existing_student_id.is_some(),
            existing_student_id,
        })
    }
}

impl SubmitRegistrationRequest {
    /// Splits the payload into the code, guardian and student entries.
    pub fn into_parts(self) -> Result<(String, GuardianInfo, Vec<StudentEntry>), String> {
        let students = self
            .students
            .into_iter()
            .map(StudentInput::into_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((self.invitation_code, self.guardian.into_info(), students))
    }
}

/// Approve payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReviewRequest {
    pub reviewer_id: Uuid,
}

/// Reject payload; the reason is mandatory.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RejectRequest {
    pub reviewer_id: Uuid,

    #[validate(custom(function = "validate_not_blank"))]
    #[validate(length(max = 2000, message = "reason must be at most 2000 characters"))]
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission(students: serde_json::Value) -> SubmitRegistrationRequest {
        serde_json::from_value(json!({
            "invitation_code": "CU25-AB3K7M",
            "guardian": {
                "name": "Ana",
                "last_name": "Perez",
                "email": "  Ana.Perez@Example.com ",
                "phone": "+34 600 000 000"
            },
            "students": students
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_submission() {
        let course_id = Uuid::new_v4();
        let request = submission(json!([{
            "name": "Luis",
            "last_name": "Perez",
            "course_id": course_id.to_string(),
            "birth_date": "2015-04-02",
            "email": " Luis@Family.test\t"
        }]));
        assert!(request.validate().is_ok());

        let (code, guardian, students) = request.into_parts().unwrap();
        assert_eq!(code, "CU25-AB3K7M");
        assert_eq!(guardian.email, "ana.perez@example.com");
        assert_eq!(students[0].email.as_deref(), Some("luis@family.test"));
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].course_id, course_id);
        assert!(!students[0].is_existing_student);
    }

    #[test]
    fn test_empty_students_rejected() {
        let request = submission(json!([]));
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("students"));
    }

    #[test]
    fn test_padded_guardian_email_passes_validation() {
        let request = submission(json!([{
            "name": "Luis",
            "last_name": "Perez",
            "course_id": Uuid::new_v4().to_string()
        }]));
        assert_eq!(request.guardian.email, "Ana.Perez@Example.com");
        assert!(request.guardian.validate().is_ok());

        let padded_blank: GuardianInput = serde_json::from_value(json!({
            "name": "Ana",
            "last_name": "Perez",
            "email": "   "
        }))
        .unwrap();
        assert!(padded_blank.validate().is_err());
    }

    #[test]
    fn test_malformed_course_id_rejected() {
        let request = submission(json!([{
            "name": "Luis",
            "last_name": "Perez",
            "course_id": "not-a-course"
        }]));
        assert!(request.validate().is_err());
        assert!(request.into_parts().is_err());
    }

    #[test]
    fn test_bad_code_and_email_rejected() {
        let mut request = submission(json!([{
            "name": "Luis",
            "last_name": "Perez",
            "course_id": Uuid::new_v4().to_string()
        }]));
        request.invitation_code = "cu25-ab3k7m".into();
        assert!(request.validate().is_err());

        request.invitation_code = "CU25-AB3K7M".into();
        request.guardian.email = "not-an-email".into();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_existing_student_flag() {
        let existing = Uuid::new_v4();
        let request = submission(json!([{
            "name": "Luis",
            "last_name": "Perez",
            "course_id": Uuid::new_v4().to_string(),
            "existing_student_id": existing.to_string()
        }]));
        let (_, _, students) = request.into_parts().unwrap();
        assert!(students[0].is_existing_student);
        assert_eq!(students[0].existing_student_id, Some(existing));
    }

    #[test]
    fn test_reject_requires_reason() {
        let reject = RejectRequest {
            reviewer_id: Uuid::new_v4(),
            reason: "   ".into(),
        };
        assert!(reject.validate().is_err());
    }

    #[test]
    fn test_request_state_parse() {
        assert_eq!("pending".parse::<RequestState>().unwrap(), RequestState::Pending);
        assert_eq!("APPROVED".parse::<RequestState>().unwrap(), RequestState::Approved);
        assert!("archived".parse::<RequestState>().is_err());
    }
}
