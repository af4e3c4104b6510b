//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod account;
pub mod course;
pub mod invitation;
pub mod registration_request;

pub use account::{AccountEntity, AccountRoleDb};
pub use course::CourseEntity;
pub use invitation::{InvitationEntity, InvitationKindDb, InvitationStateDb, InvitationUsageEntity};
pub use registration_request::{RegistrationRequestEntity, RequestStateDb};
