//! Domain models for school onboarding.

pub mod account;
pub mod course;
pub mod invitation;
pub mod registration_request;

pub use account::{Account, AccountRole};
pub use course::{Course, CourseSummary, StudentSummary};
pub use invitation::{
    CreateInvitationRequest, Invitation, InvitationFilter, InvitationKind, InvitationState,
    InvitationView, NewInvitation, UsageEntry, UsageResult,
};
pub use registration_request::{
    ApprovalResult, GuardianInfo, GuardianInput, RegistrationRequest, RejectRequest, RequestFilter,
    RequestState, ReviewRequest, StudentEntry, StudentInput, SubmitRegistrationRequest,
};
