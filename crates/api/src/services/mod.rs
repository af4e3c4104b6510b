//! Application services.

pub mod email;
pub mod notifier;
pub mod onboarding;

pub use email::EmailService;
pub use notifier::LogNotifier;
pub use onboarding::{OnboardingService, OnboardingSettings};
