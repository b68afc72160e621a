//! Business logic services layer

pub mod auth_service;
pub mod cache;
pub mod feedback_service;
pub mod mailer;
pub mod user_service;

pub use auth_service::AuthService;
pub use cache::UserCache;
pub use feedback_service::FeedbackService;
pub use mailer::{EmailSender, LogMailer};
pub use user_service::UserService;
