//! Database repository layer

pub mod feedback_repo;
pub mod memory;
pub mod role_repo;
pub mod store;
pub mod user_repo;

pub use feedback_repo::FeedbackRepository;
pub use memory::InMemoryStore;
pub use role_repo::RoleRepository;
pub use store::{CredentialStore, FeedbackStore};
pub use user_repo::UserRepository;
