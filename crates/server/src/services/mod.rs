//! Orchestration services behind the HTTP handlers.

pub mod confirm;
pub mod sessions;

pub use confirm::ConfirmationService;
pub use sessions::SessionService;
