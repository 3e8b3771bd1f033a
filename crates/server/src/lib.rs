//! HTTP control plane for Stow upload sessions.
//!
//! This crate provides:
//! - Session creation with presigned upload URLs
//! - Multipart part tracking and completion
//! - Version-guarded confirmation (winner/loser convergence)
//! - Background expiration sweep
//! - Batch download URL issuance

pub mod error;
pub mod handlers;
pub mod notify;
pub mod routes;
pub mod services;
pub mod state;
pub mod sweep;

pub use error::ApiError;
pub use notify::{LogNotifier, Notifier};
pub use routes::create_router;
pub use services::{ConfirmationService, SessionService};
pub use state::AppState;
