//! HTTP request handlers.

pub mod downloads;
pub mod health;
pub mod sessions;

pub use downloads::batch_download_urls;
pub use health::health_check;
pub use sessions::{
    cancel_session, complete_session, create_session, fail_session, get_rate_limit, get_session,
    mark_part,
};
