//! Scheduled polling: the endpoint model, one client per endpoint,
//! and the manager that runs them all on a dedicated reactor thread.

pub mod client;
pub mod endpoint;
pub mod manager;

pub use client::ScheduledClient;
pub use endpoint::{Endpoint, Scheme};
pub use manager::{PollManager, PollManagerHandle};
