//! `tka-portal-client` is the request layer of the TKA school portal.
//!
//! It sits between UI code and the portal backend:
//! - [`RequestQueue`] serializes outgoing operations with a fixed delay
//! - [`ResilientClient`] runs one operation with timeout, linear backoff
//!   retry and a one-time fallback base URL
//! - [`classify`] turns every failure into a [`ClassifiedError`]
//! - [`PortalClient`] exposes the named portal operations (logins, health,
//!   optimized endpoints, student deletion) on top of the three

mod client;
mod error;
mod locale;
mod options;
mod portal;
mod queue;
mod request;
mod response;
mod types;

pub mod classify;
pub mod retry;
pub mod session;
pub mod transport;

pub use classify::classify;
pub use client::ResilientClient;
pub use error::{ApiError, ClassifiedError, ErrorKind};
pub use locale::{Locale, Messages};
pub use options::{ClientOptions, DEFAULT_BASE_URL};
pub use portal::PortalClient;
pub use queue::RequestQueue;
pub use request::Request;
pub use response::{ApiResponse, Payload};
pub use retry::{AttemptState, Backoff, RetryPolicy};
pub use session::{MemorySessionStore, SessionStore};
pub use types::{LoginSession, SchoolCredentials, StudentCredentials};

pub type Result<T> = std::result::Result<T, ApiError>;
