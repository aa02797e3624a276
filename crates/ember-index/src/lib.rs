//! The Redis-backed metadata index and the per-scope abuse throttle.

pub mod client;
pub mod record;
pub mod throttle;

pub use client::{IndexClient, IndexError};
pub use record::{NewUpload, UploadRecord};
pub use throttle::{Scope, Throttle, ThrottleDecision};
