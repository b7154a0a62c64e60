//! Shared service primitives

pub mod rate_limiter;
pub mod retry;
