//! Server-side collaborators whose signals the client has to interpret.

pub mod rate_limit;

pub use rate_limit::{client_key, RateLimitDecision, RateLimitPolicy, RateLimiter};
