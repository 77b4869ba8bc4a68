pub mod auth;
pub mod rate_limit;

pub use auth::{basic_auth, AuthenticatedUser, BasicCredentials};
pub use rate_limit::{rate_limit, RateLimiter};
