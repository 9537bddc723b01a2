pub mod auth;

pub use auth::{OptionalAuth, RequireAuth};
