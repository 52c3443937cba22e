// Middleware for the Rafah backend

pub mod auth;
pub mod auth_middleware;
pub mod security;

pub use auth::AuthenticatedUser;
pub use auth_middleware::auth_middleware;
pub use security::{security_middleware, ClientInfo};
