// Utility modules for the Rafah backend

pub mod client_ip;
pub mod password;
pub mod service_error;
pub mod validation;

pub use client_ip::extract_client_ip;
pub use password::{hash_password, validate_password_strength, verify_password, PasswordError};
pub use service_error::ServiceError;
pub use validation::{trim_and_validate_field, trim_optional_field};
