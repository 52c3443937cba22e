// Configuration modules for the Rafah backend

pub mod permissions;

pub use permissions::{DEFAULT_NEW_USER_ROLE, DEFAULT_PERMISSIONS, DEFAULT_ROLES};
