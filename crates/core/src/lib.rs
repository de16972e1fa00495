//! Core business logic for vestibule: the account request confirmation
//! workflow (submission, email confirmation, administrative review).

pub mod services;

pub use services::*;
