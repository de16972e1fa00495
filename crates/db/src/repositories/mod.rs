//! Database repositories.

pub mod account_credential;
pub mod account_request;

pub use account_credential::AccountCredentialRepository;
pub use account_request::{AccountRequestRepository, Consistency};
