//! Database entities.

pub mod account_credential;
pub mod account_request;

pub use account_credential::Entity as AccountCredential;
pub use account_request::Entity as AccountRequest;
