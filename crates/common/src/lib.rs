//! Common utilities and shared types for vestibule.
//!
//! This crate provides foundational components used across all vestibule crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Confirmation tokens**: Issue/verify email confirmation tokens
//! - **Storage**: Attachment storage backends for request and credential files
//!
//! # Example
//!
//! ```no_run
//! use vestibule_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {}", id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;
pub mod token;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{
    AttachmentStore, LocalAttachmentStore, content_key, rel_path_from_key, verify_attachment,
};
pub use token::{ConfirmationToken, hash_token};
