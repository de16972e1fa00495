//! Host collaborator contracts.
//!
//! Account creation, group membership and page editing are owned entirely
//! by the host; the workflow only calls these narrow interfaces. Hosts
//! inject their own implementations.

use async_trait::async_trait;
use vestibule_common::AppResult;

/// The host's account directory.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Whether an account with this name already exists.
    async fn name_exists(&self, name: &str) -> AppResult<bool>;
}

/// Host-side effects performed around acceptance.
#[async_trait]
pub trait HostHooks: Send + Sync {
    /// Grant a group to a freshly created account. Runs inside the
    /// completion transaction; an error aborts the completion.
    async fn grant_group(&self, user_id: &str, group: &str) -> AppResult<()>;

    /// Seed the new user's page with the given body. Best-effort,
    /// post-commit only.
    async fn seed_user_page(&self, user_name: &str, body: &str) -> AppResult<()>;

    /// Post a welcome message for the new user. Best-effort, post-commit
    /// only.
    async fn post_welcome(&self, user_name: &str, request_type: i32) -> AppResult<()>;
}
