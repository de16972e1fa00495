//! Email confirmation: redeem tokens from confirmation links.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use vestibule_common::AppResult;
use vestibule_common::token::hash_token;
use vestibule_db::repositories::AccountRequestRepository;

/// Confirmation link handler.
pub struct ConfirmationService {
    db: Arc<DatabaseConnection>,
    requests: AccountRequestRepository,
}

impl ConfirmationService {
    /// Create a new confirmation service.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            requests: AccountRequestRepository::new(db.clone()),
            db,
        }
    }

    /// Redeem a confirmation token from an emailed link.
    ///
    /// Returns `false` for unknown, expired or already-used tokens; only
    /// the hash is ever compared, the raw token is never stored.
    pub async fn confirm(&self, token: &str) -> AppResult<bool> {
        let confirmed = self
            .requests
            .confirm_email(self.db.as_ref(), &hash_token(token), Utc::now())
            .await?;

        if confirmed {
            tracing::info!("Account request email confirmed");
        } else {
            tracing::debug!("Confirmation token not redeemable");
        }
        Ok(confirmed)
    }

    /// Whether a pending request already claims this username. Hosts call
    /// this from their signup path so a name under review cannot be taken
    /// out from under the requester.
    pub async fn name_pending(&self, name: &str) -> AppResult<bool> {
        Ok(self.requests.find_pending_by_name(name).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use vestibule_db::entities::account_request::Model;

    fn pending_request(name: &str) -> Model {
        Model {
            id: "req1".to_string(),
            name: name.to_string(),
            email: "a@example.com".to_string(),
            real_name: String::new(),
            bio: String::new(),
            notes: String::new(),
            urls: String::new(),
            request_type: 0,
            areas: String::new(),
            registered_at: Utc::now().into(),
            ip: "10.0.0.1".to_string(),
            forwarded_for: None,
            user_agent: None,
            file_name: None,
            storage_key: None,
            email_token_hash: "hash".to_string(),
            email_token_expires_at: (Utc::now() + Duration::days(7)).into(),
            email_confirmed_at: None,
            held_at: None,
            held_by: None,
            held_reason: None,
            rejected_at: None,
            rejected_by: None,
            rejected_reason: None,
            handled_by: None,
            deleted: false,
        }
    }

    #[tokio::test]
    async fn test_confirm_valid_token() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let svc = ConfirmationService::new(db);
        assert!(svc.confirm("some-raw-token").await.unwrap());
    }

    #[tokio::test]
    async fn test_confirm_unknown_token() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let svc = ConfirmationService::new(db);
        assert!(!svc.confirm("stale-token").await.unwrap());
    }

    #[tokio::test]
    async fn test_name_pending() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[pending_request("Alice")]])
                .append_query_results([Vec::<Model>::new()])
                .into_connection(),
        );

        let svc = ConfirmationService::new(db);
        assert!(svc.name_pending("Alice").await.unwrap());
        assert!(!svc.name_pending("Bob").await.unwrap());
    }
}
