//! Account credential repository.
//!
//! Credentials are append-only: inserted once when a request completes,
//! never updated.

use std::sync::Arc;

use crate::entities::{AccountCredential, account_credential};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use vestibule_common::{AppError, AppResult};

/// Account credential repository for database operations.
#[derive(Clone)]
pub struct AccountCredentialRepository {
    db: Arc<DatabaseConnection>,
}

impl AccountCredentialRepository {
    /// Create a new account credential repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert the credential record for an accepted request.
    pub async fn insert<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: account_credential::ActiveModel,
    ) -> AppResult<account_credential::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the credential record for an account, if one exists.
    pub async fn find_by_user_id(
        &self,
        user_id: &str,
    ) -> AppResult<Option<account_credential::Model>> {
        AccountCredential::find()
            .filter(account_credential::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_credential(id: &str, user_id: &str) -> account_credential::Model {
        account_credential::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            real_name: String::new(),
            email: "a@example.com".to_string(),
            email_confirmed_at: None,
            bio: String::new(),
            notes: String::new(),
            urls: String::new(),
            ip: "127.0.0.1".to_string(),
            forwarded_for: None,
            user_agent: None,
            file_name: None,
            storage_key: None,
            areas: String::new(),
            registered_at: Utc::now().into(),
            accepted_at: Utc::now().into(),
            accepted_by: "admin1".to_string(),
            comment: String::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_credential() {
        let credential = create_test_credential("cred1", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[credential.clone()]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = AccountCredentialRepository::new(db.clone());
        let active: account_credential::ActiveModel = credential.into();
        let inserted = repo.insert(db.as_ref(), active).await.unwrap();

        assert_eq!(inserted.user_id, "user1");
    }

    #[tokio::test]
    async fn test_find_by_user_id() {
        let credential = create_test_credential("cred1", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[credential]])
                .into_connection(),
        );

        let repo = AccountCredentialRepository::new(db);
        let found = repo.find_by_user_id("user1").await.unwrap();

        assert!(found.is_some());
        assert_eq!(found.unwrap().id, "cred1");
    }
}
