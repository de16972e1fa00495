//! Account request repository: the request store.
//!
//! Mutating operations take an explicit connection so callers can run them
//! inside a transaction together with claim acquisition and external side
//! effects. Guarded updates return `false` instead of failing when the row
//! is already in the target state, so concurrent admin decisions lose
//! cleanly rather than corrupting state.

use std::sync::Arc;

use crate::entities::{AccountRequest, account_request};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QuerySelect, Statement,
};
use vestibule_common::{AppError, AppResult};

/// Read consistency for request lookups.
///
/// Follower reads serve display; leader reads are mandatory before any
/// read-modify-write so decisions never act on stale state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    /// Read from the leader.
    Leader,
    /// Read from a replica when one is configured.
    Follower,
}

/// Account request repository for database operations.
#[derive(Clone)]
pub struct AccountRequestRepository {
    db: Arc<DatabaseConnection>,
    replica: Option<Arc<DatabaseConnection>>,
}

impl AccountRequestRepository {
    /// Create a new account request repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db, replica: None }
    }

    /// Create a repository that serves follower reads from a replica.
    #[must_use]
    pub const fn with_replica(db: Arc<DatabaseConnection>, replica: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            replica: Some(replica),
        }
    }

    fn read_conn(&self, consistency: Consistency) -> &DatabaseConnection {
        match consistency {
            Consistency::Leader => self.db.as_ref(),
            Consistency::Follower => self
                .replica
                .as_deref()
                .unwrap_or_else(|| self.db.as_ref()),
        }
    }

    /// Find a request by ID.
    pub async fn find_by_id(
        &self,
        id: &str,
        consistency: Consistency,
    ) -> AppResult<Option<account_request::Model>> {
        AccountRequest::find_by_id(id)
            .one(self.read_conn(consistency))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the pending request with the given username, if any.
    pub async fn find_pending_by_name(
        &self,
        name: &str,
    ) -> AppResult<Option<account_request::Model>> {
        AccountRequest::find()
            .filter(account_request::Column::Name.eq(name))
            .filter(account_request::Column::Deleted.eq(false))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the pending request with the given email, if any.
    pub async fn find_pending_by_email(
        &self,
        email: &str,
    ) -> AppResult<Option<account_request::Model>> {
        AccountRequest::find()
            .filter(account_request::Column::Email.eq(email))
            .filter(account_request::Column::Deleted.eq(false))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically claim a username against concurrent submissions.
    ///
    /// A row lock alone cannot serialize two claims on a name nobody has
    /// requested yet (both selects see zero rows), so the claim first takes
    /// a transaction-scoped advisory lock keyed on the name. Must run
    /// inside the caller's transaction, before any externally visible side
    /// effect. Returns `false` if a pending request already has the name.
    pub async fn acquire_username<C: ConnectionTrait>(
        &self,
        conn: &C,
        name: &str,
    ) -> AppResult<bool> {
        advisory_lock(conn, "account_request:name", name).await?;

        let existing = AccountRequest::find()
            .filter(account_request::Column::Name.eq(name))
            .filter(account_request::Column::Deleted.eq(false))
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(existing.is_none())
    }

    /// Atomically claim an email address; same contract as
    /// [`Self::acquire_username`].
    pub async fn acquire_email<C: ConnectionTrait>(
        &self,
        conn: &C,
        email: &str,
    ) -> AppResult<bool> {
        advisory_lock(conn, "account_request:email", email).await?;

        let existing = AccountRequest::find()
            .filter(account_request::Column::Email.eq(email))
            .filter(account_request::Column::Deleted.eq(false))
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(existing.is_none())
    }

    /// Insert a new request.
    pub async fn insert<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: account_request::ActiveModel,
    ) -> AppResult<account_request::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark a request as held.
    ///
    /// Returns `false` if the request is already held or resolved; the
    /// caller treats that as an idempotent refusal, not an error.
    pub async fn mark_held<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        admin_id: &str,
        at: DateTime<Utc>,
        reason: &str,
    ) -> AppResult<bool> {
        let result = AccountRequest::update_many()
            .col_expr(account_request::Column::HeldAt, Expr::value(Some(at)))
            .col_expr(
                account_request::Column::HeldBy,
                Expr::value(Some(admin_id.to_string())),
            )
            .col_expr(
                account_request::Column::HeldReason,
                Expr::value(Some(reason.to_string())),
            )
            .col_expr(
                account_request::Column::HandledBy,
                Expr::value(Some(admin_id.to_string())),
            )
            .filter(account_request::Column::Id.eq(id))
            .filter(account_request::Column::Deleted.eq(false))
            .filter(account_request::Column::HeldAt.is_null())
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Mark a request as rejected (spam discards pass an empty reason).
    ///
    /// Returns `false` if the request is already resolved.
    pub async fn mark_rejected<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        admin_id: &str,
        at: DateTime<Utc>,
        reason: &str,
    ) -> AppResult<bool> {
        let result = AccountRequest::update_many()
            .col_expr(account_request::Column::Deleted, Expr::value(true))
            .col_expr(account_request::Column::RejectedAt, Expr::value(Some(at)))
            .col_expr(
                account_request::Column::RejectedBy,
                Expr::value(Some(admin_id.to_string())),
            )
            .col_expr(
                account_request::Column::RejectedReason,
                Expr::value(Some(reason.to_string())),
            )
            .col_expr(
                account_request::Column::HandledBy,
                Expr::value(Some(admin_id.to_string())),
            )
            .filter(account_request::Column::Id.eq(id))
            .filter(account_request::Column::Deleted.eq(false))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Remove a request row; used on acceptance after the credential copy.
    pub async fn remove<C: ConnectionTrait>(&self, conn: &C, id: &str) -> AppResult<()> {
        AccountRequest::delete_by_id(id)
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Confirm the email address belonging to an unexpired token hash.
    ///
    /// Returns `false` if no pending request carries this hash, the token
    /// expired, or the address was already confirmed.
    pub async fn confirm_email<C: ConnectionTrait>(
        &self,
        conn: &C,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = AccountRequest::update_many()
            .col_expr(
                account_request::Column::EmailConfirmedAt,
                Expr::value(Some(now)),
            )
            .filter(account_request::Column::EmailTokenHash.eq(token_hash))
            .filter(account_request::Column::EmailTokenExpiresAt.gt(now))
            .filter(account_request::Column::EmailConfirmedAt.is_null())
            .filter(account_request::Column::Deleted.eq(false))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Count open (pending, not held) requests, optionally per queue.
    pub async fn count_open(&self, request_type: Option<i32>) -> AppResult<u64> {
        let mut query = AccountRequest::find()
            .filter(account_request::Column::Deleted.eq(false))
            .filter(account_request::Column::HeldAt.is_null());

        if let Some(t) = request_type {
            query = query.filter(account_request::Column::RequestType.eq(t));
        }

        query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count held requests, optionally per queue.
    pub async fn count_held(&self, request_type: Option<i32>) -> AppResult<u64> {
        let mut query = AccountRequest::find()
            .filter(account_request::Column::Deleted.eq(false))
            .filter(account_request::Column::HeldAt.is_not_null());

        if let Some(t) = request_type {
            query = query.filter(account_request::Column::RequestType.eq(t));
        }

        query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count pending requests referencing a storage key.
    ///
    /// Attachments are content-addressed, so two pending requests can share
    /// one key; callers must check this before deleting the file.
    pub async fn count_by_storage_key(&self, key: &str) -> AppResult<u64> {
        AccountRequest::find()
            .filter(account_request::Column::StorageKey.eq(key))
            .filter(account_request::Column::Deleted.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count rejected requests, optionally per queue.
    pub async fn count_rejected(&self, request_type: Option<i32>) -> AppResult<u64> {
        let mut query = AccountRequest::find()
            .filter(account_request::Column::Deleted.eq(true))
            .filter(account_request::Column::RejectedAt.is_not_null());

        if let Some(t) = request_type {
            query = query.filter(account_request::Column::RequestType.eq(t));
        }

        query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List requests in a queue state for review, newest first.
    pub async fn list_queue(
        &self,
        request_type: Option<i32>,
        held: bool,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<account_request::Model>> {
        use sea_orm::QueryOrder;

        let mut query = AccountRequest::find()
            .filter(account_request::Column::Deleted.eq(false))
            .order_by_desc(account_request::Column::RegisteredAt);

        query = if held {
            query.filter(account_request::Column::HeldAt.is_not_null())
        } else {
            query.filter(account_request::Column::HeldAt.is_null())
        };

        if let Some(t) = request_type {
            query = query.filter(account_request::Column::RequestType.eq(t));
        }

        query
            .offset(offset)
            .limit(limit)
            .all(self.read_conn(Consistency::Follower))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Take a transaction-scoped advisory lock on a scoped value, serializing
/// concurrent claims on names and addresses no pending row holds yet.
async fn advisory_lock<C: ConnectionTrait>(conn: &C, scope: &str, value: &str) -> AppResult<()> {
    conn.execute(Statement::from_sql_and_values(
        conn.get_database_backend(),
        "SELECT pg_advisory_xact_lock(hashtext($1))",
        [format!("{scope}:{value}").into()],
    ))
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_request(id: &str, name: &str, email: &str) -> account_request::Model {
        account_request::Model {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            real_name: String::new(),
            bio: "A biography of sufficient length.".to_string(),
            notes: String::new(),
            urls: String::new(),
            request_type: 0,
            areas: String::new(),
            registered_at: Utc::now().into(),
            ip: "127.0.0.1".to_string(),
            forwarded_for: None,
            user_agent: None,
            file_name: None,
            storage_key: None,
            email_token_hash: "hash".to_string(),
            email_token_expires_at: (Utc::now() + chrono::Duration::hours(1)).into(),
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
    async fn test_acquire_username_free() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([Vec::<account_request::Model>::new()])
                .into_connection(),
        );

        let repo = AccountRequestRepository::new(db.clone());
        assert!(repo.acquire_username(db.as_ref(), "Alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_acquire_username_already_pending() {
        let existing = create_test_request("req1", "Alice", "a@example.com");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([[existing]])
                .into_connection(),
        );

        let repo = AccountRequestRepository::new(db.clone());
        assert!(!repo.acquire_username(db.as_ref(), "Alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_acquire_username_locks_before_select() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([Vec::<account_request::Model>::new()])
            .into_connection();

        let repo = AccountRequestRepository::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        ));
        assert!(repo.acquire_username(&conn, "Alice").await.unwrap());

        // The advisory lock must be taken before the pending-row select, so
        // two claims on a name with no pending row still serialize.
        let log = conn.into_transaction_log();
        assert!(format!("{:?}", log[0]).contains("pg_advisory_xact_lock"));
        assert!(format!("{:?}", log[1]).contains("FOR UPDATE"));
    }

    #[tokio::test]
    async fn test_mark_held_once() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                ])
                .into_connection(),
        );

        let repo = AccountRequestRepository::new(db.clone());
        let now = Utc::now();

        let first = repo
            .mark_held(db.as_ref(), "req1", "admin1", now, "need more info")
            .await
            .unwrap();
        let second = repo
            .mark_held(db.as_ref(), "req1", "admin1", now, "need more info")
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn test_mark_rejected_refused_when_resolved() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = AccountRequestRepository::new(db.clone());
        let ok = repo
            .mark_rejected(db.as_ref(), "req1", "admin1", Utc::now(), "")
            .await
            .unwrap();

        assert!(!ok);
    }

    #[tokio::test]
    async fn test_insert() {
        let request = create_test_request("req1", "Alice", "a@example.com");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[request.clone()]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = AccountRequestRepository::new(db.clone());
        let active: account_request::ActiveModel = request.into();
        let inserted = repo.insert(db.as_ref(), active).await.unwrap();

        assert_eq!(inserted.name, "Alice");
    }

    #[tokio::test]
    async fn test_confirm_email_expired_token() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = AccountRequestRepository::new(db.clone());
        let ok = repo
            .confirm_email(db.as_ref(), "stale-hash", Utc::now())
            .await
            .unwrap();

        assert!(!ok);
    }

    #[tokio::test]
    async fn test_find_by_id_follower_falls_back_to_leader() {
        let request = create_test_request("req1", "Alice", "a@example.com");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[request]])
                .into_connection(),
        );

        let repo = AccountRequestRepository::new(db);
        let found = repo.find_by_id("req1", Consistency::Follower).await.unwrap();

        assert!(found.is_some());
    }
}
