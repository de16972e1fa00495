//! Review processor: admin decisions over pending account requests.
//!
//! Every decision re-reads the request from the leader and then applies a
//! guarded update, so two admins racing on the same request resolve to one
//! winner and one idempotent refusal. Acceptance is two-phase: `Accept`
//! only describes the follow-up form, `Complete` performs the materialized
//! acceptance.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseConnection, DatabaseTransaction, Set, TransactionTrait};
use vestibule_common::config::{RequestPolicyConfig, SiteConfig};
use vestibule_common::storage::AttachmentStore;
use vestibule_common::{AppError, AppResult};
use vestibule_db::entities::{account_credential, account_request};
use vestibule_db::repositories::{
    AccountCredentialRepository, AccountRequestRepository, Consistency,
};

use super::context::{ActorContext, Capability};
use super::counts::{QueueCounts, RequestCountCache};
use super::deferred::TaskQueue;
use super::email::{NotificationGateway, templates};
use super::host::HostHooks;

/// An admin decision over one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Discard as spam: reject without notifying the submitter.
    Spam,
    /// Reject with an optional reason; the submitter is emailed either way.
    Reject {
        /// Reason shown to the submitter; may be empty.
        reason: String,
    },
    /// Put on hold pending more information; a reason is mandatory.
    Hold {
        /// Reason shown to the submitter.
        reason: String,
    },
    /// First acceptance phase: no mutation, describes the follow-up form.
    Accept {
        /// Account name to create, defaulting to the requested one.
        user_name: String,
        /// Pre-filled resolution comment.
        reason: String,
    },
    /// Second acceptance phase: the host has created the account, now
    /// materialize the acceptance.
    Complete {
        /// Host id of the account that was created.
        user_id: String,
        /// Final account name, possibly adjusted by the admin.
        user_name: String,
        /// Biography, possibly edited by the admin.
        bio: String,
        /// Final queue classification.
        request_type: i32,
        /// Final areas of interest.
        areas: Vec<String>,
        /// Resolution comment stored on the credential record.
        reason: String,
    },
}

/// Why a decision was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDenial {
    /// Actor may not review requests.
    PermissionDenied,
    /// System is in read-only mode.
    ReadOnly,
    /// No such request.
    NotFound,
    /// Another decision already resolved (or held) this request.
    AlreadyResolved,
    /// Holds must carry a reason.
    NeedReason,
    /// The attachment could not be copied to the credential store.
    AttachmentCopyFailed,
    /// The notice email could not be sent; the decision was not applied.
    MailFailed,
}

impl ReviewDenial {
    /// Human-readable reason for the review UI.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::PermissionDenied => "You are not allowed to review account requests.".to_string(),
            Self::ReadOnly => "The site is in read-only mode; try again later.".to_string(),
            Self::NotFound => "That account request no longer exists.".to_string(),
            Self::AlreadyResolved => {
                "Another reviewer has already acted on this request.".to_string()
            }
            Self::NeedReason => "Placing a request on hold requires a reason.".to_string(),
            Self::AttachmentCopyFailed => {
                "The attachment could not be archived; try again.".to_string()
            }
            Self::MailFailed => {
                "The notice email could not be sent; the decision was not applied.".to_string()
            }
        }
    }
}

/// Instructions for the host's account-creation form after phase one of
/// acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptRedirect {
    /// Request being accepted.
    pub request_id: String,
    /// Account name to create.
    pub user_name: String,
    /// Pre-filled resolution comment.
    pub reason: String,
    /// Queue key to return to afterwards, when the type is known.
    pub return_to: Option<String>,
}

/// Result of applying a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// The decision was applied.
    Done,
    /// Phase one of acceptance: redirect to the account-creation form.
    Redirect(AcceptRedirect),
    /// The decision was not applied.
    Denied(ReviewDenial),
}

/// Review processor.
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    requests: AccountRequestRepository,
    credentials: AccountCredentialRepository,
    gateway: Arc<dyn NotificationGateway>,
    request_storage: Arc<dyn AttachmentStore>,
    credential_storage: Arc<dyn AttachmentStore>,
    hooks: Arc<dyn HostHooks>,
    counts: RequestCountCache,
    tasks: TaskQueue,
    site: SiteConfig,
    policy: RequestPolicyConfig,
}

impl ReviewService {
    /// Create a new review service.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn NotificationGateway>,
        request_storage: Arc<dyn AttachmentStore>,
        credential_storage: Arc<dyn AttachmentStore>,
        hooks: Arc<dyn HostHooks>,
        counts: RequestCountCache,
        tasks: TaskQueue,
        site: SiteConfig,
        policy: RequestPolicyConfig,
    ) -> Self {
        Self {
            requests: AccountRequestRepository::new(db.clone()),
            credentials: AccountCredentialRepository::new(db.clone()),
            db,
            gateway,
            request_storage,
            credential_storage,
            hooks,
            counts,
            tasks,
            site,
            policy,
        }
    }

    /// Apply an admin decision to a request.
    ///
    /// Contention and policy failures come back as
    /// [`ReviewOutcome::Denied`]; only infrastructure faults are `Err`.
    pub async fn submit(
        &self,
        admin: &ActorContext,
        request_id: &str,
        decision: Decision,
    ) -> AppResult<ReviewOutcome> {
        if !admin.is_authorized_for(Capability::ConfirmAccount) {
            return Ok(ReviewOutcome::Denied(ReviewDenial::PermissionDenied));
        }
        if self.site.read_only {
            return Ok(ReviewOutcome::Denied(ReviewDenial::ReadOnly));
        }

        // Always re-read from the leader before mutating; the review list
        // may have been served from a stale replica.
        let Some(request) = self
            .requests
            .find_by_id(request_id, Consistency::Leader)
            .await?
        else {
            return Ok(ReviewOutcome::Denied(ReviewDenial::NotFound));
        };
        if request.deleted {
            return Ok(ReviewOutcome::Denied(ReviewDenial::AlreadyResolved));
        }

        match decision {
            Decision::Spam => self.spam(admin, &request).await,
            Decision::Reject { reason } => self.reject(admin, &request, &reason).await,
            Decision::Hold { reason } => self.hold(admin, &request, &reason).await,
            Decision::Accept { user_name, reason } => Ok(self.accept(&request, user_name, reason)),
            Decision::Complete {
                user_id,
                user_name,
                bio,
                request_type,
                areas,
                reason,
            } => {
                self.complete(admin, &request, &user_id, &user_name, &bio, request_type, &areas, &reason)
                    .await
            }
        }
    }

    /// List one review queue, newest first.
    pub async fn queue(
        &self,
        request_type: Option<i32>,
        held: bool,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<account_request::Model>> {
        self.requests.list_queue(request_type, held, limit, offset).await
    }

    /// Cached badge counts for one queue.
    pub async fn queue_counts(&self, request_type: Option<i32>) -> AppResult<QueueCounts> {
        self.counts.get(&self.requests, request_type).await
    }

    /// Discard as spam. Deliberately silent: spammers get no email.
    async fn spam(
        &self,
        admin: &ActorContext,
        request: &account_request::Model,
    ) -> AppResult<ReviewOutcome> {
        let txn = self.begin().await?;

        if !self
            .requests
            .mark_rejected(&txn, &request.id, &admin.id, Utc::now(), "")
            .await?
        {
            rollback(txn).await;
            return Ok(ReviewOutcome::Denied(ReviewDenial::AlreadyResolved));
        }

        self.commit(txn).await?;
        self.invalidate_counts();
        tracing::info!(request = %request.id, admin = %admin.id, "Request discarded as spam");
        Ok(ReviewOutcome::Done)
    }

    /// Reject and notify the submitter. An empty reason is allowed; the
    /// notice body just omits it.
    async fn reject(
        &self,
        admin: &ActorContext,
        request: &account_request::Model,
        reason: &str,
    ) -> AppResult<ReviewOutcome> {
        let txn = self.begin().await?;

        if !self
            .requests
            .mark_rejected(&txn, &request.id, &admin.id, Utc::now(), reason)
            .await?
        {
            rollback(txn).await;
            return Ok(ReviewOutcome::Denied(ReviewDenial::AlreadyResolved));
        }

        let (subject, body) = templates::rejection(&self.site, &request.name, reason);
        if let Err(e) = self.gateway.send(&request.email, &subject, &body).await {
            tracing::warn!(error = %e, request = %request.id, "Rejection notice failed; decision not applied");
            rollback(txn).await;
            return Ok(ReviewOutcome::Denied(ReviewDenial::MailFailed));
        }

        self.commit(txn).await?;
        self.invalidate_counts();
        tracing::info!(request = %request.id, admin = %admin.id, "Request rejected");
        Ok(ReviewOutcome::Done)
    }

    /// Put on hold and notify the submitter. Unlike rejection, a hold is a
    /// question to the submitter and must carry a reason.
    async fn hold(
        &self,
        admin: &ActorContext,
        request: &account_request::Model,
        reason: &str,
    ) -> AppResult<ReviewOutcome> {
        if reason.trim().is_empty() {
            return Ok(ReviewOutcome::Denied(ReviewDenial::NeedReason));
        }

        let txn = self.begin().await?;

        if !self
            .requests
            .mark_held(&txn, &request.id, &admin.id, Utc::now(), reason)
            .await?
        {
            rollback(txn).await;
            return Ok(ReviewOutcome::Denied(ReviewDenial::AlreadyResolved));
        }

        let (subject, body) = templates::hold_notice(&self.site, &request.name, reason);
        if let Err(e) = self.gateway.send(&request.email, &subject, &body).await {
            tracing::warn!(error = %e, request = %request.id, "Hold notice failed; decision not applied");
            rollback(txn).await;
            return Ok(ReviewOutcome::Denied(ReviewDenial::MailFailed));
        }

        self.commit(txn).await?;
        self.invalidate_counts();
        tracing::info!(request = %request.id, admin = %admin.id, "Request placed on hold");
        Ok(ReviewOutcome::Done)
    }

    /// Phase one of acceptance: no mutation, just the redirect descriptor
    /// for the host's account-creation form.
    fn accept(
        &self,
        request: &account_request::Model,
        user_name: String,
        reason: String,
    ) -> ReviewOutcome {
        let trimmed = user_name.trim();
        let user_name = if trimmed.is_empty() {
            request.name.clone()
        } else {
            trimmed.to_string()
        };

        ReviewOutcome::Redirect(AcceptRedirect {
            request_id: request.id.clone(),
            user_name,
            reason,
            return_to: self
                .policy
                .request_type(request.request_type)
                .map(|t| t.key.clone()),
        })
    }

    /// Phase two of acceptance: archive the credential, grant the group and
    /// remove the request, all in one transaction. Page seeding, welcome
    /// posting and request-area attachment cleanup run post-commit and are
    /// best-effort.
    #[allow(clippy::too_many_arguments)]
    async fn complete(
        &self,
        admin: &ActorContext,
        request: &account_request::Model,
        user_id: &str,
        user_name: &str,
        bio: &str,
        request_type: i32,
        areas: &[String],
        reason: &str,
    ) -> AppResult<ReviewOutcome> {
        let txn = self.begin().await?;

        if let Some(type_config) = self.policy.request_type(request_type) {
            let group = type_config.group.as_str();
            if !group.is_empty() && group != "user" && group != "*" {
                if let Err(e) = self.hooks.grant_group(user_id, group).await {
                    rollback(txn).await;
                    return Err(e);
                }
            }
        }

        let mut credential_key = None;
        if self.policy.save_credentials {
            if self.policy.attachments_enabled {
                if let Some(key) = &request.storage_key {
                    if let Err(e) = self.archive_attachment(key).await {
                        tracing::warn!(error = %e, request = %request.id, "Attachment archive failed");
                        rollback(txn).await;
                        return Ok(ReviewOutcome::Denied(ReviewDenial::AttachmentCopyFailed));
                    }
                    credential_key = Some(key.clone());
                }
            }

            let credential = account_credential::ActiveModel {
                id: Set(vestibule_common::id::generate_id()),
                user_id: Set(user_id.to_string()),
                real_name: Set(request.real_name.clone()),
                email: Set(request.email.clone()),
                email_confirmed_at: Set(request.email_confirmed_at),
                bio: Set(bio.to_string()),
                notes: Set(request.notes.clone()),
                urls: Set(request.urls.clone()),
                ip: Set(request.ip.clone()),
                forwarded_for: Set(request.forwarded_for.clone()),
                user_agent: Set(request.user_agent.clone()),
                file_name: Set(request.file_name.clone()),
                storage_key: Set(credential_key),
                areas: Set(areas.join("\n")),
                registered_at: Set(request.registered_at),
                accepted_at: Set(Utc::now().into()),
                accepted_by: Set(admin.id.clone()),
                comment: Set(reason.to_string()),
            };
            if let Err(e) = self.credentials.insert(&txn, credential).await {
                rollback(txn).await;
                return Err(e);
            }
        }

        if let Err(e) = self.requests.remove(&txn, &request.id).await {
            rollback(txn).await;
            return Err(e);
        }

        self.commit(txn).await?;

        let counts = self.counts.clone();
        let requests = self.requests.clone();
        let request_storage = self.request_storage.clone();
        let hooks = self.hooks.clone();
        let request_key = request.storage_key.clone();
        let page_body = compose_user_page_body(&self.policy, bio, request_type, areas);
        let welcome = self.policy.auto_welcome;
        let owner = user_name.to_string();
        self.tasks.enqueue(async move {
            counts.invalidate().await;

            // Content-addressed keys deduplicate identical uploads; keep the
            // file while any other pending request still references it.
            if let Some(key) = request_key {
                match requests.count_by_storage_key(&key).await {
                    Ok(0) => {
                        if let Err(e) = request_storage.delete(&key).await {
                            tracing::warn!(error = %e, key = %key, "Failed to delete request attachment");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, key = %key, "Skipping request attachment cleanup");
                    }
                }
            }

            if !page_body.is_empty() {
                if let Err(e) = hooks.seed_user_page(&owner, &page_body).await {
                    tracing::warn!(error = %e, user = %owner, "Failed to seed user page");
                }
            }

            if welcome {
                if let Err(e) = hooks.post_welcome(&owner, request_type).await {
                    tracing::warn!(error = %e, user = %owner, "Failed to post welcome");
                }
            }
        });

        tracing::info!(
            request = %request.id,
            admin = %admin.id,
            user = %user_name,
            "Request accepted and completed"
        );
        Ok(ReviewOutcome::Done)
    }

    /// Copy an attachment from request-scoped to credential-scoped storage.
    async fn archive_attachment(&self, key: &str) -> AppResult<()> {
        let data = self.request_storage.read(key).await?;
        self.credential_storage.put(key, &data).await
    }

    async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn commit(&self, txn: DatabaseTransaction) -> AppResult<()> {
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    fn invalidate_counts(&self) {
        let counts = self.counts.clone();
        self.tasks.enqueue(async move {
            counts.invalidate().await;
        });
    }
}

async fn rollback(txn: DatabaseTransaction) {
    if let Err(e) = txn.rollback().await {
        tracing::warn!(error = %e, "Rollback failed");
    }
}

/// Compose the seeded user page body from the biography and the configured
/// per-type and per-area texts.
#[must_use]
pub fn compose_user_page_body(
    policy: &RequestPolicyConfig,
    bio: &str,
    request_type: i32,
    areas: &[String],
) -> String {
    let mut parts = Vec::new();

    if policy.user_page_from_bio {
        let bio = bio.trim();
        if !bio.is_empty() {
            parts.push(bio.to_string());
        }
        if !policy.auto_bio_text.is_empty() {
            parts.push(policy.auto_bio_text.clone());
        }
    }

    if let Some(type_config) = policy.request_type(request_type) {
        if !type_config.auto_text.is_empty() {
            parts.push(type_config.auto_text.clone());
        }
    }

    for area in areas {
        if let Some(area_config) = policy.area(area) {
            if !area_config.user_text.is_empty() {
                parts.push(area_config.user_text.clone());
            }
        }
    }

    parts.join("\n\n")
}
