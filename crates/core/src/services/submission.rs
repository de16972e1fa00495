//! Submission processor: validate, persist and confirm new account requests.
//!
//! Validation failures are returned as typed outcomes. The compound mutation
//! (claims, attachment move, row insert, confirmation email) runs inside one
//! transaction; the email send is a correctness precondition, so a failed
//! send unwinds the claims and the attachment rather than leaving an
//! unconfirmable request squatting the name.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{DatabaseConnection, DatabaseTransaction, Set, TransactionTrait};
use validator::ValidateEmail;
use vestibule_common::config::{RequestPolicyConfig, SiteConfig};
use vestibule_common::{AppError, AppResult, ConfirmationToken, content_key, verify_attachment};
use vestibule_db::entities::account_request;
use vestibule_db::repositories::AccountRequestRepository;

use super::context::{ActorContext, Capability};
use super::counts::RequestCountCache;
use super::deferred::TaskQueue;
use super::email::{NotificationGateway, templates};
use super::host::AccountDirectory;
use super::throttle::SubmissionThrottle;
use vestibule_common::storage::AttachmentStore;

/// Characters that can never appear in an account name.
static FORBIDDEN_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[#<>\[\]|{}/@:]").expect("static pattern"));

/// An uploaded attachment, already spooled to a local temp path by the host.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    /// Original file name as given by the submitter.
    pub src_name: String,
    /// Size in bytes.
    pub size: u64,
    /// Local temp path the upload was spooled to.
    pub temp_path: std::path::PathBuf,
}

/// Raw submission payload.
#[derive(Debug, Clone)]
pub struct SubmissionParams {
    /// Requested username.
    pub user_name: String,
    /// Real name (optional free text).
    pub real_name: String,
    /// Email address.
    pub email: String,
    /// Biography text.
    pub bio: String,
    /// Free-form notes to the reviewers.
    pub notes: String,
    /// Newline-separated URLs.
    pub urls: String,
    /// Queue classification.
    pub request_type: i32,
    /// Selected areas of interest.
    pub areas: Vec<String>,
    /// Whether the terms of service were accepted.
    pub tos_accepted: bool,
    /// Submitter IP.
    pub ip: String,
    /// X-Forwarded-For chain, if any.
    pub forwarded_for: Option<String>,
    /// Submitter user agent.
    pub user_agent: Option<String>,
    /// Attachment supplied on this attempt, if any.
    pub attachment: Option<AttachmentUpload>,
    /// Attachment name recorded on a previous failed attempt.
    pub attachment_prev_name: Option<String>,
    /// Submitter confirmed they intentionally did not re-attach a file.
    pub attachment_did_not_forget: bool,
}

/// Why a submission was not taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitDenial {
    /// Requester is blocked or otherwise not allowed to submit.
    PermissionDenied,
    /// System is in read-only mode.
    ReadOnly,
    /// No username given.
    NoName,
    /// Username is not syntactically valid as an account name.
    InvalidName,
    /// Too many successful submissions from this submitter.
    Throttled {
        /// The configured per-window limit.
        limit: u32,
    },
    /// Terms of service were not accepted.
    TosRequired,
    /// Email address is not syntactically valid.
    InvalidEmail,
    /// Biography is under the configured minimum.
    BioTooShort {
        /// The configured minimum word count.
        min_words: u32,
    },
    /// A previous attempt carried an attachment that was not re-supplied
    /// and not explicitly waived.
    AttachmentNotReattached,
    /// The name is already taken in the host account directory.
    UsernameExists,
    /// Another pending request already claims this username.
    UsernamePending,
    /// Another pending request already claims this email address.
    EmailPending,
    /// Attachment was empty or unnamed.
    EmptyAttachment,
    /// Attachment extension is not on the allow-list.
    BadAttachmentExtension,
    /// Attachment content does not match its claimed type.
    CorruptAttachment,
    /// Attachment could not be stored; the submission may be retried.
    AttachmentStoreFailed,
    /// Confirmation email could not be sent; the submission may be retried.
    MailFailed,
}

impl SubmitDenial {
    /// Human-readable reason, suitable for re-display on the form.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::PermissionDenied => "You are not allowed to request an account.".to_string(),
            Self::ReadOnly => "The site is in read-only mode; try again later.".to_string(),
            Self::NoName => "No username was given.".to_string(),
            Self::InvalidName => "That username cannot be used for an account.".to_string(),
            Self::Throttled { limit } => format!(
                "You have exceeded the limit of {limit} account requests; try again later."
            ),
            Self::TosRequired => "You must accept the terms of service.".to_string(),
            Self::InvalidEmail => "That email address is not valid.".to_string(),
            Self::BioTooShort { min_words } => {
                format!("The biography must be at least {min_words} words long.")
            }
            Self::AttachmentNotReattached => {
                "Your previous attachment was not re-selected; attach it again or confirm \
                 that you intended to omit it."
                    .to_string()
            }
            Self::UsernameExists => "That username is already taken.".to_string(),
            Self::UsernamePending => {
                "Another pending request already uses that username.".to_string()
            }
            Self::EmailPending => {
                "Another pending request already uses that email address.".to_string()
            }
            Self::EmptyAttachment => "The attached file was empty.".to_string(),
            Self::BadAttachmentExtension => {
                "That file type is not accepted as an attachment.".to_string()
            }
            Self::CorruptAttachment => {
                "The attached file appears corrupt or mislabeled.".to_string()
            }
            Self::AttachmentStoreFailed => {
                "The attachment could not be stored; please try again.".to_string()
            }
            Self::MailFailed => {
                "The confirmation email could not be sent; please try again.".to_string()
            }
        }
    }
}

/// Result of a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The request was persisted and a confirmation email is on its way.
    Submitted {
        /// Id of the new request.
        request_id: String,
    },
    /// The submission was not taken.
    Denied(SubmitDenial),
}

/// Submission processor.
pub struct SubmissionService {
    db: Arc<DatabaseConnection>,
    requests: AccountRequestRepository,
    gateway: Arc<dyn NotificationGateway>,
    storage: Arc<dyn AttachmentStore>,
    directory: Arc<dyn AccountDirectory>,
    throttle: SubmissionThrottle,
    counts: RequestCountCache,
    tasks: TaskQueue,
    site: SiteConfig,
    policy: RequestPolicyConfig,
}

impl SubmissionService {
    /// Create a new submission service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn NotificationGateway>,
        storage: Arc<dyn AttachmentStore>,
        directory: Arc<dyn AccountDirectory>,
        counts: RequestCountCache,
        tasks: TaskQueue,
        site: SiteConfig,
        policy: RequestPolicyConfig,
    ) -> Self {
        let throttle = SubmissionThrottle::new(Duration::from_secs(policy.throttle_window_secs));
        Self {
            requests: AccountRequestRepository::new(db.clone()),
            db,
            gateway,
            storage,
            directory,
            throttle,
            counts,
            tasks,
            site,
            policy,
        }
    }

    /// Validate and persist an account request, sending the confirmation
    /// email. Policy and conflict failures come back as
    /// [`SubmitOutcome::Denied`]; only unexpected infrastructure faults are
    /// `Err`.
    pub async fn submit(
        &self,
        requester: &ActorContext,
        params: SubmissionParams,
    ) -> AppResult<SubmitOutcome> {
        use SubmitDenial as Denial;

        if !requester.is_authorized_for(Capability::RequestAccount) {
            return Ok(SubmitOutcome::Denied(Denial::PermissionDenied));
        }
        if self.site.read_only {
            return Ok(SubmitOutcome::Denied(Denial::ReadOnly));
        }

        let name = params.user_name.trim().to_string();
        if name.is_empty() {
            return Ok(SubmitOutcome::Denied(Denial::NoName));
        }
        if !is_valid_account_name(&name) {
            return Ok(SubmitOutcome::Denied(Denial::InvalidName));
        }

        // Optimistic throttle: only completed submissions count.
        let limit = self.policy.throttle;
        if limit > 0 && self.throttle.count(&params.ip).await > limit {
            return Ok(SubmitOutcome::Denied(Denial::Throttled { limit }));
        }

        if self.policy.tos_required && !params.tos_accepted {
            return Ok(SubmitOutcome::Denied(Denial::TosRequired));
        }

        if !params.email.validate_email() {
            return Ok(SubmitOutcome::Denied(Denial::InvalidEmail));
        }

        if self.policy.bio_enabled {
            let min_words = self.policy.bio_min_words;
            if word_count(&params.bio) < min_words as usize {
                return Ok(SubmitOutcome::Denied(Denial::BioTooShort { min_words }));
            }
        }

        // File inputs do not survive a failed form round trip; require an
        // explicit waiver before dropping a previously supplied attachment.
        if self.policy.attachments_enabled
            && params
                .attachment_prev_name
                .as_deref()
                .is_some_and(|n| !n.is_empty())
            && params.attachment.is_none()
            && !params.attachment_did_not_forget
        {
            return Ok(SubmitOutcome::Denied(Denial::AttachmentNotReattached));
        }

        if self.directory.name_exists(&name).await? {
            return Ok(SubmitOutcome::Denied(Denial::UsernameExists));
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !self.requests.acquire_username(&txn, &name).await? {
            self.abort(txn, None).await;
            return Ok(SubmitOutcome::Denied(Denial::UsernamePending));
        }
        if !self.requests.acquire_email(&txn, &params.email).await? {
            self.abort(txn, None).await;
            return Ok(SubmitOutcome::Denied(Denial::EmailPending));
        }

        let mut file_name = None;
        let mut stored_key: Option<String> = None;
        if self.policy.attachments_enabled {
            if let Some(upload) = &params.attachment {
                match self.process_attachment(upload).await {
                    Ok((original_name, key)) => {
                        file_name = Some(original_name);
                        stored_key = Some(key);
                    }
                    Err(denial) => {
                        self.abort(txn, None).await;
                        return Ok(SubmitOutcome::Denied(denial));
                    }
                }
            }
        }

        let token = ConfirmationToken::issue(self.policy.token_ttl_secs);
        let id = vestibule_common::id::generate_id();
        let now = Utc::now();

        let model = account_request::ActiveModel {
            id: Set(id.clone()),
            name: Set(name.clone()),
            email: Set(params.email.clone()),
            real_name: Set(params.real_name.trim().to_string()),
            bio: Set(params.bio.trim().to_string()),
            notes: Set(params.notes.trim().to_string()),
            urls: Set(params.urls.trim().to_string()),
            request_type: Set(params.request_type),
            areas: Set(params.areas.join("\n")),
            registered_at: Set(now.into()),
            ip: Set(params.ip.clone()),
            forwarded_for: Set(params.forwarded_for.clone()),
            user_agent: Set(params.user_agent.clone()),
            file_name: Set(file_name),
            storage_key: Set(stored_key.clone()),
            email_token_hash: Set(token.hash.clone()),
            email_token_expires_at: Set(token.expires_at.into()),
            email_confirmed_at: Set(None),
            held_at: Set(None),
            held_by: Set(None),
            held_reason: Set(None),
            rejected_at: Set(None),
            rejected_by: Set(None),
            rejected_reason: Set(None),
            handled_by: Set(None),
            deleted: Set(false),
        };

        if let Err(e) = self.requests.insert(&txn, model).await {
            self.abort(txn, stored_key.as_deref()).await;
            return Err(e);
        }

        // Confirmation mail is required; an unconfirmable request would
        // permanently squat the name and email claims.
        let (subject, body) =
            templates::confirmation(&self.site, &name, &token.token, token.expires_at);
        if let Err(e) = self.gateway.send(&params.email, &subject, &body).await {
            tracing::warn!(error = %e, request = %id, "Confirmation email failed; unwinding submission");
            self.abort(txn, stored_key.as_deref()).await;
            return Ok(SubmitOutcome::Denied(Denial::MailFailed));
        }

        if let Err(e) = txn.commit().await {
            self.cleanup_attachment(stored_key.as_deref()).await;
            return Err(AppError::Database(e.to_string()));
        }

        // Post-commit, best-effort: throttle bookkeeping and badge counts.
        let throttle = self.throttle.clone();
        let counts = self.counts.clone();
        let ip = params.ip.clone();
        let throttled = limit > 0;
        self.tasks.enqueue(async move {
            if throttled {
                throttle.increment(&ip).await;
            }
            counts.invalidate().await;
        });

        tracing::info!(request = %id, name = %name, "Account request submitted");
        Ok(SubmitOutcome::Submitted { request_id: id })
    }

    /// Validate and store an attachment; returns `(original name, key)`.
    async fn process_attachment(
        &self,
        upload: &AttachmentUpload,
    ) -> Result<(String, String), SubmitDenial> {
        let original_name = upload.src_name.trim();
        if original_name.is_empty() || upload.size == 0 {
            return Err(SubmitDenial::EmptyAttachment);
        }

        let extension = original_name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !self
            .policy
            .allowed_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(&extension))
        {
            return Err(SubmitDenial::BadAttachmentExtension);
        }

        let data = tokio::fs::read(&upload.temp_path).await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read uploaded temp file");
            SubmitDenial::AttachmentStoreFailed
        })?;
        if data.is_empty() {
            return Err(SubmitDenial::EmptyAttachment);
        }
        if !verify_attachment(&data, &extension) {
            return Err(SubmitDenial::CorruptAttachment);
        }

        let key = content_key(&data, &extension);
        self.storage.put(&key, &data).await.map_err(|e| {
            tracing::warn!(error = %e, key = %key, "Failed to store attachment");
            SubmitDenial::AttachmentStoreFailed
        })?;

        Ok((original_name.to_string(), key))
    }

    async fn abort(&self, txn: DatabaseTransaction, stored_key: Option<&str>) {
        if let Err(e) = txn.rollback().await {
            tracing::warn!(error = %e, "Rollback failed");
        }
        self.cleanup_attachment(stored_key).await;
    }

    async fn cleanup_attachment(&self, stored_key: Option<&str>) {
        let Some(key) = stored_key else { return };

        // Content-addressed keys deduplicate identical uploads; another
        // pending request may still reference this file. When in doubt,
        // leaking a file beats deleting one that is still referenced.
        match self.requests.count_by_storage_key(key).await {
            Ok(0) => {
                if let Err(e) = self.storage.delete(key).await {
                    tracing::warn!(error = %e, key = %key, "Failed to clean up attachment");
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Skipping attachment cleanup");
            }
        }
    }
}

/// Whether a trimmed name is syntactically usable as an account name.
#[must_use]
pub fn is_valid_account_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !FORBIDDEN_NAME_CHARS.is_match(name)
        && !name.chars().any(char::is_control)
}

/// Word count the way the biography minimum is enforced.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
