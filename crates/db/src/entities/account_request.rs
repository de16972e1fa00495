//! Account request entity: one pending or resolved request for an account.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A pending or resolved account request.
///
/// Exactly one of four states describes a row at any time:
/// pending (`deleted = false`, `held_at` unset), held (`deleted = false`,
/// `held_at` set), rejected or spam-discarded (`deleted = true`,
/// `rejected_at` set), or accepted (the row has been removed and replaced by
/// an `account_credential` row).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "account_request")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Requested username; unique among pending rows.
    pub name: String,

    /// Submitted email address; unique among pending rows.
    pub email: String,

    /// Submitted real name.
    pub real_name: String,

    /// Biography text.
    #[sea_orm(column_type = "Text")]
    pub bio: String,

    /// Free-form notes to the reviewers.
    #[sea_orm(column_type = "Text")]
    pub notes: String,

    /// Newline-separated list of URLs.
    #[sea_orm(column_type = "Text")]
    pub urls: String,

    /// Queue classification, an index into the configured request types.
    pub request_type: i32,

    /// Newline-separated areas of interest.
    #[sea_orm(column_type = "Text")]
    pub areas: String,

    /// When the request was submitted.
    pub registered_at: DateTimeWithTimeZone,

    /// Submitter IP.
    pub ip: String,

    /// X-Forwarded-For chain, if any.
    #[sea_orm(nullable)]
    pub forwarded_for: Option<String>,

    /// Submitter user agent.
    #[sea_orm(nullable)]
    pub user_agent: Option<String>,

    /// Original attachment file name, if one was supplied.
    #[sea_orm(nullable)]
    pub file_name: Option<String>,

    /// Content-hash key of the attachment in request-scoped storage.
    #[sea_orm(nullable)]
    pub storage_key: Option<String>,

    /// SHA-256 hex digest of the email confirmation token.
    pub email_token_hash: String,

    /// Confirmation token expiry.
    pub email_token_expires_at: DateTimeWithTimeZone,

    /// When the email address was confirmed, if it was.
    #[sea_orm(nullable)]
    pub email_confirmed_at: Option<DateTimeWithTimeZone>,

    /// When the request was put on hold.
    #[sea_orm(nullable)]
    pub held_at: Option<DateTimeWithTimeZone>,

    /// Admin who put the request on hold.
    #[sea_orm(nullable)]
    pub held_by: Option<String>,

    /// Reason the request is on hold.
    #[sea_orm(column_type = "Text", nullable)]
    pub held_reason: Option<String>,

    /// When the request was rejected; never set on the acceptance path.
    #[sea_orm(nullable)]
    pub rejected_at: Option<DateTimeWithTimeZone>,

    /// Admin who rejected the request.
    #[sea_orm(nullable)]
    pub rejected_by: Option<String>,

    /// Rejection reason; empty for spam discards.
    #[sea_orm(column_type = "Text", nullable)]
    pub rejected_reason: Option<String>,

    /// Admin who last handled the request.
    #[sea_orm(nullable)]
    pub handled_by: Option<String>,

    /// Terminally resolved flag; set for both rejection and spam discard.
    pub deleted: bool,
}

impl Model {
    /// Whether the request is still actionable (not terminally resolved).
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.deleted
    }

    /// Whether the request is currently on hold.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        !self.deleted && self.held_at.is_some()
    }

    /// Whether the request was rejected (including spam discards).
    #[must_use]
    pub const fn was_rejected(&self) -> bool {
        self.deleted && self.rejected_at.is_some()
    }

    /// Areas of interest as a list.
    #[must_use]
    pub fn area_list(&self) -> Vec<&str> {
        self.areas.lines().filter(|l| !l.is_empty()).collect()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base_request() -> Model {
        Model {
            id: "req1".to_string(),
            name: "Alice".to_string(),
            email: "a@example.com".to_string(),
            real_name: String::new(),
            bio: String::new(),
            notes: String::new(),
            urls: String::new(),
            request_type: 0,
            areas: "history\nbiology".to_string(),
            registered_at: Utc::now().into(),
            ip: "127.0.0.1".to_string(),
            forwarded_for: None,
            user_agent: None,
            file_name: None,
            storage_key: None,
            email_token_hash: String::new(),
            email_token_expires_at: Utc::now().into(),
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

    #[test]
    fn test_status_helpers() {
        let mut req = base_request();
        assert!(req.is_pending());
        assert!(!req.is_held());
        assert!(!req.was_rejected());

        req.held_at = Some(Utc::now().into());
        assert!(req.is_held());
        assert!(req.is_pending());

        req.deleted = true;
        req.rejected_at = Some(Utc::now().into());
        assert!(!req.is_pending());
        assert!(!req.is_held());
        assert!(req.was_rejected());
    }

    #[test]
    fn test_area_list() {
        let req = base_request();
        assert_eq!(req.area_list(), vec!["history", "biology"]);
    }
}
