//! Account credential entity: the permanent record of an accepted request.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Historical copy of an accepted account request.
///
/// Created exactly once when a request is completed, immutable afterwards,
/// and looked up by the id of the account that was created.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "account_credential")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Host account id the credential belongs to.
    #[sea_orm(indexed)]
    pub user_id: String,

    /// Real name copied from the request.
    pub real_name: String,

    /// Email address copied from the request.
    pub email: String,

    /// When the email address was confirmed, if it was.
    #[sea_orm(nullable)]
    pub email_confirmed_at: Option<DateTimeWithTimeZone>,

    /// Biography copied from the request.
    #[sea_orm(column_type = "Text")]
    pub bio: String,

    /// Notes copied from the request.
    #[sea_orm(column_type = "Text")]
    pub notes: String,

    /// URLs copied from the request.
    #[sea_orm(column_type = "Text")]
    pub urls: String,

    /// Submitter IP copied from the request.
    pub ip: String,

    /// X-Forwarded-For chain copied from the request.
    #[sea_orm(nullable)]
    pub forwarded_for: Option<String>,

    /// Submitter user agent copied from the request.
    #[sea_orm(nullable)]
    pub user_agent: Option<String>,

    /// Original attachment file name, if any.
    #[sea_orm(nullable)]
    pub file_name: Option<String>,

    /// Attachment key in credential-scoped storage.
    #[sea_orm(nullable)]
    pub storage_key: Option<String>,

    /// Newline-separated areas of interest.
    #[sea_orm(column_type = "Text")]
    pub areas: String,

    /// When the original request was submitted.
    pub registered_at: DateTimeWithTimeZone,

    /// When the request was accepted.
    pub accepted_at: DateTimeWithTimeZone,

    /// Admin who accepted the request.
    pub accepted_by: String,

    /// Resolution comment given by the accepting admin.
    #[sea_orm(column_type = "Text")]
    pub comment: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
