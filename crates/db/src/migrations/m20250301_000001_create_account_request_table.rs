//! Create `account_request` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AccountRequest::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccountRequest::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AccountRequest::Name).string_len(256).not_null())
                    .col(ColumnDef::new(AccountRequest::Email).string_len(256).not_null())
                    .col(
                        ColumnDef::new(AccountRequest::RealName)
                            .string_len(256)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(AccountRequest::Bio).text().not_null().default(""))
                    .col(ColumnDef::new(AccountRequest::Notes).text().not_null().default(""))
                    .col(ColumnDef::new(AccountRequest::Urls).text().not_null().default(""))
                    .col(
                        ColumnDef::new(AccountRequest::RequestType)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(AccountRequest::Areas).text().not_null().default(""))
                    .col(
                        ColumnDef::new(AccountRequest::RegisteredAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(AccountRequest::Ip).string_len(64).not_null())
                    .col(ColumnDef::new(AccountRequest::ForwardedFor).string_len(512))
                    .col(ColumnDef::new(AccountRequest::UserAgent).string_len(512))
                    .col(ColumnDef::new(AccountRequest::FileName).string_len(256))
                    .col(ColumnDef::new(AccountRequest::StorageKey).string_len(256))
                    .col(
                        ColumnDef::new(AccountRequest::EmailTokenHash)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountRequest::EmailTokenExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AccountRequest::EmailConfirmedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(AccountRequest::HeldAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(AccountRequest::HeldBy).string_len(32))
                    .col(ColumnDef::new(AccountRequest::HeldReason).text())
                    .col(ColumnDef::new(AccountRequest::RejectedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(AccountRequest::RejectedBy).string_len(32))
                    .col(ColumnDef::new(AccountRequest::RejectedReason).text())
                    .col(ColumnDef::new(AccountRequest::HandledBy).string_len(32))
                    .col(
                        ColumnDef::new(AccountRequest::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        // Partial unique indexes: name/email uniqueness among pending rows
        // is a schema invariant, not just a claim-lock convention. Raw SQL
        // because sea-query index builders have no partial-index support.
        let conn = manager.get_connection();
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX uniq_account_request_pending_name \
             ON account_request (name) WHERE NOT deleted",
        )
        .await?;
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX uniq_account_request_pending_email \
             ON account_request (email) WHERE NOT deleted",
        )
        .await?;

        // Index: queue listings and badge counts
        manager
            .create_index(
                Index::create()
                    .name("idx_account_request_queue")
                    .table(AccountRequest::Table)
                    .col(AccountRequest::Deleted)
                    .col(AccountRequest::RequestType)
                    .col(AccountRequest::HeldAt)
                    .to_owned(),
            )
            .await?;

        // Index: token confirmation lookups
        manager
            .create_index(
                Index::create()
                    .name("idx_account_request_token_hash")
                    .table(AccountRequest::Table)
                    .col(AccountRequest::EmailTokenHash)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AccountRequest::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AccountRequest {
    Table,
    Id,
    Name,
    Email,
    RealName,
    Bio,
    Notes,
    Urls,
    RequestType,
    Areas,
    RegisteredAt,
    Ip,
    ForwardedFor,
    UserAgent,
    FileName,
    StorageKey,
    EmailTokenHash,
    EmailTokenExpiresAt,
    EmailConfirmedAt,
    HeldAt,
    HeldBy,
    HeldReason,
    RejectedAt,
    RejectedBy,
    RejectedReason,
    HandledBy,
    Deleted,
}
