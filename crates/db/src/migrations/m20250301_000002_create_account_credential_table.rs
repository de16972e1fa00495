//! Create `account_credential` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AccountCredential::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccountCredential::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AccountCredential::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountCredential::RealName)
                            .string_len(256)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(AccountCredential::Email)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountCredential::EmailConfirmedAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(AccountCredential::Bio).text().not_null().default(""))
                    .col(ColumnDef::new(AccountCredential::Notes).text().not_null().default(""))
                    .col(ColumnDef::new(AccountCredential::Urls).text().not_null().default(""))
                    .col(ColumnDef::new(AccountCredential::Ip).string_len(64).not_null())
                    .col(ColumnDef::new(AccountCredential::ForwardedFor).string_len(512))
                    .col(ColumnDef::new(AccountCredential::UserAgent).string_len(512))
                    .col(ColumnDef::new(AccountCredential::FileName).string_len(256))
                    .col(ColumnDef::new(AccountCredential::StorageKey).string_len(256))
                    .col(ColumnDef::new(AccountCredential::Areas).text().not_null().default(""))
                    .col(
                        ColumnDef::new(AccountCredential::RegisteredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountCredential::AcceptedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountCredential::AcceptedBy)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountCredential::Comment)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: credential lookups by account id
        manager
            .create_index(
                Index::create()
                    .name("idx_account_credential_user_id")
                    .table(AccountCredential::Table)
                    .col(AccountCredential::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AccountCredential::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AccountCredential {
    Table,
    Id,
    UserId,
    RealName,
    Email,
    EmailConfirmedAt,
    Bio,
    Notes,
    Urls,
    Ip,
    ForwardedFor,
    UserAgent,
    FileName,
    StorageKey,
    Areas,
    RegisteredAt,
    AcceptedAt,
    AcceptedBy,
    Comment,
}
