//! Baseline for the tables owned by the bot itself.
//!
//! `users` and `children` are maintained by the sleep tracker application, but the
//! notification tables reference them. Creation is guarded so running this against a
//! database that already has them is a no-op.

use sea_orm_migration::{prelude::*, schema::*};

use crate::uuid_pk;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(uuid_pk(backend, Users::Id))
                    .col(big_integer(Users::TelegramUserId).unique_key())
                    .col(text_null(Users::Username))
                    .col(text_null(Users::FirstName))
                    .col(text_null(Users::LastName))
                    .col(text_null(Users::CustomName))
                    .col(json_binary(Users::Settings).default(Expr::cust("'{}'")))
                    .col(
                        timestamp_with_time_zone(Users::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Children::Table)
                    .if_not_exists()
                    .col(uuid_pk(backend, Children::Id))
                    .col(uuid(Children::UserId))
                    .col(text(Children::Name))
                    .col(date_null(Children::DateOfBirth))
                    .col(
                        timestamp_with_time_zone(Children::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_children_user_id")
                            .from(Children::Table, Children::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_children_user_id")
                    .table(Children::Table)
                    .col(Children::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_children_user_id")
                    .table(Children::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Children::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Users {
    Table,
    Id,
    TelegramUserId,
    Username,
    FirstName,
    LastName,
    CustomName,
    Settings,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Children {
    Table,
    Id,
    UserId,
    Name,
    DateOfBirth,
    CreatedAt,
}
