use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_accounts_table::Migration),
            Box::new(m20240101_000002_create_products_table::Migration),
        ]
    }
}

mod m20240101_000001_create_accounts_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_accounts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Accounts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Accounts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Accounts::Role).string_len(20).not_null())
                        .col(ColumnDef::new(Accounts::FullName).string_len(30).not_null())
                        .col(ColumnDef::new(Accounts::Email).string().not_null())
                        .col(ColumnDef::new(Accounts::Username).string_len(30).not_null())
                        .col(ColumnDef::new(Accounts::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Accounts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Accounts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_accounts_role_email")
                        .table(Accounts::Table)
                        .col(Accounts::Role)
                        .col(Accounts::Email)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_accounts_role_username")
                        .table(Accounts::Table)
                        .col(Accounts::Role)
                        .col(Accounts::Username)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Accounts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Accounts {
        Table,
        Id,
        Role,
        FullName,
        Email,
        Username,
        PasswordHash,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string_len(200).not_null())
                        .col(
                            ColumnDef::new(Products::Sku)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Category).string_len(100).null())
                        .col(ColumnDef::new(Products::Brand).string_len(100).null())
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::InStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::MinStockLevel)
                                .integer()
                                .not_null()
                                .default(10),
                        )
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(
                            ColumnDef::new(Products::IsAvailable)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_category")
                        .table(Products::Table)
                        .col(Products::Category)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_in_stock")
                        .table(Products::Table)
                        .col(Products::InStock)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Name,
        Sku,
        Category,
        Brand,
        Price,
        InStock,
        MinStockLevel,
        Description,
        IsAvailable,
        CreatedAt,
        UpdatedAt,
    }
}

/// Standalone migration runner used by the CLI.
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
