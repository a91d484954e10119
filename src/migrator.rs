use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_payment_orders_table::Migration),
            Box::new(m20240301_000002_create_catalog_tables::Migration),
            Box::new(m20240301_000003_create_wallet_ledger_table::Migration),
            Box::new(m20240301_000004_create_user_subscriptions_table::Migration),
        ]
    }
}

mod m20240301_000001_create_payment_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_payment_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PaymentOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentOrders::OrderId)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentOrders::UserId).uuid().not_null())
                        .col(ColumnDef::new(PaymentOrders::ItemType).string().not_null())
                        .col(ColumnDef::new(PaymentOrders::ItemId).string().not_null())
                        .col(ColumnDef::new(PaymentOrders::PartnerId).string())
                        .col(
                            ColumnDef::new(PaymentOrders::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentOrders::Currency).string().not_null())
                        .col(
                            ColumnDef::new(PaymentOrders::ItemSnapshot)
                                .json()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentOrders::Status).string().not_null())
                        .col(
                            ColumnDef::new(PaymentOrders::GatewayOrderRef)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentOrders::GatewaySessionRef)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentOrders::Fulfillment).json().not_null())
                        .col(
                            ColumnDef::new(PaymentOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_payment_orders_user_id")
                        .table(PaymentOrders::Table)
                        .col(PaymentOrders::UserId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PaymentOrders {
        Table,
        OrderId,
        UserId,
        ItemType,
        ItemId,
        PartnerId,
        Amount,
        Currency,
        ItemSnapshot,
        Status,
        GatewayOrderRef,
        GatewaySessionRef,
        Fulfillment,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CoinBundles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CoinBundles::Id)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CoinBundles::Name).string().not_null())
                        // Display price as entered by catalog admins ("₹499");
                        // parsed into an exact decimal at resolution time.
                        .col(ColumnDef::new(CoinBundles::Price).string().not_null())
                        .col(ColumnDef::new(CoinBundles::Coins).big_integer().not_null())
                        .col(
                            ColumnDef::new(CoinBundles::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(CoinBundles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SubscriptionPlans::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SubscriptionPlans::Id)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SubscriptionPlans::PlanName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SubscriptionPlans::TermDays)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SubscriptionPlans::Price).string().not_null())
                        .col(
                            ColumnDef::new(SubscriptionPlans::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(SubscriptionPlans::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PartnerProducts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PartnerProducts::Id)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PartnerProducts::Title).string().not_null())
                        .col(ColumnDef::new(PartnerProducts::Price).string().not_null())
                        .col(ColumnDef::new(PartnerProducts::PartnerId).string())
                        .col(
                            ColumnDef::new(PartnerProducts::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(PartnerProducts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PartnerProducts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SubscriptionPlans::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CoinBundles::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CoinBundles {
        Table,
        Id,
        Name,
        Price,
        Coins,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum SubscriptionPlans {
        Table,
        Id,
        PlanName,
        TermDays,
        Price,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum PartnerProducts {
        Table,
        Id,
        Title,
        Price,
        PartnerId,
        IsActive,
        CreatedAt,
    }
}

mod m20240301_000003_create_wallet_ledger_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_wallet_ledger_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WalletLedgerEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WalletLedgerEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WalletLedgerEntries::UserId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WalletLedgerEntries::Delta)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WalletLedgerEntries::BalanceAfter)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WalletLedgerEntries::IdempotencyToken)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(WalletLedgerEntries::Reason)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WalletLedgerEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_wallet_ledger_user_id")
                        .table(WalletLedgerEntries::Table)
                        .col(WalletLedgerEntries::UserId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WalletLedgerEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WalletLedgerEntries {
        Table,
        Id,
        UserId,
        Delta,
        BalanceAfter,
        IdempotencyToken,
        Reason,
        CreatedAt,
    }
}

mod m20240301_000004_create_user_subscriptions_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_user_subscriptions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(UserSubscriptions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UserSubscriptions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(UserSubscriptions::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(UserSubscriptions::PlanId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserSubscriptions::PlanName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserSubscriptions::StartsAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserSubscriptions::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserSubscriptions::SourceOrderId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(UserSubscriptions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(UserSubscriptions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum UserSubscriptions {
        Table,
        Id,
        UserId,
        PlanId,
        PlanName,
        StartsAt,
        ExpiresAt,
        SourceOrderId,
        CreatedAt,
    }
}
