use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_stores_table::Migration),
            Box::new(m20250101_000002_create_clients_table::Migration),
            Box::new(m20250101_000003_create_materials_table::Migration),
            Box::new(m20250101_000004_create_machines_table::Migration),
            Box::new(m20250101_000005_create_labor_roles_table::Migration),
            Box::new(m20250101_000006_create_quotes_table::Migration),
            Box::new(m20250101_000007_create_quote_items_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_stores_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_stores_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Cost parameter columns stay nullable: a store that has not
            // finished onboarding has no rates, and the engine must be able
            // to tell "unset" apart from zero.
            manager
                .create_table(
                    Table::create()
                        .table(Stores::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Stores::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Stores::Name).string().not_null())
                        .col(ColumnDef::new(Stores::LaborCostPerHour).decimal().null())
                        .col(ColumnDef::new(Stores::MachineCostPerHour).decimal().null())
                        .col(
                            ColumnDef::new(Stores::IndirectMonthlyCosts)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Stores::DefaultMarginPercent)
                                .decimal()
                                .null(),
                        )
                        .col(ColumnDef::new(Stores::DefaultTaxPercent).decimal().null())
                        .col(
                            ColumnDef::new(Stores::MonthlyProductiveHours)
                                .integer()
                                .null(),
                        )
                        .col(ColumnDef::new(Stores::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Stores::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Stores::Table).if_exists().to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Stores {
        Table,
        Id,
        Name,
        LaborCostPerHour,
        MachineCostPerHour,
        IndirectMonthlyCosts,
        DefaultMarginPercent,
        DefaultTaxPercent,
        MonthlyProductiveHours,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_clients_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_clients_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Clients::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Clients::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Clients::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Clients::Name).string().not_null())
                        .col(ColumnDef::new(Clients::Email).string().null())
                        .col(ColumnDef::new(Clients::Phone).string().null())
                        .col(ColumnDef::new(Clients::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Clients::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_clients_store_id")
                        .table(Clients::Table)
                        .col(Clients::StoreId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Clients::Table).if_exists().to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Clients {
        Table,
        Id,
        StoreId,
        Name,
        Email,
        Phone,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000003_create_materials_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_materials_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Materials::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Materials::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Materials::Name).string().not_null())
                        .col(
                            ColumnDef::new(Materials::UnitCost)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Materials::UnitOfMeasure).string().not_null())
                        .col(ColumnDef::new(Materials::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Materials::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_materials_store_id")
                        .table(Materials::Table)
                        .col(Materials::StoreId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Materials::Table).if_exists().to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Materials {
        Table,
        Id,
        StoreId,
        Name,
        UnitCost,
        UnitOfMeasure,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000004_create_machines_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_machines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Machines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Machines::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Machines::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Machines::Name).string().not_null())
                        .col(ColumnDef::new(Machines::MachineType).string().not_null())
                        .col(
                            ColumnDef::new(Machines::CostPerHour)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Machines::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Machines::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_machines_store_id")
                        .table(Machines::Table)
                        .col(Machines::StoreId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Machines::Table).if_exists().to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Machines {
        Table,
        Id,
        StoreId,
        Name,
        MachineType,
        CostPerHour,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000005_create_labor_roles_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_labor_roles_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LaborRoles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LaborRoles::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LaborRoles::StoreId).uuid().not_null())
                        .col(ColumnDef::new(LaborRoles::Name).string().not_null())
                        .col(
                            ColumnDef::new(LaborRoles::CostPerHour)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(LaborRoles::LinkedMachineName)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(LaborRoles::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(LaborRoles::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_labor_roles_store_id")
                        .table(LaborRoles::Table)
                        .col(LaborRoles::StoreId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(LaborRoles::Table)
                        .if_exists()
                        .to_owned(),
                )
                .await
        }
    }

    #[derive(Iden)]
    pub enum LaborRoles {
        Table,
        Id,
        StoreId,
        Name,
        CostPerHour,
        LinkedMachineName,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000006_create_quotes_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000006_create_quotes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Quotes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Quotes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Quotes::QuoteNumber).string().not_null())
                        .col(ColumnDef::new(Quotes::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Quotes::ClientId).uuid().null())
                        .col(ColumnDef::new(Quotes::ServiceName).string().not_null())
                        .col(ColumnDef::new(Quotes::Description).string().null())
                        .col(
                            ColumnDef::new(Quotes::ProductionHours)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Quotes::ProductQuantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(Quotes::MaterialCost).decimal().not_null())
                        .col(ColumnDef::new(Quotes::LaborCost).decimal().not_null())
                        .col(ColumnDef::new(Quotes::IndirectCost).decimal().not_null())
                        .col(
                            ColumnDef::new(Quotes::TotalProductionCost)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Quotes::MarginPercent).decimal().not_null())
                        .col(ColumnDef::new(Quotes::MarginValue).decimal().not_null())
                        .col(
                            ColumnDef::new(Quotes::SubtotalWithMargin)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Quotes::TaxPercent).decimal().not_null())
                        .col(ColumnDef::new(Quotes::TaxValue).decimal().not_null())
                        .col(ColumnDef::new(Quotes::FinalPrice).decimal().not_null())
                        .col(ColumnDef::new(Quotes::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Quotes::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quotes_store_id")
                        .table(Quotes::Table)
                        .col(Quotes::StoreId)
                        .to_owned(),
                )
                .await?;

            // The numbering retry loop in the quote service depends on this
            // uniqueness guarantee; without it concurrent creations in the
            // same store and month could be assigned the same number.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quotes_store_number")
                        .table(Quotes::Table)
                        .col(Quotes::StoreId)
                        .col(Quotes::QuoteNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Quotes::Table).if_exists().to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Quotes {
        Table,
        Id,
        QuoteNumber,
        StoreId,
        ClientId,
        ServiceName,
        Description,
        ProductionHours,
        ProductQuantity,
        MaterialCost,
        LaborCost,
        IndirectCost,
        TotalProductionCost,
        MarginPercent,
        MarginValue,
        SubtotalWithMargin,
        TaxPercent,
        TaxValue,
        FinalPrice,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000007_create_quote_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000007_create_quote_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(QuoteItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(QuoteItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuoteItems::QuoteId).uuid().not_null())
                        .col(ColumnDef::new(QuoteItems::MaterialId).uuid().not_null())
                        .col(
                            ColumnDef::new(QuoteItems::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(QuoteItems::Name).string().not_null())
                        .col(ColumnDef::new(QuoteItems::Quantity).decimal().not_null())
                        .col(ColumnDef::new(QuoteItems::UnitCost).decimal().not_null())
                        .col(ColumnDef::new(QuoteItems::LineTotal).decimal().not_null())
                        .col(
                            ColumnDef::new(QuoteItems::UnitOfMeasure)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteItems::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quote_items_quote_id")
                        .table(QuoteItems::Table)
                        .col(QuoteItems::QuoteId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(QuoteItems::Table)
                        .if_exists()
                        .to_owned(),
                )
                .await
        }
    }

    #[derive(Iden)]
    pub enum QuoteItems {
        Table,
        Id,
        QuoteId,
        MaterialId,
        Position,
        Name,
        Quantity,
        UnitCost,
        LineTotal,
        UnitOfMeasure,
        CreatedAt,
    }
}
