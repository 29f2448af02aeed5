use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_products_table::Migration),
            Box::new(m20240301_000002_create_orders_tables::Migration),
            Box::new(m20240301_000003_create_purchase_request_tables::Migration),
            Box::new(m20240301_000004_create_dispatch_tables::Migration),
            Box::new(m20240301_000005_create_payment_receipts_table::Migration),
            Box::new(m20240301_000006_create_sell_records_table::Migration),
            Box::new(m20240301_000007_create_document_sequences_table::Migration),
            Box::new(m20240301_000008_create_outbox_events_table::Migration),
        ]
    }
}

/// Precision and scale of money columns. SQLite caps decimal precision at 16.
const MONEY_PRECISION: u32 = 16;
const MONEY_SCALE: u32 = 4;

fn money(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .decimal_len(MONEY_PRECISION, MONEY_SCALE)
        .not_null()
        .default(0)
        .to_owned()
}

fn counter(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .integer()
        .not_null()
        .default(0)
        .to_owned()
}

mod m20240301_000001_create_products_table {
    use super::counter;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_products_table"
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
                        .col(
                            ColumnDef::new(Products::Sku)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(counter(Products::FreshStock))
                        .col(counter(Products::DamagedStock))
                        .col(counter(Products::SampleStock))
                        .col(counter(Products::ShowroomStock))
                        .col(counter(Products::OpeningStock))
                        .col(counter(Products::OrderedQuantity))
                        .col(counter(Products::InTransitQuantity))
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Products::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
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
        Sku,
        Name,
        FreshStock,
        DamagedStock,
        SampleStock,
        ShowroomStock,
        OpeningStock,
        OrderedQuantity,
        InTransitQuantity,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240301_000002_create_orders_tables {
    use super::{counter, money, MONEY_PRECISION, MONEY_SCALE};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_orders_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::CompanyId).uuid().not_null())
                        .col(ColumnDef::new(Orders::PartyId).uuid().not_null())
                        .col(ColumnDef::new(Orders::SiteId).uuid().null())
                        .col(ColumnDef::new(Orders::CompanyName).string().null())
                        .col(ColumnDef::new(Orders::PartyName).string().null())
                        .col(ColumnDef::new(Orders::SiteName).string().null())
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Orders::PaymentStatus)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(money(Orders::GrandTotal))
                        .col(money(Orders::GstRate))
                        .col(money(Orders::GstAmount))
                        .col(money(Orders::NetAmountPayable))
                        .col(money(Orders::AmountPaid))
                        .col(money(Orders::BalanceAmount))
                        .col(ColumnDef::new(Orders::CancellationReason).text().null())
                        .col(ColumnDef::new(Orders::CancelledBy).string().null())
                        .col(
                            ColumnDef::new(Orders::CancelledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::CancellationType).string_len(16).null())
                        .col(
                            ColumnDef::new(Orders::PaymentAdjustmentAction)
                                .string_len(16)
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::PaymentAdjustmentTarget).uuid().null())
                        .col(
                            ColumnDef::new(Orders::PaymentAdjustmentAmount)
                                .decimal_len(MONEY_PRECISION, MONEY_SCALE)
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::CreatedBy).string().not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderGroups::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderGroups::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderGroups::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderGroups::Name).string().not_null())
                        .col(counter(OrderGroups::Position))
                        .col(money(OrderGroups::TotalAmount))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_groups_order")
                                .from(OrderGroups::Table, OrderGroups::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::GroupId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(counter(OrderItems::Position))
                        .col(counter(OrderItems::Quantity))
                        .col(counter(OrderItems::DispatchedQuantity))
                        .col(counter(OrderItems::BalanceQuantity))
                        .col(counter(OrderItems::CancelledQuantity))
                        .col(money(OrderItems::NetRate))
                        .col(money(OrderItems::TotalAmount))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_group")
                                .from(OrderItems::Table, OrderItems::GroupId)
                                .to(OrderGroups::Table, OrderGroups::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderGroups::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        CompanyId,
        PartyId,
        SiteId,
        CompanyName,
        PartyName,
        SiteName,
        Status,
        PaymentStatus,
        GrandTotal,
        GstRate,
        GstAmount,
        NetAmountPayable,
        AmountPaid,
        BalanceAmount,
        CancellationReason,
        CancelledBy,
        CancelledAt,
        CancellationType,
        PaymentAdjustmentAction,
        PaymentAdjustmentTarget,
        PaymentAdjustmentAmount,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    enum OrderGroups {
        Table,
        Id,
        OrderId,
        Name,
        Position,
        TotalAmount,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        GroupId,
        ProductId,
        Position,
        Quantity,
        DispatchedQuantity,
        BalanceQuantity,
        CancelledQuantity,
        NetRate,
        TotalAmount,
    }
}

mod m20240301_000003_create_purchase_request_tables {
    use super::{counter, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_purchase_request_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::PrNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::VendorName).string().null())
                        .col(
                            ColumnDef::new(PurchaseRequests::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::PiReceived)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(PurchaseRequests::PiNumber).string().null())
                        .col(money(PurchaseRequests::PiAmount))
                        .col(
                            ColumnDef::new(PurchaseRequests::PaymentDone)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(money(PurchaseRequests::PaymentAmount))
                        .col(
                            ColumnDef::new(PurchaseRequests::MaterialReceived)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::VendorInvoiceNumber)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::VendorInvoiceDate)
                                .date()
                                .null(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::Remarks).text().null())
                        .col(ColumnDef::new(PurchaseRequests::RejectionReason).text().null())
                        .col(ColumnDef::new(PurchaseRequests::ApprovedBy).string().null())
                        .col(ColumnDef::new(PurchaseRequests::CreatedBy).string().not_null())
                        .col(
                            ColumnDef::new(PurchaseRequests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseRequestItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseRequestItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestItems::PurchaseRequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseRequestItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseRequestItems::OrderItemId).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseRequestItems::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(counter(PurchaseRequestItems::Quantity))
                        .col(
                            ColumnDef::new(PurchaseRequestItems::PiReceivedQuantity)
                                .integer()
                                .null(),
                        )
                        .col(counter(PurchaseRequestItems::FreshStockReceived))
                        .col(counter(PurchaseRequestItems::DamagedStockReceived))
                        .col(counter(PurchaseRequestItems::ShortQtyReceived))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_pr_items_pr")
                                .from(
                                    PurchaseRequestItems::Table,
                                    PurchaseRequestItems::PurchaseRequestId,
                                )
                                .to(PurchaseRequests::Table, PurchaseRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pr_items_order_id")
                        .table(PurchaseRequestItems::Table)
                        .col(PurchaseRequestItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseRequestItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PurchaseRequests {
        Table,
        Id,
        PrNumber,
        VendorName,
        Status,
        PiReceived,
        PiNumber,
        PiAmount,
        PaymentDone,
        PaymentAmount,
        MaterialReceived,
        VendorInvoiceNumber,
        VendorInvoiceDate,
        Remarks,
        RejectionReason,
        ApprovedBy,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    enum PurchaseRequestItems {
        Table,
        Id,
        PurchaseRequestId,
        OrderId,
        OrderItemId,
        ProductId,
        Quantity,
        PiReceivedQuantity,
        FreshStockReceived,
        DamagedStockReceived,
        ShortQtyReceived,
    }
}

mod m20240301_000004_create_dispatch_tables {
    use super::{counter, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_dispatch_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DispatchNotes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DispatchNotes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DispatchNotes::DnNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(DispatchNotes::OrderId).uuid().not_null())
                        .col(ColumnDef::new(DispatchNotes::OrderNumber).string().not_null())
                        .col(ColumnDef::new(DispatchNotes::CompanyId).uuid().not_null())
                        .col(ColumnDef::new(DispatchNotes::PartyId).uuid().not_null())
                        .col(ColumnDef::new(DispatchNotes::SiteId).uuid().null())
                        .col(ColumnDef::new(DispatchNotes::CompanyName).string().null())
                        .col(ColumnDef::new(DispatchNotes::PartyName).string().null())
                        .col(ColumnDef::new(DispatchNotes::SiteName).string().null())
                        .col(ColumnDef::new(DispatchNotes::VehicleNumber).string().null())
                        .col(ColumnDef::new(DispatchNotes::Remarks).text().null())
                        .col(money(DispatchNotes::TotalAmount))
                        .col(
                            ColumnDef::new(DispatchNotes::Sold)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(DispatchNotes::CreatedBy).string().not_null())
                        .col(
                            ColumnDef::new(DispatchNotes::CreatedAt)
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
                        .name("idx_dispatch_notes_order_id")
                        .table(DispatchNotes::Table)
                        .col(DispatchNotes::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DispatchNoteItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DispatchNoteItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DispatchNoteItems::DispatchNoteId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DispatchNoteItems::OrderItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DispatchNoteItems::ProductId).uuid().not_null())
                        .col(counter(DispatchNoteItems::Quantity))
                        .col(money(DispatchNoteItems::Rate))
                        .col(money(DispatchNoteItems::Amount))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_dispatch_note_items_note")
                                .from(DispatchNoteItems::Table, DispatchNoteItems::DispatchNoteId)
                                .to(DispatchNotes::Table, DispatchNotes::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DispatchNoteItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DispatchNotes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DispatchNotes {
        Table,
        Id,
        DnNumber,
        OrderId,
        OrderNumber,
        CompanyId,
        PartyId,
        SiteId,
        CompanyName,
        PartyName,
        SiteName,
        VehicleNumber,
        Remarks,
        TotalAmount,
        Sold,
        CreatedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum DispatchNoteItems {
        Table,
        Id,
        DispatchNoteId,
        OrderItemId,
        ProductId,
        Quantity,
        Rate,
        Amount,
    }
}

mod m20240301_000005_create_payment_receipts_table {
    use super::money;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_payment_receipts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PaymentReceipts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentReceipts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentReceipts::ReceiptNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PaymentReceipts::OrderId).uuid().not_null())
                        .col(money(PaymentReceipts::Amount))
                        .col(ColumnDef::new(PaymentReceipts::PaymentMode).string().null())
                        .col(ColumnDef::new(PaymentReceipts::Reference).string().null())
                        .col(ColumnDef::new(PaymentReceipts::CreatedBy).string().not_null())
                        .col(
                            ColumnDef::new(PaymentReceipts::ReceivedAt)
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
                        .name("idx_payment_receipts_order_id")
                        .table(PaymentReceipts::Table)
                        .col(PaymentReceipts::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentReceipts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PaymentReceipts {
        Table,
        Id,
        ReceiptNumber,
        OrderId,
        Amount,
        PaymentMode,
        Reference,
        CreatedBy,
        ReceivedAt,
    }
}

mod m20240301_000006_create_sell_records_table {
    use super::money;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_sell_records_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SellRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SellRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SellRecords::SellNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(SellRecords::DispatchNoteId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(SellRecords::OrderId).uuid().not_null())
                        .col(money(SellRecords::TotalAmount))
                        .col(ColumnDef::new(SellRecords::CreatedBy).string().not_null())
                        .col(
                            ColumnDef::new(SellRecords::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SellRecords::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SellRecords {
        Table,
        Id,
        SellNumber,
        DispatchNoteId,
        OrderId,
        TotalAmount,
        CreatedBy,
        CreatedAt,
    }
}

mod m20240301_000007_create_document_sequences_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_document_sequences_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DocumentSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DocumentSequences::Prefix)
                                .string_len(16)
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DocumentSequences::LastValue)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DocumentSequences::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DocumentSequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DocumentSequences {
        Table,
        Prefix,
        LastValue,
        Version,
    }
}

mod m20240301_000008_create_outbox_events_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000008_create_outbox_events_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OutboxEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OutboxEvents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OutboxEvents::AggregateType).string().not_null())
                        .col(ColumnDef::new(OutboxEvents::AggregateId).uuid().null())
                        .col(ColumnDef::new(OutboxEvents::EventType).string().not_null())
                        .col(ColumnDef::new(OutboxEvents::Payload).text().not_null())
                        .col(
                            ColumnDef::new(OutboxEvents::Status)
                                .string_len(16)
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::Attempts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::AvailableAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::ProcessedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(OutboxEvents::ErrorMessage).text().null())
                        .col(
                            ColumnDef::new(OutboxEvents::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_outbox_events_status_available")
                        .table(OutboxEvents::Table)
                        .col(OutboxEvents::Status)
                        .col(OutboxEvents::AvailableAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OutboxEvents::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OutboxEvents {
        Table,
        Id,
        AggregateType,
        AggregateId,
        EventType,
        Payload,
        Status,
        Attempts,
        AvailableAt,
        ProcessedAt,
        ErrorMessage,
        CreatedAt,
        UpdatedAt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    #[test]
    fn money_columns_render_for_sqlite() {
        let sql = Table::create()
            .table(Alias::new("ledger"))
            .col(money(Alias::new("amount")))
            .to_string(SqliteQueryBuilder);
        assert!(sql.contains("amount"), "{}", sql);
    }

    #[tokio::test]
    async fn migrations_apply_on_sqlite() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let applied = Migrator::get_applied_migrations(&db).await.unwrap();
        assert_eq!(applied.len(), Migrator::migrations().len());
    }
}
