use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(
            m20250301_000001_create_material_requests_table::Migration,
        )]
    }
}

mod m20250301_000001_create_material_requests_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_material_requests_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MaterialRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MaterialRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MaterialRequests::Title).string().not_null())
                        .col(
                            ColumnDef::new(MaterialRequests::RequestType)
                                .string()
                                .not_null()
                                .default("MR"),
                        )
                        .col(ColumnDef::new(MaterialRequests::Items).json().not_null())
                        .col(
                            ColumnDef::new(MaterialRequests::RequestedBy)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequests::RequesterEmail)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequests::RequesterId)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequests::TicketNumber)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(MaterialRequests::Zone).string().null())
                        .col(
                            ColumnDef::new(MaterialRequests::Description)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequests::Status)
                                .string()
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(MaterialRequests::TransportMode)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(MaterialRequests::Edt).timestamp().null())
                        .col(ColumnDef::new(MaterialRequests::TrackingNo).string().null())
                        .col(ColumnDef::new(MaterialRequests::SentAt).timestamp().null())
                        .col(ColumnDef::new(MaterialRequests::ApprovedBy).string().null())
                        .col(
                            ColumnDef::new(MaterialRequests::ApprovedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequests::ApprovedByEmail)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequests::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequests::UpdatedAt)
                                .timestamp()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // list reads are always ordered by creation time descending
            manager
                .create_index(
                    Index::create()
                        .name("idx_material_requests_created_at")
                        .table(MaterialRequests::Table)
                        .col(MaterialRequests::CreatedAt)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_material_requests_status")
                        .table(MaterialRequests::Table)
                        .col(MaterialRequests::Status)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MaterialRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum MaterialRequests {
        Table,
        Id,
        Title,
        RequestType,
        Items,
        RequestedBy,
        RequesterEmail,
        RequesterId,
        TicketNumber,
        Zone,
        Description,
        Status,
        TransportMode,
        Edt,
        TrackingNo,
        SentAt,
        ApprovedBy,
        ApprovedAt,
        ApprovedByEmail,
        CreatedAt,
        UpdatedAt,
    }
}
