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
            Box::new(m20240115_000001_create_warehouses_table::Migration),
            Box::new(m20240115_000002_create_users_table::Migration),
            Box::new(m20240115_000003_create_vehicles_table::Migration),
            Box::new(m20240115_000004_create_packages_table::Migration),
            Box::new(m20240115_000005_create_package_status_logs_table::Migration),
            Box::new(m20240115_000006_create_shipments_table::Migration),
            Box::new(m20240115_000007_create_shipment_status_logs_table::Migration),
            Box::new(m20240115_000008_create_shipment_packages_table::Migration),
            Box::new(m20240115_000009_create_manifests_table::Migration),
            Box::new(m20240115_000010_create_manifest_rows_table::Migration),
            Box::new(m20240115_000011_create_service_areas_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240115_000001_create_warehouses_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000001_create_warehouses_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create warehouses table aligned with entities::warehouse Model
            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Warehouses::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(ColumnDef::new(Warehouses::Province).string().not_null())
                        .col(ColumnDef::new(Warehouses::City).string().not_null())
                        .col(ColumnDef::new(Warehouses::Barangay).string().not_null())
                        .col(ColumnDef::new(Warehouses::Street).string().not_null())
                        .col(ColumnDef::new(Warehouses::Phone).string().null())
                        .col(
                            ColumnDef::new(Warehouses::WeightCapacityKg)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warehouses::VolumeCapacityM3)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warehouses::TargetUtilizationPct)
                                .integer()
                                .not_null()
                                .default(100),
                        )
                        .col(
                            ColumnDef::new(Warehouses::IsArchived)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Warehouses::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Warehouses::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_warehouses_province_city")
                        .table(Warehouses::Table)
                        .col(Warehouses::Province)
                        .col(Warehouses::City)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Drop warehouses table
            manager
                .drop_table(Table::drop().table(Warehouses::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Warehouses {
        Table,
        Id,
        Name,
        Province,
        City,
        Barangay,
        Street,
        Phone,
        WeightCapacityKg,
        VolumeCapacityM3,
        TargetUtilizationPct,
        IsArchived,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240115_000002_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000002_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create users table
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::Role).string().not_null())
                        .col(ColumnDef::new(Users::WarehouseId).uuid().null())
                        .col(ColumnDef::new(Users::Phone).string().null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Users::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_users_warehouse_id")
                                .from(Users::Table, Users::WarehouseId)
                                .to(Warehouses::Table, Warehouses::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_warehouse_id")
                        .table(Users::Table)
                        .col(Users::WarehouseId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Drop users table
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Name,
        Email,
        PasswordHash,
        Role,
        WarehouseId,
        Phone,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Warehouses {
        Table,
        Id,
    }
}

mod m20240115_000003_create_vehicles_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000003_create_vehicles_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create vehicles table
            manager
                .create_table(
                    Table::create()
                        .table(Vehicles::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Vehicles::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Vehicles::PlateNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Vehicles::Name).string().null())
                        .col(ColumnDef::new(Vehicles::VehicleType).string().not_null())
                        .col(
                            ColumnDef::new(Vehicles::WeightCapacityKg)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Vehicles::IsExpress)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Vehicles::InMaintenance)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Vehicles::Notes).string().null())
                        .col(
                            ColumnDef::new(Vehicles::IsArchived)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Vehicles::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Vehicles::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_vehicles_vehicle_type")
                        .table(Vehicles::Table)
                        .col(Vehicles::VehicleType)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Drop vehicles table
            manager
                .drop_table(Table::drop().table(Vehicles::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Vehicles {
        Table,
        Id,
        PlateNumber,
        Name,
        VehicleType,
        WeightCapacityKg,
        IsExpress,
        InMaintenance,
        Notes,
        IsArchived,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240115_000004_create_packages_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000004_create_packages_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create packages table aligned with entities::package Model
            manager
                .create_table(
                    Table::create()
                        .table(Packages::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Packages::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Packages::TrackingNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Packages::ShippingParty).string().not_null())
                        .col(ColumnDef::new(Packages::ShippingMode).string().not_null())
                        .col(ColumnDef::new(Packages::ShippingType).string().not_null())
                        .col(ColumnDef::new(Packages::ReceptionMode).string().not_null())
                        .col(ColumnDef::new(Packages::WeightKg).decimal().not_null())
                        .col(ColumnDef::new(Packages::VolumeM3).decimal().not_null())
                        .col(ColumnDef::new(Packages::Contents).string().not_null())
                        .col(
                            ColumnDef::new(Packages::Pieces)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(Packages::SenderName).string().not_null())
                        .col(ColumnDef::new(Packages::SenderPhone).string().not_null())
                        .col(ColumnDef::new(Packages::SenderAddress).string().not_null())
                        .col(ColumnDef::new(Packages::ReceiverName).string().not_null())
                        .col(ColumnDef::new(Packages::ReceiverPhone).string().not_null())
                        .col(
                            ColumnDef::new(Packages::ReceiverProvince)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Packages::ReceiverCity).string().not_null())
                        .col(
                            ColumnDef::new(Packages::ReceiverBarangay)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Packages::ReceiverStreet).string().not_null())
                        .col(
                            ColumnDef::new(Packages::IsFragile)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Packages::DeclaredValue).decimal().null())
                        .col(ColumnDef::new(Packages::ContainerNo).string().null())
                        .col(ColumnDef::new(Packages::ExpectedDeliveryDate).date().null())
                        .col(ColumnDef::new(Packages::Notes).string().null())
                        .col(ColumnDef::new(Packages::Status).string().not_null())
                        .col(ColumnDef::new(Packages::WarehouseId).uuid().null())
                        .col(ColumnDef::new(Packages::ManifestId).uuid().null())
                        .col(
                            ColumnDef::new(Packages::IsArchived)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Packages::CreatedBy).uuid().null())
                        .col(ColumnDef::new(Packages::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Packages::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_packages_warehouse_id")
                                .from(Packages::Table, Packages::WarehouseId)
                                .to(Warehouses::Table, Warehouses::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Useful indexes
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_packages_status")
                        .table(Packages::Table)
                        .col(Packages::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_packages_warehouse_id")
                        .table(Packages::Table)
                        .col(Packages::WarehouseId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_packages_created_at")
                        .table(Packages::Table)
                        .col(Packages::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Drop packages table
            manager
                .drop_table(Table::drop().table(Packages::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Packages {
        Table,
        Id,
        TrackingNumber,
        ShippingParty,
        ShippingMode,
        ShippingType,
        ReceptionMode,
        WeightKg,
        VolumeM3,
        Contents,
        Pieces,
        SenderName,
        SenderPhone,
        SenderAddress,
        ReceiverName,
        ReceiverPhone,
        ReceiverProvince,
        ReceiverCity,
        ReceiverBarangay,
        ReceiverStreet,
        IsFragile,
        DeclaredValue,
        ContainerNo,
        ExpectedDeliveryDate,
        Notes,
        Status,
        WarehouseId,
        ManifestId,
        IsArchived,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Warehouses {
        Table,
        Id,
    }
}

mod m20240115_000005_create_package_status_logs_table {
    use sea_orm_migration::prelude::*;

    use super::m20240115_000004_create_packages_table::Packages;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000005_create_package_status_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create append-only package_status_logs table
            manager
                .create_table(
                    Table::create()
                        .table(PackageStatusLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PackageStatusLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackageStatusLogs::PackageId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackageStatusLogs::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackageStatusLogs::Description)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackageStatusLogs::ActorId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackageStatusLogs::RecordedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_package_status_logs_package_id")
                                .from(PackageStatusLogs::Table, PackageStatusLogs::PackageId)
                                .to(Packages::Table, Packages::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_package_status_logs_package_id")
                        .table(PackageStatusLogs::Table)
                        .col(PackageStatusLogs::PackageId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_package_status_logs_recorded_at")
                        .table(PackageStatusLogs::Table)
                        .col(PackageStatusLogs::RecordedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Drop package_status_logs table
            manager
                .drop_table(Table::drop().table(PackageStatusLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PackageStatusLogs {
        Table,
        Id,
        PackageId,
        Status,
        Description,
        ActorId,
        RecordedAt,
    }
}

mod m20240115_000006_create_shipments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000006_create_shipments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create shipments table covering deliveries, incoming runs and
            // warehouse transfers
            manager
                .create_table(
                    Table::create()
                        .table(Shipments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Shipments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::Reference)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Shipments::Kind).string().not_null())
                        .col(ColumnDef::new(Shipments::Status).string().not_null())
                        .col(ColumnDef::new(Shipments::OriginWarehouseId).uuid().null())
                        .col(
                            ColumnDef::new(Shipments::DestinationWarehouseId)
                                .uuid()
                                .null(),
                        )
                        .col(ColumnDef::new(Shipments::OriginLabel).string().null())
                        .col(ColumnDef::new(Shipments::DriverId).uuid().null())
                        .col(ColumnDef::new(Shipments::VehicleId).uuid().null())
                        .col(ColumnDef::new(Shipments::ManifestId).uuid().null())
                        .col(ColumnDef::new(Shipments::ScheduledDate).date().null())
                        .col(ColumnDef::new(Shipments::DepartedAt).timestamp().null())
                        .col(ColumnDef::new(Shipments::CompletedAt).timestamp().null())
                        .col(ColumnDef::new(Shipments::Notes).string().null())
                        .col(
                            ColumnDef::new(Shipments::IsArchived)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Shipments::CreatedBy).uuid().null())
                        .col(ColumnDef::new(Shipments::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Shipments::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipments_kind")
                        .table(Shipments::Table)
                        .col(Shipments::Kind)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipments_status")
                        .table(Shipments::Table)
                        .col(Shipments::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipments_vehicle_id")
                        .table(Shipments::Table)
                        .col(Shipments::VehicleId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipments_created_at")
                        .table(Shipments::Table)
                        .col(Shipments::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Drop shipments table
            manager
                .drop_table(Table::drop().table(Shipments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Shipments {
        Table,
        Id,
        Reference,
        Kind,
        Status,
        OriginWarehouseId,
        DestinationWarehouseId,
        OriginLabel,
        DriverId,
        VehicleId,
        ManifestId,
        ScheduledDate,
        DepartedAt,
        CompletedAt,
        Notes,
        IsArchived,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240115_000007_create_shipment_status_logs_table {
    use sea_orm_migration::prelude::*;

    use super::m20240115_000006_create_shipments_table::Shipments;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000007_create_shipment_status_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create append-only shipment_status_logs table
            manager
                .create_table(
                    Table::create()
                        .table(ShipmentStatusLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentStatusLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentStatusLogs::ShipmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentStatusLogs::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentStatusLogs::Description)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentStatusLogs::ActorId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentStatusLogs::RecordedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_status_logs_shipment_id")
                                .from(ShipmentStatusLogs::Table, ShipmentStatusLogs::ShipmentId)
                                .to(Shipments::Table, Shipments::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_status_logs_shipment_id")
                        .table(ShipmentStatusLogs::Table)
                        .col(ShipmentStatusLogs::ShipmentId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Drop shipment_status_logs table
            manager
                .drop_table(Table::drop().table(ShipmentStatusLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ShipmentStatusLogs {
        Table,
        Id,
        ShipmentId,
        Status,
        Description,
        ActorId,
        RecordedAt,
    }
}

mod m20240115_000008_create_shipment_packages_table {
    use sea_orm_migration::prelude::*;

    use super::m20240115_000004_create_packages_table::Packages;
    use super::m20240115_000006_create_shipments_table::Shipments;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000008_create_shipment_packages_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create shipment_packages join table
            manager
                .create_table(
                    Table::create()
                        .table(ShipmentPackages::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentPackages::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentPackages::ShipmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentPackages::PackageId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentPackages::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_packages_shipment_id")
                                .from(ShipmentPackages::Table, ShipmentPackages::ShipmentId)
                                .to(Shipments::Table, Shipments::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_packages_package_id")
                                .from(ShipmentPackages::Table, ShipmentPackages::PackageId)
                                .to(Packages::Table, Packages::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_packages_shipment_package")
                        .table(ShipmentPackages::Table)
                        .col(ShipmentPackages::ShipmentId)
                        .col(ShipmentPackages::PackageId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_packages_package_id")
                        .table(ShipmentPackages::Table)
                        .col(ShipmentPackages::PackageId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Drop shipment_packages table
            manager
                .drop_table(Table::drop().table(ShipmentPackages::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ShipmentPackages {
        Table,
        Id,
        ShipmentId,
        PackageId,
        CreatedAt,
    }
}

mod m20240115_000009_create_manifests_table {
    use sea_orm_migration::prelude::*;

    use super::m20240115_000001_create_warehouses_table::Warehouses;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000009_create_manifests_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create manifests table
            manager
                .create_table(
                    Table::create()
                        .table(Manifests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Manifests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Manifests::FileName).string().not_null())
                        .col(ColumnDef::new(Manifests::AgentName).string().not_null())
                        .col(ColumnDef::new(Manifests::Origin).string().null())
                        .col(ColumnDef::new(Manifests::ShippingMode).string().not_null())
                        .col(ColumnDef::new(Manifests::WarehouseId).uuid().not_null())
                        .col(
                            ColumnDef::new(Manifests::RowCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Manifests::BlockedRowCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Manifests::Status).string().not_null())
                        .col(ColumnDef::new(Manifests::ShipmentId).uuid().null())
                        .col(ColumnDef::new(Manifests::UploadedBy).uuid().null())
                        .col(ColumnDef::new(Manifests::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Manifests::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manifests_warehouse_id")
                                .from(Manifests::Table, Manifests::WarehouseId)
                                .to(Warehouses::Table, Warehouses::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_manifests_status")
                        .table(Manifests::Table)
                        .col(Manifests::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_manifests_warehouse_id")
                        .table(Manifests::Table)
                        .col(Manifests::WarehouseId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Drop manifests table
            manager
                .drop_table(Table::drop().table(Manifests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Manifests {
        Table,
        Id,
        FileName,
        AgentName,
        Origin,
        ShippingMode,
        WarehouseId,
        RowCount,
        BlockedRowCount,
        Status,
        ShipmentId,
        UploadedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240115_000010_create_manifest_rows_table {
    use sea_orm_migration::prelude::*;

    use super::m20240115_000009_create_manifests_table::Manifests;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000010_create_manifest_rows_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create manifest_rows table holding raw row payloads
            manager
                .create_table(
                    Table::create()
                        .table(ManifestRows::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ManifestRows::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ManifestRows::ManifestId).uuid().not_null())
                        .col(
                            ColumnDef::new(ManifestRows::RowNumber)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManifestRows::TrackingNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ManifestRows::Payload).text().not_null())
                        .col(ColumnDef::new(ManifestRows::ValidationErrors).text().null())
                        .col(
                            ColumnDef::new(ManifestRows::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manifest_rows_manifest_id")
                                .from(ManifestRows::Table, ManifestRows::ManifestId)
                                .to(Manifests::Table, Manifests::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_manifest_rows_manifest_row")
                        .table(ManifestRows::Table)
                        .col(ManifestRows::ManifestId)
                        .col(ManifestRows::RowNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Drop manifest_rows table
            manager
                .drop_table(Table::drop().table(ManifestRows::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ManifestRows {
        Table,
        Id,
        ManifestId,
        RowNumber,
        TrackingNumber,
        Payload,
        ValidationErrors,
        CreatedAt,
    }
}

mod m20240115_000011_create_service_areas_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000011_create_service_areas_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create service_areas table
            manager
                .create_table(
                    Table::create()
                        .table(ServiceAreas::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ServiceAreas::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ServiceAreas::Province).string().not_null())
                        .col(ColumnDef::new(ServiceAreas::City).string().not_null())
                        .col(ColumnDef::new(ServiceAreas::Barangay).string().not_null())
                        .col(
                            ColumnDef::new(ServiceAreas::Slug)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ServiceAreas::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ServiceAreas::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Drop service_areas table
            manager
                .drop_table(Table::drop().table(ServiceAreas::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ServiceAreas {
        Table,
        Id,
        Province,
        City,
        Barangay,
        Slug,
        IsActive,
        CreatedAt,
    }
}

// Database migration CLI runner
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    let result = Migrator::up(&db, None).await;

    match result {
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
