use sea_orm_migration::prelude::*;

use super::m20260201_000003_create_affiliate_transactions::AffiliateTransactions;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Pools::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Pools::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(Pools::Status)
              .string()
              .not_null()
              .default("active"),
          )
          .col(
            ColumnDef::new(Pools::TotalCents)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Pools::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(PoolContributions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(PoolContributions::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(PoolContributions::PoolId).integer().not_null())
          .col(
            ColumnDef::new(PoolContributions::ContributorId).uuid().not_null(),
          )
          .col(
            ColumnDef::new(PoolContributions::TransactionId).uuid().not_null(),
          )
          .col(
            ColumnDef::new(PoolContributions::AmountCents)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(PoolContributions::CreatedAt).date_time().not_null(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_pool_contributions_pool")
              .from(PoolContributions::Table, PoolContributions::PoolId)
              .to(Pools::Table, Pools::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_pool_contributions_transaction")
              .from(PoolContributions::Table, PoolContributions::TransactionId)
              .to(AffiliateTransactions::Table, AffiliateTransactions::Id),
          )
          .to_owned(),
      )
      .await?;

    // At most one active pool; opening a second one is a conflict.
    manager
      .get_connection()
      .execute_unprepared(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_pools_single_active \
         ON pools (status) WHERE status = 'active'",
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_pool_contributions_contributor")
          .table(PoolContributions::Table)
          .col(PoolContributions::ContributorId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(PoolContributions::Table).to_owned())
      .await?;

    manager.drop_table(Table::drop().table(Pools::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Pools {
  Table,
  Id,
  Status,
  TotalCents,
  CreatedAt,
}

#[derive(DeriveIden)]
pub enum PoolContributions {
  Table,
  Id,
  PoolId,
  ContributorId,
  TransactionId,
  AmountCents,
  CreatedAt,
}
