use sea_orm_migration::prelude::*;

use super::m20260201_000002_create_affiliates::Affiliates;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(AffiliateTransactions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(AffiliateTransactions::Id)
              .uuid()
              .not_null()
              .primary_key(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::PurchaserId)
              .uuid()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::ProductSlug)
              .string()
              .not_null(),
          )
          .col(ColumnDef::new(AffiliateTransactions::SaleId).string().not_null())
          .col(
            ColumnDef::new(AffiliateTransactions::PaymentReference)
              .string()
              .null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::AmountCents)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::DirectReferrerId)
              .uuid()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::OverrideReferrerId)
              .uuid()
              .null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::DirectCommissionCents)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::OverrideCommissionCents)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::PoolContributionCents)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::PlatformFeeCents)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::DirectTrack)
              .string()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::DirectTransferId)
              .string()
              .null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::OverrideTransferId)
              .string()
              .null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::Status)
              .string()
              .not_null()
              .default("processing"),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::CreatedAt)
              .date_time()
              .not_null(),
          )
          .col(
            ColumnDef::new(AffiliateTransactions::ProcessedAt)
              .date_time()
              .null(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_affiliate_transactions_direct")
              .from(
                AffiliateTransactions::Table,
                AffiliateTransactions::DirectReferrerId,
              )
              .to(Affiliates::Table, Affiliates::Id),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_affiliate_transactions_direct")
          .table(AffiliateTransactions::Table)
          .col(AffiliateTransactions::DirectReferrerId)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_affiliate_transactions_status")
          .table(AffiliateTransactions::Table)
          .col(AffiliateTransactions::Status)
          .col(AffiliateTransactions::CreatedAt)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(AffiliateTransactions::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum AffiliateTransactions {
  Table,
  Id,
  PurchaserId,
  ProductSlug,
  SaleId,
  PaymentReference,
  AmountCents,
  DirectReferrerId,
  OverrideReferrerId,
  DirectCommissionCents,
  OverrideCommissionCents,
  PoolContributionCents,
  PlatformFeeCents,
  DirectTrack,
  DirectTransferId,
  OverrideTransferId,
  Status,
  CreatedAt,
  ProcessedAt,
}
