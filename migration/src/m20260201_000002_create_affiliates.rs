use sea_orm_migration::prelude::*;

use super::m20260201_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Affiliates::Table)
          .if_not_exists()
          .col(ColumnDef::new(Affiliates::Id).uuid().not_null().primary_key())
          .col(
            ColumnDef::new(Affiliates::ReferralCode)
              .string()
              .not_null()
              .unique_key(),
          )
          .col(
            ColumnDef::new(Affiliates::Track)
              .string()
              .not_null()
              .default("community_builder"),
          )
          .col(ColumnDef::new(Affiliates::PayoutAccountId).string().null())
          .col(
            ColumnDef::new(Affiliates::PayoutsEnabled)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(Affiliates::ReferredById).uuid().null())
          .col(
            ColumnDef::new(Affiliates::TotalEarningsCents)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Affiliates::ReferralCount)
              .integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Affiliates::EnrolledAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_affiliates_user")
              .from(Affiliates::Table, Affiliates::Id)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_affiliates_referred_by")
          .table(Affiliates::Table)
          .col(Affiliates::ReferredById)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Affiliates::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum Affiliates {
  Table,
  Id,
  ReferralCode,
  Track,
  PayoutAccountId,
  PayoutsEnabled,
  ReferredById,
  TotalEarningsCents,
  ReferralCount,
  EnrolledAt,
}
