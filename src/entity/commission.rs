use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::affiliate;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
  #[sea_orm(string_value = "processing")]
  #[default]
  Processing,
  #[sea_orm(string_value = "paid")]
  Paid,
}

/// One row per attributed sale. Inserted as `processing` before any money
/// moves and updated exactly once when transfer attempts are done.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "affiliate_transactions")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub purchaser_id: Uuid,
  pub product_slug: String,
  pub sale_id: String,
  pub payment_reference: Option<String>,
  pub amount_cents: i64,
  pub direct_referrer_id: Uuid,
  pub override_referrer_id: Option<Uuid>,
  pub direct_commission_cents: i64,
  pub override_commission_cents: i64,
  pub pool_contribution_cents: i64,
  pub platform_fee_cents: i64,
  /// Track of the direct referrer at calculation time, never rewritten.
  pub direct_track: String,
  pub direct_transfer_id: Option<String>,
  pub override_transfer_id: Option<String>,
  pub status: CommissionStatus,
  pub created_at: DateTime,
  pub processed_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "affiliate::Entity",
    from = "Column::DirectReferrerId",
    to = "affiliate::Column::Id"
  )]
  DirectReferrer,
}

impl Related<affiliate::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::DirectReferrer.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
