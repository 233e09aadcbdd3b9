use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::affiliate;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub email: Option<String>,
  /// First-touch referrer, kept until the user enrolls as an affiliate.
  pub referred_by: Option<Uuid>,
  /// Declined the affiliate program. Cleared again on enrollment.
  pub affiliate_opted_out: bool,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_one = "affiliate::Entity")]
  Affiliate,
}

impl Related<affiliate::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Affiliate.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
