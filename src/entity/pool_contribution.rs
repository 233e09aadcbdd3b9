use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::pool;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pool_contributions")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub pool_id: i32,
  pub contributor_id: Uuid,
  pub transaction_id: Uuid,
  pub amount_cents: i64,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "pool::Entity",
    from = "Column::PoolId",
    to = "pool::Column::Id"
  )]
  Pool,
}

impl Related<pool::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Pool.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
