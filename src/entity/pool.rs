use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::pool_contribution;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
  #[sea_orm(string_value = "active")]
  #[default]
  Active,
  #[sea_orm(string_value = "closed")]
  Closed,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pools")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub status: PoolStatus,
  pub total_cents: i64,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "pool_contribution::Entity")]
  Contributions,
}

impl Related<pool_contribution::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Contributions.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
