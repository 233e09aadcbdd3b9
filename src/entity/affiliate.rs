use std::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::user;

/// Commission tier chosen by an affiliate.
///
/// Stored as free text in `affiliates.track` so that a bad value written by
/// another tool degrades to a zero payout instead of failing the row load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
  CommunityBuilder,
  HighPerformer,
  Independent,
}

impl Track {
  pub const ALL: [Track; 3] =
    [Track::CommunityBuilder, Track::HighPerformer, Track::Independent];

  pub fn as_str(self) -> &'static str {
    match self {
      Track::CommunityBuilder => "community_builder",
      Track::HighPerformer => "high_performer",
      Track::Independent => "independent",
    }
  }

  pub fn parse(raw: &str) -> Option<Track> {
    Track::ALL.into_iter().find(|track| track.as_str() == raw)
  }
}

impl fmt::Display for Track {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "affiliates")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  #[sea_orm(unique)]
  pub referral_code: String,
  pub track: String,
  pub payout_account_id: Option<String>,
  pub payouts_enabled: bool,
  pub referred_by_id: Option<Uuid>,
  pub total_earnings_cents: i64,
  pub referral_count: i32,
  pub enrolled_at: DateTime,
}

impl Model {
  pub fn track(&self) -> Option<Track> {
    Track::parse(&self.track)
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::Id",
    to = "user::Column::Id"
  )]
  User,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
