use sea_orm::{Condition, sea_query::Expr};
use serde::Serialize;

use crate::{
  entity::{CommissionStatus, commission, pool_contribution},
  prelude::*,
  sv::affiliate::Affiliate,
};

#[derive(Debug, Serialize)]
pub struct AffiliateStats {
  pub referral_code: String,
  pub track: String,
  pub total_earnings_cents: i64,
  pub referral_count: i32,
  pub pool_credits_cents: i64,
  pub processing_transactions: u64,
  pub payouts_enabled: bool,
  pub recent_transactions: Vec<commission::Model>,
}

pub struct Stats<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Stats<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn affiliate(
    &self,
    id: Uuid,
    recent_limit: u64,
  ) -> Result<AffiliateStats> {
    let affiliate = Affiliate::new(self.db).get(id).await?;

    let involved = Condition::any()
      .add(commission::Column::DirectReferrerId.eq(id))
      .add(commission::Column::OverrideReferrerId.eq(id));

    let recent_transactions = commission::Entity::find()
      .filter(involved.clone())
      .order_by_desc(commission::Column::CreatedAt)
      .limit(recent_limit)
      .all(self.db)
      .await?;

    let processing_transactions = commission::Entity::find()
      .filter(involved)
      .filter(commission::Column::Status.eq(CommissionStatus::Processing))
      .count(self.db)
      .await?;

    let pool_credits: Option<Option<i64>> = pool_contribution::Entity::find()
      .select_only()
      .column_as(
        Expr::col(pool_contribution::Column::AmountCents).sum(),
        "credits",
      )
      .filter(pool_contribution::Column::ContributorId.eq(id))
      .into_tuple()
      .one(self.db)
      .await?;

    Ok(AffiliateStats {
      referral_code: affiliate.referral_code,
      track: affiliate.track,
      total_earnings_cents: affiliate.total_earnings_cents,
      referral_count: affiliate.referral_count,
      pool_credits_cents: pool_credits.flatten().unwrap_or(0),
      processing_transactions,
      payouts_enabled: affiliate.payouts_enabled,
      recent_transactions,
    })
  }
}
