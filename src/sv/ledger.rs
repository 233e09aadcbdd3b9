//! Commission transaction store: the durable `processing` record written
//! before money moves, and the bookkeeping applied after transfers.
//!
//! Earnings are credited from the *computed* commission whether or not the
//! matching transfer went through, so `total_earnings_cents` can run ahead
//! of what an affiliate actually received. This is inherited behaviour;
//! reconciling it against transfer ids is left to an external job.

use sea_orm::{
  Condition, NotSet,
  sea_query::{Expr, OnConflict},
};
use serde::Serialize;

use crate::{
  entity::{
    CommissionStatus, PoolStatus, affiliate, commission, pool,
    pool_contribution,
  },
  prelude::*,
  sv::{
    commission::PurchaseEvent, directory::Chain, payout::Transfers,
    split::Split,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStep {
  Settle,
  DirectEarnings,
  OverrideEarnings,
  PoolContribution,
  ReferralCount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerFailure {
  pub step: LedgerStep,
  pub error: String,
}

pub struct Ledger<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Ledger<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Insert the commission row in `processing` state.
  pub async fn record(
    &self,
    event: &PurchaseEvent,
    direct_referrer_id: Uuid,
    override_referrer_id: Option<Uuid>,
    split: &Split,
  ) -> Result<Uuid> {
    let now = Utc::now().naive_utc();
    let id = Uuid::new_v4();

    commission::ActiveModel {
      id: Set(id),
      purchaser_id: Set(event.purchaser_id),
      product_slug: Set(event.product_slug.clone()),
      sale_id: Set(event.sale_id.clone()),
      payment_reference: Set(event.payment_reference.clone()),
      amount_cents: Set(event.amount_cents),
      direct_referrer_id: Set(direct_referrer_id),
      override_referrer_id: Set(override_referrer_id),
      direct_commission_cents: Set(split.direct_commission_cents),
      override_commission_cents: Set(split.override_commission_cents),
      pool_contribution_cents: Set(split.pool_contribution_cents),
      platform_fee_cents: Set(split.platform_fee_cents),
      direct_track: Set(split.direct_track.clone()),
      direct_transfer_id: Set(None),
      override_transfer_id: Set(None),
      status: Set(CommissionStatus::Processing),
      created_at: Set(now),
      processed_at: Set(None),
    }
    .insert(self.db)
    .await?;

    Ok(id)
  }

  /// Mark a `processing` row as `paid` with whatever transfer ids exist.
  /// A row is settled at most once.
  pub async fn settle(
    &self,
    id: Uuid,
    direct_transfer_id: Option<String>,
    override_transfer_id: Option<String>,
  ) -> Result<()> {
    let now = Utc::now().naive_utc();

    let result = commission::Entity::update_many()
      .set(commission::ActiveModel {
        direct_transfer_id: Set(direct_transfer_id),
        override_transfer_id: Set(override_transfer_id),
        status: Set(CommissionStatus::Paid),
        processed_at: Set(Some(now)),
        ..Default::default()
      })
      .filter(commission::Column::Id.eq(id))
      .filter(commission::Column::Status.eq(CommissionStatus::Processing))
      .exec(self.db)
      .await?;

    if result.rows_affected == 0 {
      return Err(Error::TransactionNotFound);
    }
    Ok(())
  }

  /// Atomically add to an affiliate's running earnings.
  pub async fn credit_earnings(
    &self,
    affiliate_id: Uuid,
    amount_cents: i64,
  ) -> Result<()> {
    self
      .increment(
        affiliate_id,
        affiliate::Column::TotalEarningsCents,
        amount_cents,
      )
      .await
  }

  pub async fn increment_referral_count(
    &self,
    affiliate_id: Uuid,
  ) -> Result<()> {
    self.increment(affiliate_id, affiliate::Column::ReferralCount, 1).await
  }

  // `col = col + n` in SQL, so concurrent sales never lose an update.
  async fn increment(
    &self,
    affiliate_id: Uuid,
    column: affiliate::Column,
    by: i64,
  ) -> Result<()> {
    let result = affiliate::Entity::update_many()
      .col_expr(column, Expr::col(column).add(by))
      .filter(affiliate::Column::Id.eq(affiliate_id))
      .exec(self.db)
      .await?;

    if result.rows_affected == 0 {
      return Err(Error::AffiliateNotFound);
    }
    Ok(())
  }

  /// Add a contribution to the active pool, opening one if none is active.
  ///
  /// The open step is a write, so it takes the database write lock before
  /// the active pool is read, and the single-active-pool unique index turns
  /// a racing second open into a no-op.
  pub async fn contribute_to_pool(
    &self,
    contributor_id: Uuid,
    transaction_id: Uuid,
    amount_cents: i64,
  ) -> Result<pool_contribution::Model> {
    if amount_cents <= 0 {
      return Err(Error::InvalidArgs(
        "Pool contribution must be positive".into(),
      ));
    }

    let now = Utc::now().naive_utc();
    let txn = self.db.begin().await?;

    pool::Entity::insert(pool::ActiveModel {
      id: NotSet,
      status: Set(PoolStatus::Active),
      total_cents: Set(0),
      created_at: Set(now),
    })
    .on_conflict(OnConflict::new().do_nothing().to_owned())
    .exec_without_returning(&txn)
    .await?;

    let pool = pool::Entity::find()
      .filter(pool::Column::Status.eq(PoolStatus::Active))
      .one(&txn)
      .await?
      .ok_or_else(|| Error::Internal("No active pool after open".into()))?;

    pool::Entity::update_many()
      .col_expr(
        pool::Column::TotalCents,
        Expr::col(pool::Column::TotalCents).add(amount_cents),
      )
      .filter(pool::Column::Id.eq(pool.id))
      .exec(&txn)
      .await?;

    let contribution = pool_contribution::ActiveModel {
      id: NotSet,
      pool_id: Set(pool.id),
      contributor_id: Set(contributor_id),
      transaction_id: Set(transaction_id),
      amount_cents: Set(amount_cents),
      created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(contribution)
  }

  /// Post-transfer bookkeeping. Every step runs regardless of the others;
  /// the failed ones are returned.
  pub async fn apply(
    &self,
    transaction_id: Uuid,
    chain: &Chain,
    split: &Split,
    transfers: &Transfers,
  ) -> Vec<LedgerFailure> {
    let mut failures = Vec::new();
    let mut check = |step: LedgerStep, result: Result<()>| {
      if let Err(err) = result {
        error!(%transaction_id, ?step, %err, "Ledger update failed");
        failures.push(LedgerFailure { step, error: err.to_string() });
      }
    };

    check(
      LedgerStep::Settle,
      self
        .settle(
          transaction_id,
          transfers.direct_slot.transfer_id().map(Into::into),
          transfers.override_slot.transfer_id().map(Into::into),
        )
        .await,
    );

    if let Some(direct) = &chain.direct_referrer
      && split.direct_commission_cents > 0
    {
      check(
        LedgerStep::DirectEarnings,
        self.credit_earnings(direct.id, split.direct_commission_cents).await,
      );
    }

    if let Some(upline) = &chain.override_referrer
      && split.override_commission_cents > 0
    {
      check(
        LedgerStep::OverrideEarnings,
        self.credit_earnings(upline.id, split.override_commission_cents).await,
      );
    }

    if let Some(direct) = &chain.direct_referrer {
      if split.pool_contribution_cents > 0 {
        check(
          LedgerStep::PoolContribution,
          self
            .contribute_to_pool(
              direct.id,
              transaction_id,
              split.pool_contribution_cents,
            )
            .await
            .map(|_| ()),
        );
      }

      check(
        LedgerStep::ReferralCount,
        self.increment_referral_count(direct.id).await,
      );
    }

    failures
  }

  /// Rows still `processing` that were created before `cutoff`.
  pub async fn stale(
    &self,
    cutoff: DateTime,
  ) -> Result<Vec<commission::Model>> {
    Ok(
      commission::Entity::find()
        .filter(
          Condition::all()
            .add(commission::Column::Status.eq(CommissionStatus::Processing))
            .add(commission::Column::CreatedAt.lt(cutoff)),
        )
        .order_by_asc(commission::Column::CreatedAt)
        .all(self.db)
        .await?,
    )
  }
}
