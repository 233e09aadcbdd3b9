//! Commission pipeline for a single purchase event:
//! resolve chain, calculate split, record, pay out, update the ledger.
//!
//! Only the record step can abort the pipeline. Everything after it
//! degrades per step and is reported in [`CommissionReport`].

use serde::{Deserialize, Serialize};

use crate::{
  prelude::*,
  sv::{
    directory::Directory,
    ledger::{Ledger, LedgerFailure},
    payout::{Payout, Payouts, Transfers},
    split::Split,
  },
};

/// Largest sale accepted. Keeps the running earnings and pool totals far
/// from `i64` overflow.
pub const MAX_SALE_CENTS: i64 = 10_000_000_000;

/// A purchase that already cleared checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseEvent {
  pub purchaser_id: Uuid,
  #[serde(default)]
  pub purchaser_email: Option<String>,
  #[serde(default)]
  pub referral_code: Option<String>,
  /// Checkout identifier, also used to group the sale's transfers.
  pub sale_id: String,
  #[serde(default)]
  pub payment_reference: Option<String>,
  pub amount_cents: i64,
  pub product_slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommissionReport {
  pub transaction_id: Uuid,
  pub direct_referrer_id: Uuid,
  pub override_referrer_id: Option<Uuid>,
  pub split: Split,
  pub transfers: Transfers,
  pub degraded: Vec<LedgerFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
  Unattributed,
  Processed(CommissionReport),
}

pub struct Commissions<'a> {
  db: &'a DatabaseConnection,
  payouts: &'a dyn Payouts,
}

impl<'a> Commissions<'a> {
  pub fn new(db: &'a DatabaseConnection, payouts: &'a dyn Payouts) -> Self {
    Self { db, payouts }
  }

  /// Run the pipeline. Returns `Err` only when the event is malformed or
  /// the commission row could not be written; in both cases no transfer
  /// has been attempted.
  pub async fn run(&self, event: &PurchaseEvent) -> Result<Outcome> {
    if event.amount_cents <= 0 {
      return Err(Error::InvalidArgs(format!(
        "Sale amount must be positive, got {}",
        event.amount_cents
      )));
    }
    if event.amount_cents > MAX_SALE_CENTS {
      return Err(Error::InvalidArgs(format!(
        "Sale amount {} exceeds the {} cent limit",
        event.amount_cents, MAX_SALE_CENTS
      )));
    }

    let chain = Directory::new(self.db)
      .resolve_chain(event.referral_code.as_deref())
      .await;

    let Some(direct) = chain.direct_referrer.as_ref() else {
      debug!(sale_id = %event.sale_id, "Unattributed sale, no commission");
      return Ok(Outcome::Unattributed);
    };
    let override_referrer_id = chain.override_referrer.as_ref().map(|r| r.id);

    let split = Split::calculate(
      event.amount_cents,
      &direct.track,
      override_referrer_id.is_some(),
    );

    let ledger = Ledger::new(self.db);
    let transaction_id = ledger
      .record(event, direct.id, override_referrer_id, &split)
      .await?;

    let transfers = Payout::new(self.payouts)
      .execute(&chain, &split, &event.sale_id, transaction_id)
      .await;

    let degraded = ledger.apply(transaction_id, &chain, &split, &transfers).await;

    info!(
      %transaction_id,
      direct_commission = split.direct_commission_cents,
      override_commission = split.override_commission_cents,
      pool_contribution = split.pool_contribution_cents,
      degraded = degraded.len(),
      "Commission processing complete"
    );

    Ok(Outcome::Processed(CommissionReport {
      transaction_id,
      direct_referrer_id: direct.id,
      override_referrer_id,
      split,
      transfers,
      degraded,
    }))
  }

  /// Entry point for purchase flows: never fails, so a commission problem
  /// can not break the customer's purchase. Failures end up in the log.
  pub async fn process_commission(
    &self,
    event: &PurchaseEvent,
  ) -> Option<CommissionReport> {
    match self.run(event).await {
      Ok(Outcome::Processed(report)) => Some(report),
      Ok(Outcome::Unattributed) => None,
      Err(err) => {
        error!(
          sale_id = %event.sale_id,
          purchaser_id = %event.purchaser_id,
          %err,
          "Commission processing aborted"
        );
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use sea_orm::ConnectionTrait;

  use super::*;
  use crate::{
    entity::{CommissionStatus, commission, pool_contribution},
    sv::{
      ledger::LedgerStep,
      payout::SlotOutcome,
      test_utils::{FakePayouts, seed, test_db},
    },
  };

  async fn transaction_count(db: &DatabaseConnection) -> u64 {
    commission::Entity::find().count(db).await.unwrap()
  }

  #[tokio::test]
  async fn test_end_to_end_high_performer_with_override() {
    let db = test_db::setup().await;
    let a = seed::affiliate(&db, "AAAA", "community_builder", None).await;
    let b = seed::affiliate(&db, "BBBB", "high_performer", Some(a.id)).await;
    let payouts = FakePayouts::default();

    let event = seed::purchase(Some("BBBB"));
    let report = Commissions::new(&db, &payouts)
      .process_commission(&event)
      .await
      .unwrap();

    assert_eq!(report.direct_referrer_id, b.id);
    assert_eq!(report.override_referrer_id, Some(a.id));
    assert_eq!(report.split.direct_commission_cents, 280);
    assert_eq!(report.split.override_commission_cents, 70);
    assert_eq!(report.split.pool_contribution_cents, 210);
    assert_eq!(report.split.platform_fee_cents, 140);
    assert!(report.degraded.is_empty());

    let row = commission::Entity::find_by_id(report.transaction_id)
      .one(&db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(row.status, CommissionStatus::Paid);
    assert_eq!(row.purchaser_id, event.purchaser_id);
    assert_eq!(row.product_slug, event.product_slug);
    assert!(row.direct_transfer_id.is_some());
    assert!(row.override_transfer_id.is_some());

    let b = seed::reload(&db, b.id).await;
    let a = seed::reload(&db, a.id).await;
    assert_eq!(b.total_earnings_cents, 280);
    assert_eq!(b.referral_count, 1);
    assert_eq!(a.total_earnings_cents, 70);
    assert_eq!(a.referral_count, 0);

    let contributions = pool_contribution::Entity::find().all(&db).await.unwrap();
    assert_eq!(contributions.len(), 1);
    assert_eq!(contributions[0].contributor_id, b.id);
    assert_eq!(contributions[0].amount_cents, 210);
  }

  #[tokio::test]
  async fn test_third_level_ancestor_is_never_paid() {
    let db = test_db::setup().await;
    let a = seed::affiliate(&db, "AAAA", "community_builder", None).await;
    let b = seed::affiliate(&db, "BBBB", "community_builder", Some(a.id)).await;
    let c = seed::affiliate(&db, "CCCC", "high_performer", Some(b.id)).await;
    let payouts = FakePayouts::default();

    let report = Commissions::new(&db, &payouts)
      .process_commission(&seed::purchase(Some("CCCC")))
      .await
      .unwrap();

    assert_eq!(report.direct_referrer_id, c.id);
    assert_eq!(report.override_referrer_id, Some(b.id));

    let sent = payouts.transfers();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|t| t.destination != "acct_AAAA"));

    let a = seed::reload(&db, a.id).await;
    assert_eq!(a.total_earnings_cents, 0);
    assert_eq!(seed::reload(&db, b.id).await.total_earnings_cents, 70);
    assert_eq!(seed::reload(&db, c.id).await.total_earnings_cents, 280);
  }

  #[tokio::test]
  async fn test_direct_transfer_failure_is_isolated() {
    let db = test_db::setup().await;
    let a = seed::affiliate(&db, "AAAA", "community_builder", None).await;
    let b = seed::affiliate(&db, "BBBB", "high_performer", Some(a.id)).await;
    let payouts = FakePayouts::default().failing("acct_BBBB");

    let report = Commissions::new(&db, &payouts)
      .process_commission(&seed::purchase(Some("BBBB")))
      .await
      .unwrap();

    assert!(matches!(report.transfers.direct_slot, SlotOutcome::Failed(_)));
    assert!(report.degraded.is_empty());

    let row = commission::Entity::find_by_id(report.transaction_id)
      .one(&db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(row.status, CommissionStatus::Paid);
    assert!(row.direct_transfer_id.is_none());
    assert_eq!(
      row.override_transfer_id.as_deref(),
      report.transfers.override_slot.transfer_id()
    );
    assert!(row.override_transfer_id.is_some());

    // Earnings follow the computed split, not the transfer result.
    assert_eq!(seed::reload(&db, b.id).await.total_earnings_cents, 280);
    assert_eq!(seed::reload(&db, a.id).await.total_earnings_cents, 70);
  }

  #[tokio::test]
  async fn test_unattributed_sale_writes_nothing() {
    let db = test_db::setup().await;
    seed::affiliate(&db, "BBBB", "high_performer", None).await;
    let payouts = FakePayouts::default();
    let commissions = Commissions::new(&db, &payouts);

    for code in [None, Some(""), Some("NOPE")] {
      let outcome = commissions.run(&seed::purchase(code)).await.unwrap();
      assert!(matches!(outcome, Outcome::Unattributed));
    }

    assert_eq!(transaction_count(&db).await, 0);
    assert!(payouts.transfers().is_empty());
    assert!(payouts.eligibility_checks().is_empty());
  }

  #[tokio::test]
  async fn test_ineligible_destination_still_settles() {
    let db = test_db::setup().await;
    let b = seed::affiliate(&db, "BBBB", "independent", None).await;
    let payouts = FakePayouts::default().ineligible(b.id);

    let report = Commissions::new(&db, &payouts)
      .process_commission(&seed::purchase(Some("BBBB")))
      .await
      .unwrap();

    assert_eq!(report.transfers.direct_slot, SlotOutcome::Ineligible);
    let row = commission::Entity::find_by_id(report.transaction_id)
      .one(&db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(row.status, CommissionStatus::Paid);
    assert!(row.direct_transfer_id.is_none());
    assert_eq!(row.direct_commission_cents, 420);
    assert_eq!(row.platform_fee_cents, 210);
    assert!(payouts.transfers().is_empty());
  }

  #[tokio::test]
  async fn test_unknown_track_completes_with_zero_commission() {
    let db = test_db::setup().await;
    let b = seed::affiliate(&db, "BBBB", "legacy_gold", None).await;
    let payouts = FakePayouts::default();

    let report = Commissions::new(&db, &payouts)
      .process_commission(&seed::purchase(Some("BBBB")))
      .await
      .unwrap();

    assert_eq!(report.split.direct_commission_cents, 0);
    assert_eq!(report.split.pool_contribution_cents, 0);
    assert!(report.degraded.is_empty());
    assert!(payouts.transfers().is_empty());

    let row = commission::Entity::find_by_id(report.transaction_id)
      .one(&db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(row.direct_track, "legacy_gold");
    assert_eq!(row.status, CommissionStatus::Paid);

    let b = seed::reload(&db, b.id).await;
    assert_eq!(b.total_earnings_cents, 0);
    assert_eq!(b.referral_count, 1);
  }

  #[tokio::test]
  async fn test_settle_failure_leaves_row_processing() {
    let db = test_db::setup().await;
    let a = seed::affiliate(&db, "AAAA", "community_builder", None).await;
    let b = seed::affiliate(&db, "BBBB", "high_performer", Some(a.id)).await;
    db.execute_unprepared(
      "CREATE TRIGGER hold_settlement BEFORE UPDATE ON affiliate_transactions \
       BEGIN SELECT RAISE(ABORT, 'settlement on hold'); END",
    )
    .await
    .unwrap();
    let payouts = FakePayouts::default();

    let report = Commissions::new(&db, &payouts)
      .process_commission(&seed::purchase(Some("BBBB")))
      .await
      .unwrap();

    let steps: Vec<_> = report.degraded.iter().map(|f| f.step).collect();
    assert_eq!(steps, [LedgerStep::Settle]);
    assert!(report.degraded[0].error.contains("settlement on hold"));
    assert_eq!(payouts.transfers().len(), 2);

    let row = commission::Entity::find_by_id(report.transaction_id)
      .one(&db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(row.status, CommissionStatus::Processing);
    assert!(row.direct_transfer_id.is_none());
    assert!(row.processed_at.is_none());

    assert_eq!(seed::reload(&db, b.id).await.total_earnings_cents, 280);
    assert_eq!(seed::reload(&db, b.id).await.referral_count, 1);
    assert_eq!(seed::reload(&db, a.id).await.total_earnings_cents, 70);
  }

  #[tokio::test]
  async fn test_pool_failure_does_not_stop_other_steps() {
    let db = test_db::setup().await;
    let b = seed::affiliate(&db, "BBBB", "community_builder", None).await;
    db.execute_unprepared(
      "CREATE TRIGGER reject_contribution BEFORE INSERT ON pool_contributions \
       BEGIN SELECT RAISE(ABORT, 'pool unavailable'); END",
    )
    .await
    .unwrap();
    let payouts = FakePayouts::default();

    let report = Commissions::new(&db, &payouts)
      .process_commission(&seed::purchase(Some("BBBB")))
      .await
      .unwrap();

    let steps: Vec<_> = report.degraded.iter().map(|f| f.step).collect();
    assert_eq!(steps, [LedgerStep::PoolContribution]);

    let row = commission::Entity::find_by_id(report.transaction_id)
      .one(&db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(row.status, CommissionStatus::Paid);

    let b = seed::reload(&db, b.id).await;
    assert_eq!(b.total_earnings_cents, 210);
    assert_eq!(b.referral_count, 1);
    let contributions = pool_contribution::Entity::find().count(&db).await;
    assert_eq!(contributions.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_record_failure_aborts_before_transfers() {
    let db = test_db::setup().await;
    seed::affiliate(&db, "BBBB", "high_performer", None).await;
    db.execute_unprepared("DROP TABLE pool_contributions").await.unwrap();
    db.execute_unprepared("DROP TABLE affiliate_transactions").await.unwrap();
    let payouts = FakePayouts::default();
    let commissions = Commissions::new(&db, &payouts);
    let event = seed::purchase(Some("BBBB"));

    assert!(matches!(commissions.run(&event).await, Err(Error::Db(_))));
    assert!(commissions.process_commission(&event).await.is_none());
    assert!(payouts.transfers().is_empty());
  }

  #[tokio::test]
  async fn test_rejects_non_positive_amount() {
    let db = test_db::setup().await;
    seed::affiliate(&db, "BBBB", "high_performer", None).await;
    let payouts = FakePayouts::default();

    let mut event = seed::purchase(Some("BBBB"));
    event.amount_cents = 0;
    let result = Commissions::new(&db, &payouts).run(&event).await;

    assert!(matches!(result, Err(Error::InvalidArgs(_))));
    assert_eq!(transaction_count(&db).await, 0);
  }

  #[tokio::test]
  async fn test_rejects_oversized_amount() {
    let db = test_db::setup().await;
    let b = seed::affiliate(&db, "BBBB", "independent", None).await;
    let payouts = FakePayouts::default();
    let commissions = Commissions::new(&db, &payouts);

    let mut event = seed::purchase(Some("BBBB"));
    event.amount_cents = 200_000_000_000_000_000;

    let result = commissions.run(&event).await;
    assert!(matches!(result, Err(Error::InvalidArgs(_))));
    assert!(commissions.process_commission(&event).await.is_none());
    assert_eq!(transaction_count(&db).await, 0);
    assert!(payouts.transfers().is_empty());
    assert_eq!(seed::reload(&db, b.id).await.total_earnings_cents, 0);

    event.amount_cents = MAX_SALE_CENTS;
    assert!(commissions.process_commission(&event).await.is_some());
  }

  #[tokio::test]
  async fn test_replayed_event_is_not_deduplicated() {
    let db = test_db::setup().await;
    let b = seed::affiliate(&db, "BBBB", "high_performer", None).await;
    let payouts = FakePayouts::default();
    let commissions = Commissions::new(&db, &payouts);
    let event = seed::purchase(Some("BBBB"));

    commissions.process_commission(&event).await.unwrap();
    commissions.process_commission(&event).await.unwrap();

    assert_eq!(transaction_count(&db).await, 2);
    assert_eq!(payouts.transfers().len(), 2);
    assert_eq!(seed::reload(&db, b.id).await.total_earnings_cents, 560);
  }
}
