//! Payout executor: one independent transfer attempt per referrer slot.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::{
  prelude::*,
  sv::{directory::Chain, directory::Referrer, split::Split},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
  pub destination: String,
  pub amount_cents: i64,
  pub description: String,
  /// Groups all transfers that belong to one sale.
  pub group: String,
}

/// External payout provider.
#[async_trait]
pub trait Payouts: Send + Sync {
  /// Whether the affiliate's payout account may currently receive funds.
  async fn is_payout_eligible(&self, affiliate_id: Uuid) -> Result<bool>;

  /// Move money and return the provider's transfer id.
  async fn execute_transfer(&self, request: &TransferRequest) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
  Direct,
  Override,
}

impl fmt::Display for Slot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Slot::Direct => f.write_str("direct"),
      Slot::Override => f.write_str("override"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
  NoReferrer,
  ZeroAmount,
  NoDestination,
}

/// What happened to one slot. Only `Transferred` carries money; the
/// commission of an `Ineligible` or `Failed` slot is deferred, not lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SlotOutcome {
  Transferred(String),
  Skipped(SkipReason),
  Ineligible,
  Failed(String),
}

impl SlotOutcome {
  pub fn transfer_id(&self) -> Option<&str> {
    match self {
      SlotOutcome::Transferred(id) => Some(id),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfers {
  pub direct_slot: SlotOutcome,
  pub override_slot: SlotOutcome,
}

pub struct Payout<'a> {
  payouts: &'a dyn Payouts,
}

impl<'a> Payout<'a> {
  pub fn new(payouts: &'a dyn Payouts) -> Self {
    Self { payouts }
  }

  /// Attempt both transfers. The slots pay disjoint accounts, so they run
  /// concurrently and neither outcome affects the other.
  pub async fn execute(
    &self,
    chain: &Chain,
    split: &Split,
    group: &str,
    transaction_id: Uuid,
  ) -> Transfers {
    let short_id = &transaction_id.to_string()[..8];

    let direct = self.pay_slot(
      Slot::Direct,
      chain.direct_referrer.as_ref(),
      split.direct_commission_cents,
      format!("Direct referral commission - Transaction {short_id}"),
      group,
      transaction_id,
    );
    let upline = self.pay_slot(
      Slot::Override,
      chain.override_referrer.as_ref(),
      split.override_commission_cents,
      format!("Override commission - Transaction {short_id}"),
      group,
      transaction_id,
    );

    let (direct_slot, override_slot) = futures::join!(direct, upline);
    Transfers { direct_slot, override_slot }
  }

  async fn pay_slot(
    &self,
    slot: Slot,
    referrer: Option<&Referrer>,
    amount_cents: i64,
    description: String,
    group: &str,
    transaction_id: Uuid,
  ) -> SlotOutcome {
    let Some(referrer) = referrer else {
      return SlotOutcome::Skipped(SkipReason::NoReferrer);
    };
    if amount_cents <= 0 {
      return SlotOutcome::Skipped(SkipReason::ZeroAmount);
    }
    let Some(destination) = referrer.payout_account_id.as_deref() else {
      debug!(%slot, affiliate_id = %referrer.id, "No payout account on file");
      return SlotOutcome::Skipped(SkipReason::NoDestination);
    };

    match self.payouts.is_payout_eligible(referrer.id).await {
      Ok(true) => {}
      Ok(false) => {
        info!(
          %slot,
          %transaction_id,
          affiliate_id = %referrer.id,
          "Referrer cannot receive payouts yet, commission held"
        );
        return SlotOutcome::Ineligible;
      }
      Err(err) => {
        error!(
          %slot,
          %transaction_id,
          affiliate_id = %referrer.id,
          %err,
          "Payout eligibility check failed"
        );
        return SlotOutcome::Failed(err.to_string());
      }
    }

    let request = TransferRequest {
      destination: destination.to_string(),
      amount_cents,
      description,
      group: group.to_string(),
    };

    match self.payouts.execute_transfer(&request).await {
      Ok(transfer_id) => {
        info!(%slot, %transaction_id, %transfer_id, "Transfer created");
        SlotOutcome::Transferred(transfer_id)
      }
      Err(err) => {
        error!(
          %slot,
          %transaction_id,
          affiliate_id = %referrer.id,
          amount_cents,
          %err,
          "Transfer failed"
        );
        SlotOutcome::Failed(err.to_string())
      }
    }
  }
}
