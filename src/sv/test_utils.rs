//! Shared test utilities: in-memory database, fixtures and a scripted
//! payout provider.

use std::{collections::HashSet, sync::Mutex};

use async_trait::async_trait;

use crate::{
  prelude::*,
  sv::payout::{Payouts, TransferRequest},
};

pub mod test_db {
  use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema};

  use crate::entity::*;

  /// Creates an in-memory SQLite database with all required tables
  pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let schema = Schema::new(DbBackend::Sqlite);

    let stmt = schema.create_table_from_entity(user::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(affiliate::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(commission::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(pool::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(pool_contribution::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    db.execute_unprepared(
      "CREATE UNIQUE INDEX idx_pools_single_active ON pools (status) \
       WHERE status = 'active'",
    )
    .await
    .unwrap();

    db
  }
}

pub mod seed {
  use super::*;
  use crate::{
    entity::{affiliate, user},
    sv::commission::PurchaseEvent,
  };

  pub async fn user(db: &DatabaseConnection, id: Uuid) -> user::Model {
    user::ActiveModel {
      id: Set(id),
      email: Set(Some(format!("{id}@example.com"))),
      referred_by: Set(None),
      affiliate_opted_out: Set(false),
      created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .unwrap()
  }

  /// Enrolled affiliate with payout account `acct_<code>`, payouts enabled.
  pub async fn affiliate(
    db: &DatabaseConnection,
    code: &str,
    track: &str,
    referred_by: Option<Uuid>,
  ) -> affiliate::Model {
    let id = Uuid::new_v4();
    user(db, id).await;

    affiliate::ActiveModel {
      id: Set(id),
      referral_code: Set(code.to_string()),
      track: Set(track.to_string()),
      payout_account_id: Set(Some(format!("acct_{code}"))),
      payouts_enabled: Set(true),
      referred_by_id: Set(referred_by),
      total_earnings_cents: Set(0),
      referral_count: Set(0),
      enrolled_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .unwrap()
  }

  pub async fn set_upline(
    db: &DatabaseConnection,
    model: &affiliate::Model,
    upline: Uuid,
  ) {
    affiliate::ActiveModel {
      referred_by_id: Set(Some(upline)),
      ..model.clone().into()
    }
    .update(db)
    .await
    .unwrap();
  }

  pub async fn reload(db: &DatabaseConnection, id: Uuid) -> affiliate::Model {
    affiliate::Entity::find_by_id(id).one(db).await.unwrap().unwrap()
  }

  /// A $7 sale.
  pub fn purchase(code: Option<&str>) -> PurchaseEvent {
    PurchaseEvent {
      purchaser_id: Uuid::new_v4(),
      purchaser_email: Some("buyer@example.com".into()),
      referral_code: code.map(Into::into),
      sale_id: format!("cs_test_{}", Uuid::new_v4().simple()),
      payment_reference: Some("pi_test".into()),
      amount_cents: 700,
      product_slug: "quantum-initiation".into(),
    }
  }
}

/// Payout provider double. Everyone is eligible and every transfer succeeds
/// unless configured otherwise.
#[derive(Default)]
pub struct FakePayouts {
  ineligible: HashSet<Uuid>,
  broken_eligibility: HashSet<Uuid>,
  failing_accounts: HashSet<String>,
  checks: Mutex<Vec<Uuid>>,
  sent: Mutex<Vec<TransferRequest>>,
}

impl FakePayouts {
  pub fn ineligible(mut self, affiliate_id: Uuid) -> Self {
    self.ineligible.insert(affiliate_id);
    self
  }

  pub fn broken_eligibility(mut self, affiliate_id: Uuid) -> Self {
    self.broken_eligibility.insert(affiliate_id);
    self
  }

  pub fn failing(mut self, account: &str) -> Self {
    self.failing_accounts.insert(account.to_string());
    self
  }

  pub fn transfers(&self) -> Vec<TransferRequest> {
    self.sent.lock().unwrap().clone()
  }

  pub fn eligibility_checks(&self) -> Vec<Uuid> {
    self.checks.lock().unwrap().clone()
  }
}

#[async_trait]
impl Payouts for FakePayouts {
  async fn is_payout_eligible(&self, affiliate_id: Uuid) -> Result<bool> {
    self.checks.lock().unwrap().push(affiliate_id);
    if self.broken_eligibility.contains(&affiliate_id) {
      return Err(Error::Stripe("connection reset".into()));
    }
    Ok(!self.ineligible.contains(&affiliate_id))
  }

  async fn execute_transfer(&self, request: &TransferRequest) -> Result<String> {
    if self.failing_accounts.contains(&request.destination) {
      return Err(Error::Stripe(format!(
        "No such destination: {}",
        request.destination
      )));
    }
    let mut sent = self.sent.lock().unwrap();
    sent.push(request.clone());
    Ok(format!("tr_test_{}", sent.len()))
  }
}
