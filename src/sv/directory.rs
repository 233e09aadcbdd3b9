//! Referral directory: read-only lookups over `affiliates` and resolution of
//! the two-level referral chain for a sale.

use serde::Serialize;

use crate::{entity::affiliate, prelude::*};

/// An affiliate as seen by the commission pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Referrer {
  pub id: Uuid,
  pub track: String,
  pub payout_account_id: Option<String>,
}

impl From<affiliate::Model> for Referrer {
  fn from(model: affiliate::Model) -> Self {
    Self {
      id: model.id,
      track: model.track,
      payout_account_id: model.payout_account_id,
    }
  }
}

/// Who gets paid for a sale. Never deeper than two levels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Chain {
  pub direct_referrer: Option<Referrer>,
  pub override_referrer: Option<Referrer>,
}

impl Chain {
  pub fn unattributed() -> Self {
    Self::default()
  }
}

pub struct Directory<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Directory<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn by_code(&self, code: &str) -> Result<Option<affiliate::Model>> {
    Ok(
      affiliate::Entity::find()
        .filter(affiliate::Column::ReferralCode.eq(code))
        .one(self.db)
        .await?,
    )
  }

  pub async fn by_id(&self, id: Uuid) -> Result<Option<affiliate::Model>> {
    Ok(affiliate::Entity::find_by_id(id).one(self.db).await?)
  }

  /// Resolve the direct referrer behind `code` and the affiliate who
  /// referred them. Lookup failures degrade instead of erroring: a broken
  /// direct lookup yields an unattributed chain, a broken override lookup
  /// only drops the override.
  pub async fn resolve_chain(&self, code: Option<&str>) -> Chain {
    let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
      return Chain::unattributed();
    };

    let direct = match self.by_code(code).await {
      Ok(Some(direct)) => direct,
      Ok(None) => {
        debug!(code, "Referral code does not resolve to an affiliate");
        return Chain::unattributed();
      }
      Err(err) => {
        error!(code, %err, "Failed to look up referral code");
        return Chain::unattributed();
      }
    };

    let override_referrer = match direct.referred_by_id {
      Some(upline_id) => match self.by_id(upline_id).await {
        Ok(found) => found.map(Referrer::from),
        Err(err) => {
          error!(
            affiliate_id = %direct.id,
            %upline_id,
            %err,
            "Failed to look up override referrer"
          );
          None
        }
      },
      None => None,
    };

    Chain { direct_referrer: Some(direct.into()), override_referrer }
  }
}
