//! Referral linking: remember who referred a purchaser so that, once the
//! purchaser enrolls, their sales pay an override to that referrer.

use crate::{
  entity::affiliate,
  prelude::*,
  sv::{directory::Directory, user::User},
};

pub struct Referral<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Referral<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Link `purchaser_id` to the owner of `code`. Returns the purchaser's
  /// effective referrer, or `None` when the code does not resolve or
  /// belongs to the purchaser.
  ///
  /// First touch wins: a later code never overwrites an existing link, so
  /// repeat purchases through other codes do not move the purchaser (or
  /// their future override) to a different upline. This deliberately
  /// departs from last-touch linking, which rewrites the referrer on every
  /// purchase.
  pub async fn link_purchaser(
    &self,
    purchaser_id: Uuid,
    code: &str,
  ) -> Result<Option<Uuid>> {
    let directory = Directory::new(self.db);

    let Some(referrer) = directory.by_code(code.trim()).await? else {
      debug!(code, "Referral code not found, skipping linking");
      return Ok(None);
    };

    if referrer.id == purchaser_id {
      debug!(%purchaser_id, "Ignoring self referral");
      return Ok(None);
    }

    let users = User::new(self.db);
    let user = users.get_or_create(purchaser_id, None).await?;
    let referrer_id = match user.referred_by {
      Some(first_touch) => first_touch,
      None => {
        users.set_referred_by(purchaser_id, referrer.id).await?;
        info!(%purchaser_id, referrer_id = %referrer.id, "Linked purchaser");
        referrer.id
      }
    };

    if let Some(purchaser) = directory.by_id(purchaser_id).await?
      && purchaser.referred_by_id.is_none()
    {
      affiliate::ActiveModel {
        referred_by_id: Set(Some(referrer_id)),
        ..purchaser.into()
      }
      .update(self.db)
      .await?;
    }

    Ok(Some(referrer_id))
  }
}
