use crate::{
  entity::{Track, affiliate},
  prelude::*,
  sv::{directory::Directory, user::User},
};

const CODE_LEN: usize = 8;
const CODE_ATTEMPTS: usize = 5;

pub struct Affiliate<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Affiliate<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn get(&self, id: Uuid) -> Result<affiliate::Model> {
    Directory::new(self.db).by_id(id).await?.ok_or(Error::AffiliateNotFound)
  }

  /// Enroll a user. New affiliates start on the community builder track and
  /// inherit the user's first-touch referrer as their upline.
  pub async fn enroll(
    &self,
    user_id: Uuid,
    email: Option<&str>,
  ) -> Result<affiliate::Model> {
    if Directory::new(self.db).by_id(user_id).await?.is_some() {
      return Err(Error::AlreadyEnrolled);
    }

    let users = User::new(self.db);
    let user = users.get_or_create(user_id, email).await?;
    if user.affiliate_opted_out {
      users.set_opted_out(user_id, false).await?;
      info!(%user_id, "Clearing affiliate opt-out on enrollment");
    }

    let code = self.unique_code().await?;
    let now = Utc::now().naive_utc();

    let affiliate = affiliate::ActiveModel {
      id: Set(user_id),
      referral_code: Set(code),
      track: Set(Track::CommunityBuilder.as_str().to_string()),
      payout_account_id: Set(None),
      payouts_enabled: Set(false),
      referred_by_id: Set(user.referred_by),
      total_earnings_cents: Set(0),
      referral_count: Set(0),
      enrolled_at: Set(now),
    }
    .insert(self.db)
    .await?;

    info!(
      affiliate_id = %affiliate.id,
      code = %affiliate.referral_code,
      upline = ?affiliate.referred_by_id,
      "Affiliate enrolled"
    );
    Ok(affiliate)
  }

  /// Record that a user declined the program. Enrolled affiliates keep
  /// their account; `enroll` clears the flag again.
  pub async fn opt_out(&self, user_id: Uuid) -> Result<()> {
    let users = User::new(self.db);
    users.get_or_create(user_id, None).await?;
    users.set_opted_out(user_id, true).await?;

    info!(%user_id, "User opted out of the affiliate program");
    Ok(())
  }

  async fn unique_code(&self) -> Result<String> {
    let directory = Directory::new(self.db);
    for _ in 0..CODE_ATTEMPTS {
      let code = generate_code();
      if directory.by_code(&code).await?.is_none() {
        return Ok(code);
      }
    }
    Err(Error::Internal("Failed to generate a unique referral code".into()))
  }

  /// Applies to future sales only; recorded transactions keep their
  /// snapshot.
  pub async fn set_track(&self, id: Uuid, track: Track) -> Result<()> {
    let affiliate = self.get(id).await?;
    let previous = affiliate.track();

    affiliate::ActiveModel {
      track: Set(track.as_str().to_string()),
      ..affiliate.into()
    }
    .update(self.db)
    .await?;

    info!(affiliate_id = %id, ?previous, %track, "Track changed");
    Ok(())
  }

  pub async fn set_payout_account(
    &self,
    id: Uuid,
    account_id: &str,
  ) -> Result<()> {
    let affiliate = self.get(id).await?;

    affiliate::ActiveModel {
      payout_account_id: Set(Some(account_id.to_string())),
      ..affiliate.into()
    }
    .update(self.db)
    .await?;

    Ok(())
  }

  pub async fn set_payouts_enabled(&self, id: Uuid, enabled: bool) -> Result<()> {
    let affiliate = self.get(id).await?;

    affiliate::ActiveModel {
      payouts_enabled: Set(enabled),
      ..affiliate.into()
    }
    .update(self.db)
    .await?;

    Ok(())
  }
}

fn generate_code() -> String {
  Uuid::new_v4().simple().to_string()[..CODE_LEN].to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::{seed, test_db};

  #[test]
  fn test_generate_code_shape() {
    let code = generate_code();
    assert_eq!(code.len(), CODE_LEN);
    assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(code, code.to_ascii_uppercase());
  }

  #[tokio::test]
  async fn test_enroll_inherits_first_touch_referrer() {
    let db = test_db::setup().await;
    let a = seed::affiliate(&db, "AAAA", "high_performer", None).await;
    let user_id = Uuid::new_v4();
    let users = User::new(&db);
    users.get_or_create(user_id, None).await.unwrap();
    users.set_referred_by(user_id, a.id).await.unwrap();

    let enrolled =
      Affiliate::new(&db).enroll(user_id, Some("b@example.com")).await.unwrap();

    assert_eq!(enrolled.referred_by_id, Some(a.id));
    assert_eq!(enrolled.track(), Some(Track::CommunityBuilder));
    assert!(enrolled.payout_account_id.is_none());
    assert!(!enrolled.payouts_enabled);
    assert_eq!(enrolled.referral_code.len(), CODE_LEN);
  }

  #[tokio::test]
  async fn test_enroll_twice_fails() {
    let db = test_db::setup().await;
    let user_id = Uuid::new_v4();
    let affiliates = Affiliate::new(&db);

    affiliates.enroll(user_id, None).await.unwrap();
    let again = affiliates.enroll(user_id, None).await;
    assert!(matches!(again, Err(Error::AlreadyEnrolled)));
  }

  #[tokio::test]
  async fn test_opt_out_then_enroll_clears_flag() {
    let db = test_db::setup().await;
    let user_id = Uuid::new_v4();
    let affiliates = Affiliate::new(&db);
    let users = User::new(&db);

    affiliates.opt_out(user_id).await.unwrap();
    let user = users.by_id(user_id).await.unwrap().unwrap();
    assert!(user.affiliate_opted_out);

    affiliates.enroll(user_id, None).await.unwrap();
    let user = users.by_id(user_id).await.unwrap().unwrap();
    assert!(!user.affiliate_opted_out);
  }

  #[tokio::test]
  async fn test_set_track_and_payout_fields() {
    let db = test_db::setup().await;
    let b = seed::affiliate(&db, "BBBB", "community_builder", None).await;
    let affiliates = Affiliate::new(&db);

    affiliates.set_track(b.id, Track::Independent).await.unwrap();
    affiliates.set_payout_account(b.id, "acct_new").await.unwrap();
    affiliates.set_payouts_enabled(b.id, false).await.unwrap();

    let b = affiliates.get(b.id).await.unwrap();
    assert_eq!(b.track(), Some(Track::Independent));
    assert_eq!(b.payout_account_id.as_deref(), Some("acct_new"));
    assert!(!b.payouts_enabled);

    let missing = affiliates.set_track(Uuid::new_v4(), Track::Independent).await;
    assert!(matches!(missing, Err(Error::AffiliateNotFound)));
  }
}
