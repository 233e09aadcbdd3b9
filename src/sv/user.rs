use sea_orm::sea_query::Expr;

use crate::{entity::user, prelude::*};

pub struct User<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> User<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn get_or_create(
    &self,
    id: Uuid,
    email: Option<&str>,
  ) -> Result<user::Model> {
    if let Some(user) = user::Entity::find_by_id(id).one(self.db).await? {
      if user.email.is_none()
        && let Some(email) = email
      {
        let user = user::ActiveModel {
          email: Set(Some(email.to_string())),
          ..user.into()
        }
        .update(self.db)
        .await?;
        return Ok(user);
      }
      return Ok(user);
    }

    let now = Utc::now().naive_utc();
    let user = user::ActiveModel {
      id: Set(id),
      email: Set(email.map(Into::into)),
      referred_by: Set(None),
      affiliate_opted_out: Set(false),
      created_at: Set(now),
    };

    Ok(user.insert(self.db).await?)
  }

  pub async fn by_id(&self, id: Uuid) -> Result<Option<user::Model>> {
    Ok(user::Entity::find_by_id(id).one(self.db).await?)
  }

  /// Record the user's first-touch referrer. Later referrers never replace
  /// the first one.
  pub async fn set_referred_by(&self, id: Uuid, referrer_id: Uuid) -> Result<()> {
    let user = self.by_id(id).await?.ok_or(Error::UserNotFound)?;

    if user.referred_by.is_some() {
      return Err(Error::InvalidArgs("User already has a referrer".into()));
    }

    if id == referrer_id {
      return Err(Error::InvalidArgs("Cannot refer yourself".into()));
    }

    user::ActiveModel { referred_by: Set(Some(referrer_id)), ..user.into() }
      .update(self.db)
      .await?;

    Ok(())
  }

  pub async fn set_opted_out(&self, id: Uuid, opted_out: bool) -> Result<()> {
    let result = user::Entity::update_many()
      .col_expr(user::Column::AffiliateOptedOut, Expr::value(opted_out))
      .filter(user::Column::Id.eq(id))
      .exec(self.db)
      .await?;

    if result.rows_affected == 0 {
      return Err(Error::UserNotFound);
    }
    Ok(())
  }
}
