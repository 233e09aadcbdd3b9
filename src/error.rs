use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("Database error: {0}")]
  Db(#[from] sea_orm::DbErr),
  #[error("Affiliate not found")]
  AffiliateNotFound,
  #[error("User not found")]
  UserNotFound,
  #[error("Commission transaction not found or already settled")]
  TransactionNotFound,
  #[error("User is already enrolled as an affiliate")]
  AlreadyEnrolled,
  #[error("Invalid arguments: {0}")]
  InvalidArgs(String),
  #[error("Stripe error: {0}")]
  Stripe(String),
  #[error("Account {0} is not ready to receive payouts")]
  PayoutsDisabled(String),
  #[error("Internal error: {0}")]
  Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
