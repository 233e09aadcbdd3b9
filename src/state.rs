use anyhow::Context;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;

use crate::{
  config::Config,
  prelude::*,
  sv::stripe::{ConnectPayouts, Stripe},
};

pub struct AppState {
  pub db: DatabaseConnection,
  pub config: Config,
  pub connect: ConnectPayouts,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    let db = Database::connect(&config.db_url)
      .await
      .context("Failed to connect to database")?;

    Migrator::up(&db, None).await.context("Failed to run migrations")?;

    let stripe = Stripe::new(
      config.stripe_secret_key.clone(),
      config.stripe_api_url.clone(),
      config.stripe_timeout,
    )?;
    let connect = ConnectPayouts::new(db.clone(), stripe);

    Ok(Self { db, config, connect })
  }
}
