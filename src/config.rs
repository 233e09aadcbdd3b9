use std::env;

use anyhow::Context;

use crate::{prelude::*, sv::stripe};

#[derive(Debug, Clone)]
pub struct Config {
  pub db_url: String,
  pub port: u16,
  pub server_secret: String,
  pub stripe_secret_key: String,
  pub stripe_api_url: String,
  pub stripe_timeout: Duration,
  pub site_url: String,
  /// How long a transaction may sit in `processing` before it is reported.
  pub stale_after: Duration,
  pub stale_check_every: Duration,
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    Ok(Self {
      db_url: env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:affiliate.db?mode=rwc".into()),
      port: env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3000),
      server_secret: env::var("SERVER_SECRET")
        .context("SERVER_SECRET not set")?,
      stripe_secret_key: env::var("STRIPE_SECRET_KEY")
        .context("STRIPE_SECRET_KEY not set")?,
      stripe_api_url: env::var("STRIPE_API_URL")
        .unwrap_or_else(|_| stripe::API_URL.into()),
      stripe_timeout: duration_var("STRIPE_TIMEOUT", "20s")?,
      site_url: env::var("SITE_URL")
        .unwrap_or_else(|_| "http://localhost:3000".into()),
      stale_after: duration_var("STALE_AFTER", "1h")?,
      stale_check_every: duration_var("STALE_CHECK_EVERY", "15m")?,
    })
  }

  pub fn referral_link(&self, code: &str) -> String {
    format!("{}?ref={}", self.site_url.trim_end_matches('/'), code)
  }
}

fn duration_var(key: &str, default: &str) -> anyhow::Result<Duration> {
  let raw = env::var(key).unwrap_or_else(|_| default.into());
  humantime::parse_duration(&raw)
    .with_context(|| format!("Invalid duration in {key}: {raw}"))
}
