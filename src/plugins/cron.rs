use async_trait::async_trait;

use crate::{plugins::Plugin, prelude::*, state::AppState, sv};

/// Reports transactions stuck in `processing`. A row only stays there when
/// the ledger could not settle it, so each one needs a manual look.
pub struct StaleWatch;

#[async_trait]
impl Plugin for StaleWatch {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let every = app.config.stale_check_every;
    if every.is_zero() {
      info!("StaleWatch disabled via config (0 interval)");
      return Ok(());
    }

    info!(
      "StaleWatch started (every {}, stale after {})",
      humantime::format_duration(every),
      humantime::format_duration(app.config.stale_after)
    );

    let mut interval = tokio::time::interval(every);
    loop {
      interval.tick().await;

      if let Err(err) = check(&app).await {
        error!("StaleWatch failed: {}", err);
      }
    }
  }
}

async fn check(app: &AppState) -> anyhow::Result<usize> {
  let stale_after = TimeDelta::from_std(app.config.stale_after)?;
  let cutoff = Utc::now().naive_utc() - stale_after;

  let stale = sv::Ledger::new(&app.db).stale(cutoff).await?;
  for tx in &stale {
    warn!(
      transaction_id = %tx.id,
      sale_id = %tx.sale_id,
      created_at = %tx.created_at,
      "Commission transaction still processing"
    );
  }

  if !stale.is_empty() {
    warn!("{} stale commission transaction(s)", stale.len());
  }
  Ok(stale.len())
}
