mod handlers;

use std::net::SocketAddr;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
  Router,
  routing::{get, post},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub struct Server;

fn router(app: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(handlers::health))
    .route("/api/purchases", post(handlers::purchase))
    .route("/api/referrals/link", post(handlers::link))
    .route("/api/affiliates", post(handlers::enroll))
    .route("/api/affiliates/{id}/stats", get(handlers::stats))
    .route("/api/affiliates/{id}/onboarding", post(handlers::onboarding))
    .route("/api/affiliates/{id}/refresh", post(handlers::refresh))
    .route("/api/affiliates/{id}/track", post(handlers::set_track))
    .route("/api/users/{id}/opt-out", post(handlers::opt_out))
    .with_state(app)
}

#[async_trait]
impl super::Plugin for Server {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let governor_limiter = governor_conf.limiter().clone();

    tokio::spawn(async move {
      loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
        governor_limiter.retain_recent();
      }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], app.config.port));
    let service = router(app)
      .layer(
        ServiceBuilder::new()
          .layer(TraceLayer::new_for_http())
          .layer(GovernorLayer::new(governor_conf))
          .layer(
            CorsLayer::new()
              .allow_origin(Any)
              .allow_methods(Any)
              .allow_headers(Any),
          ),
      )
      .into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;

    info!("HTTP server listening on {addr}");
    axum::serve(listener, service).await.context("Server error")?;

    Ok(())
  }
}
