use axum::{
  Json,
  body::Bytes,
  extract::{Path, State},
  http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
  entity::Track,
  prelude::*,
  state::AppState,
  sv::{
    self,
    commission::{CommissionReport, PurchaseEvent},
    stats::AffiliateStats,
    stripe::{Account, AccountLink},
  },
  utils,
};

pub const SIGNATURE_HEADER: &str = "x-signature";
const RECENT_LIMIT: u64 = 10;

#[derive(Serialize)]
pub struct Status<T> {
  success: bool,
  msg: Option<String>,
  data: Option<T>,
}

type Reply<T> = (StatusCode, Json<Status<T>>);

fn ok<T>(data: T) -> Reply<T> {
  (StatusCode::OK, Json(Status { success: true, msg: None, data: Some(data) }))
}

fn fail<T>(code: StatusCode, msg: impl Into<String>) -> Reply<T> {
  (code, Json(Status { success: false, msg: Some(msg.into()), data: None }))
}

fn error_reply<T>(err: Error) -> Reply<T> {
  let code = match &err {
    Error::AffiliateNotFound
    | Error::UserNotFound
    | Error::TransactionNotFound => StatusCode::NOT_FOUND,
    Error::AlreadyEnrolled => StatusCode::CONFLICT,
    Error::InvalidArgs(_) => StatusCode::BAD_REQUEST,
    Error::Stripe(_) | Error::PayoutsDisabled(_) => StatusCode::BAD_GATEWAY,
    Error::Db(_) | Error::Internal(_) => {
      error!("Request failed: {}", err);
      StatusCode::INTERNAL_SERVER_ERROR
    }
  };
  fail(code, err.to_string())
}

/// Verify the body signature, then decode it.
fn authorize<T: DeserializeOwned, R>(
  app: &AppState,
  headers: &HeaderMap,
  body: &[u8],
) -> Result<T, Reply<R>> {
  let signed = headers
    .get(SIGNATURE_HEADER)
    .and_then(|value| value.to_str().ok())
    .is_some_and(|signature| {
      utils::verify_signature(&app.config.server_secret, body, signature)
    });
  if !signed {
    return Err(fail(StatusCode::UNAUTHORIZED, "Invalid signature"));
  }

  let body = if body.is_empty() { b"null".as_slice() } else { body };
  json::from_slice(body)
    .map_err(|e| fail(StatusCode::BAD_REQUEST, format!("Invalid body: {e}")))
}

pub async fn health() -> &'static str {
  "OK"
}

/// Validated purchase from the checkout flow. Once authenticated this always
/// answers 200: commission problems never fail the sale.
pub async fn purchase(
  State(app): State<Arc<AppState>>,
  headers: HeaderMap,
  body: Bytes,
) -> Reply<Option<CommissionReport>> {
  let event: PurchaseEvent = match authorize(&app, &headers, &body) {
    Ok(event) => event,
    Err(reply) => return reply,
  };

  if let Some(code) = event.referral_code.as_deref()
    && !code.trim().is_empty()
    && let Err(err) = sv::Referral::new(&app.db)
      .link_purchaser(event.purchaser_id, code)
      .await
  {
    let purchaser_id = event.purchaser_id;
    error!(%purchaser_id, %err, "Failed to link purchaser");
  }

  let report = sv::Commissions::new(&app.db, &app.connect)
    .process_commission(&event)
    .await;

  ok(report)
}

#[derive(Deserialize)]
pub struct LinkReq {
  purchaser_id: Uuid,
  referral_code: String,
}

pub async fn link(
  State(app): State<Arc<AppState>>,
  headers: HeaderMap,
  body: Bytes,
) -> Reply<Option<Uuid>> {
  let req: LinkReq = match authorize(&app, &headers, &body) {
    Ok(req) => req,
    Err(reply) => return reply,
  };

  match sv::Referral::new(&app.db)
    .link_purchaser(req.purchaser_id, &req.referral_code)
    .await
  {
    Ok(referrer_id) => ok(referrer_id),
    Err(err) => error_reply(err),
  }
}

#[derive(Deserialize)]
pub struct EnrollReq {
  user_id: Uuid,
  email: Option<String>,
}

#[derive(Serialize)]
pub struct Enrollment {
  affiliate_id: Uuid,
  referral_code: String,
  referral_link: String,
  payout_account_id: Option<String>,
  payout_error: Option<String>,
}

pub async fn enroll(
  State(app): State<Arc<AppState>>,
  headers: HeaderMap,
  body: Bytes,
) -> Reply<Enrollment> {
  let req: EnrollReq = match authorize(&app, &headers, &body) {
    Ok(req) => req,
    Err(reply) => return reply,
  };

  let email = req.email.as_deref();
  let affiliate =
    match sv::Affiliate::new(&app.db).enroll(req.user_id, email).await {
      Ok(affiliate) => affiliate,
      Err(err) => return error_reply(err),
    };

  // Payout setup can be finished later from the dashboard.
  let (payout_account_id, payout_error) =
    match app.connect.ensure_account(affiliate.id, email).await {
      Ok(account_id) => (Some(account_id), None),
      Err(err) => {
        let affiliate_id = affiliate.id;
        warn!(%affiliate_id, %err, "Payout account creation failed");
        (None, Some(err.to_string()))
      }
    };

  ok(Enrollment {
    affiliate_id: affiliate.id,
    referral_link: app.config.referral_link(&affiliate.referral_code),
    referral_code: affiliate.referral_code,
    payout_account_id,
    payout_error,
  })
}

#[derive(Serialize)]
pub struct StatsReply {
  referral_link: String,
  #[serde(flatten)]
  stats: AffiliateStats,
}

pub async fn stats(
  State(app): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  body: Bytes,
) -> Reply<StatsReply> {
  if let Err(reply) = authorize::<(), _>(&app, &headers, &body) {
    return reply;
  }

  match sv::Stats::new(&app.db).affiliate(id, RECENT_LIMIT).await {
    Ok(stats) => ok(StatsReply {
      referral_link: app.config.referral_link(&stats.referral_code),
      stats,
    }),
    Err(err) => error_reply(err),
  }
}

#[derive(Deserialize)]
pub struct OnboardingReq {
  email: Option<String>,
}

pub async fn onboarding(
  State(app): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  body: Bytes,
) -> Reply<AccountLink> {
  let req: Option<OnboardingReq> = match authorize(&app, &headers, &body) {
    Ok(req) => req,
    Err(reply) => return reply,
  };
  let email = req.and_then(|r| r.email);

  match app
    .connect
    .onboarding_link(id, email.as_deref(), &app.config.site_url)
    .await
  {
    Ok(link) => ok(link),
    Err(err) => error_reply(err),
  }
}

pub async fn refresh(
  State(app): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  body: Bytes,
) -> Reply<Account> {
  if let Err(reply) = authorize::<(), _>(&app, &headers, &body) {
    return reply;
  }

  match app.connect.refresh(id).await {
    Ok(account) => ok(account),
    Err(err) => error_reply(err),
  }
}

#[derive(Deserialize)]
pub struct TrackReq {
  track: Track,
}

pub async fn set_track(
  State(app): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  body: Bytes,
) -> Reply<()> {
  let req: TrackReq = match authorize(&app, &headers, &body) {
    Ok(req) => req,
    Err(reply) => return reply,
  };

  match sv::Affiliate::new(&app.db).set_track(id, req.track).await {
    Ok(()) => ok(()),
    Err(err) => error_reply(err),
  }
}

pub async fn opt_out(
  State(app): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  body: Bytes,
) -> Reply<()> {
  if let Err(reply) = authorize::<(), _>(&app, &headers, &body) {
    return reply;
  }

  match sv::Affiliate::new(&app.db).opt_out(id).await {
    Ok(()) => ok(()),
    Err(err) => error_reply(err),
  }
}
