//! Stripe Connect integration for affiliate payouts.
//! API docs: https://docs.stripe.com/api
//!
//! Affiliates get an Express account; commissions are sent to it with
//! transfers grouped by the originating checkout session.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
  prelude::*,
  sv::{
    affiliate::Affiliate,
    directory::Directory,
    payout::{Payouts, TransferRequest},
  },
};

pub const API_URL: &str = "https://api.stripe.com/v1/";

const CURRENCY: &str = "usd";
const PLATFORM: &str = "affiliate";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
  pub id: String,
  #[serde(default)]
  pub details_submitted: bool,
  #[serde(default)]
  pub charges_enabled: bool,
  #[serde(default)]
  pub payouts_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountLink {
  pub url: String,
  pub expires_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transfer {
  pub id: String,
  pub amount: i64,
  pub destination: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
  #[serde(rename = "type")]
  kind: Option<String>,
  code: Option<String>,
  message: Option<String>,
}

impl ApiError {
  fn describe(&self) -> String {
    let kind = self.kind.as_deref().unwrap_or("api_error");
    match (&self.code, &self.message) {
      (Some(code), Some(msg)) => format!("{kind}/{code}: {msg}"),
      (None, Some(msg)) => format!("{kind}: {msg}"),
      (Some(code), None) => format!("{kind}/{code}"),
      (None, None) => kind.to_string(),
    }
  }
}

/// Stripe REST client
#[derive(Clone)]
pub struct Stripe {
  client: Client,
  base_url: String,
  secret_key: String,
}

impl Stripe {
  pub fn new(
    secret_key: String,
    base_url: String,
    timeout: Duration,
  ) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| Error::Stripe(format!("Failed to build client: {}", e)))?;

    Ok(Self { client, base_url, secret_key })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url.trim_end_matches('/'), path)
  }

  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
    let response = request
      .bearer_auth(&self.secret_key)
      .send()
      .await
      .map_err(|e| Error::Stripe(format!("Request failed: {}", e)))?;

    let status = response.status();
    let body = response
      .bytes()
      .await
      .map_err(|e| Error::Stripe(format!("Failed to read response: {}", e)))?;

    if status.is_success() {
      json::from_slice(&body).map_err(|e| {
        Error::Stripe(format!("Failed to parse response: {}", e))
      })
    } else {
      Err(Error::Stripe(parse_error(status.as_u16(), &body)))
    }
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    self.send(self.client.get(self.url(path))).await
  }

  async fn post<T: DeserializeOwned>(
    &self,
    path: &str,
    form: &[(&str, String)],
  ) -> Result<T> {
    self.send(self.client.post(self.url(path)).form(form)).await
  }

  /// Create an Express account that can receive transfers
  pub async fn create_express_account(
    &self,
    user_id: Uuid,
    email: Option<&str>,
  ) -> Result<Account> {
    let mut form = vec![
      ("type", "express".to_string()),
      ("business_type", "individual".to_string()),
      ("capabilities[transfers][requested]", "true".to_string()),
      ("metadata[user_id]", user_id.to_string()),
      ("metadata[platform]", PLATFORM.to_string()),
    ];
    if let Some(email) = email {
      form.push(("email", email.to_string()));
    }

    self.post("accounts", &form).await
  }

  pub async fn account(&self, account_id: &str) -> Result<Account> {
    self.get(&format!("accounts/{account_id}")).await
  }

  /// Create a hosted onboarding link for an account
  pub async fn create_account_link(
    &self,
    account_id: &str,
    refresh_url: &str,
    return_url: &str,
  ) -> Result<AccountLink> {
    let form = [
      ("account", account_id.to_string()),
      ("refresh_url", refresh_url.to_string()),
      ("return_url", return_url.to_string()),
      ("type", "account_onboarding".to_string()),
    ];

    self.post("account_links", &form).await
  }

  pub async fn create_transfer(
    &self,
    request: &TransferRequest,
  ) -> Result<Transfer> {
    self.post("transfers", &transfer_form(request)).await
  }
}

fn transfer_form(request: &TransferRequest) -> Vec<(&'static str, String)> {
  vec![
    ("amount", request.amount_cents.to_string()),
    ("currency", CURRENCY.to_string()),
    ("destination", request.destination.clone()),
    ("description", request.description.clone()),
    ("transfer_group", request.group.clone()),
    ("metadata[platform]", PLATFORM.to_string()),
  ]
}

fn parse_error(status: u16, body: &[u8]) -> String {
  match json::from_slice::<ErrorBody>(body) {
    Ok(body) => format!("{} ({})", body.error.describe(), status),
    Err(_) => format!("HTTP {}", status),
  }
}

/// Payouts through Stripe Connect. Eligibility comes from the directory's
/// `payouts_enabled` flag, which `refresh` keeps in sync with Stripe.
pub struct ConnectPayouts {
  db: DatabaseConnection,
  stripe: Stripe,
}

impl ConnectPayouts {
  pub fn new(db: DatabaseConnection, stripe: Stripe) -> Self {
    Self { db, stripe }
  }

  /// Return the affiliate's payout account, creating one if missing.
  pub async fn ensure_account(
    &self,
    affiliate_id: Uuid,
    email: Option<&str>,
  ) -> Result<String> {
    let affiliate = Affiliate::new(&self.db).get(affiliate_id).await?;
    if let Some(account_id) = affiliate.payout_account_id {
      return Ok(account_id);
    }

    let account = self.stripe.create_express_account(affiliate_id, email).await?;
    Affiliate::new(&self.db)
      .set_payout_account(affiliate_id, &account.id)
      .await?;

    info!(%affiliate_id, account_id = %account.id, "Payout account created");
    Ok(account.id)
  }

  /// Hosted onboarding URL for the affiliate's payout account.
  pub async fn onboarding_link(
    &self,
    affiliate_id: Uuid,
    email: Option<&str>,
    site_url: &str,
  ) -> Result<AccountLink> {
    let account_id = self.ensure_account(affiliate_id, email).await?;
    let site_url = site_url.trim_end_matches('/');

    self
      .stripe
      .create_account_link(
        &account_id,
        &format!("{site_url}/dashboard/affiliate/onboarding?refresh=true"),
        &format!("{site_url}/dashboard/affiliate/onboarding/complete"),
      )
      .await
  }

  /// Pull the account state from Stripe and store its payout flag.
  pub async fn refresh(&self, affiliate_id: Uuid) -> Result<Account> {
    let affiliate = Affiliate::new(&self.db).get(affiliate_id).await?;
    let account_id = affiliate.payout_account_id.ok_or_else(|| {
      Error::InvalidArgs("Affiliate has no payout account".into())
    })?;

    let account = self.stripe.account(&account_id).await?;
    Affiliate::new(&self.db)
      .set_payouts_enabled(affiliate_id, account.payouts_enabled)
      .await?;

    Ok(account)
  }
}

#[async_trait]
impl Payouts for ConnectPayouts {
  async fn is_payout_eligible(&self, affiliate_id: Uuid) -> Result<bool> {
    Ok(
      Directory::new(&self.db)
        .by_id(affiliate_id)
        .await?
        .is_some_and(|affiliate| affiliate.payouts_enabled),
    )
  }

  async fn execute_transfer(&self, request: &TransferRequest) -> Result<String> {
    let account = self.stripe.account(&request.destination).await?;
    if !account.payouts_enabled {
      return Err(Error::PayoutsDisabled(account.id));
    }

    let transfer = self.stripe.create_transfer(request).await?;
    debug!(
      transfer_id = %transfer.id,
      amount = transfer.amount,
      destination = ?transfer.destination,
      "Stripe transfer created"
    );
    Ok(transfer.id)
  }
}
