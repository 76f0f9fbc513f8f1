use crate::config::{Config, Credentials};
use crate::error::Error;
use chrono::NaiveDate;
use log::{debug, error, info};
use reqwest::{header::HeaderMap, Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;

const VENDOR_ID_HEADER: &str = "x-vendorid";
const PRODUCT: &str = "premium_placements";
const PRICING_MODEL: &str = "CPC";

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PartnerPortal: Send + Sync + 'static {
    /// Logs into the partner portal.
    /// # Arguments
    /// * `credentials` - The username/password pair sent as the login body.
    /// # Returns
    /// A Result containing either a [`Login`] holding the authenticated session and the
    /// vendor account ids attached to the profile, or an [`Error::Authentication`].
    async fn authenticate(&self, credentials: &Credentials) -> Result<Login, Error>;

    /// Lists the CPC premium-placement campaign ids of one vendor account.
    /// Upstream failures are logged and reported as an empty list.
    async fn list_campaigns(&self, session: &Session, account_id: &str) -> Vec<String>;

    /// Fetches the daily report of one campaign.
    /// Upstream failures are logged and reported as an empty list.
    async fn fetch_metrics(
        &self,
        session: &Session,
        account_id: &str,
        campaign_id: &str,
    ) -> Vec<CampaignMetrics>;
}

/// Bearer token handed out at login; valid for the whole run.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        AuthToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// An authenticated HTTP context: the cookie-carrying client used for the login
/// plus the token it produced. Every call after login goes through it.
#[derive(Debug)]
pub struct Session {
    client: Client,
    token: AuthToken,
}

impl Session {
    pub fn new(client: Client, token: AuthToken) -> Self {
        Session { client, token }
    }

    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    fn get(&self, url: Url, account_id: &str) -> RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(self.token().as_str())
            .header(VENDOR_ID_HEADER, account_id)
    }
}

#[derive(Debug)]
pub struct Login {
    pub session: Session,
    pub account_ids: Vec<String>,
}

/// One campaign discovered under a vendor account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignRef {
    pub account_id: String,
    pub campaign_id: String,
}

/// Ids come back as JSON strings on some endpoints and numbers on others.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Identifier {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Text(text) => f.write_str(text),
            Identifier::Number(number) => write!(f, "{}", number),
        }
    }
}

/// Raw daily entry of the CPC report, kept exactly as reported so that an
/// unexpected field type surfaces when the record is flattened instead of
/// failing the whole report.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct DailyMetricRecord(serde_json::Value);

impl DailyMetricRecord {
    pub fn new(value: serde_json::Value) -> Self {
        DailyMetricRecord(value)
    }

    /// Looks up `name`; `None` when the key is absent or the entry is not an object.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMetrics {
    pub vendor_id: Option<Identifier>,
    pub cpc_metrics: Option<Vec<DailyMetricRecord>>,
}

#[derive(Deserialize)]
struct LoginResponse {
    keymaker: Keymaker,
    profile: Profile,
}

#[derive(Deserialize)]
struct Keymaker {
    access_token: String,
}

#[derive(Deserialize)]
struct Profile {
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Deserialize)]
struct Account {
    vendor_id: Identifier,
}

#[derive(Deserialize)]
struct CampaignSummary {
    id: Identifier,
}

#[derive(Deserialize)]
struct CampaignList {
    #[serde(default)]
    data: Option<Vec<CampaignSummary>>,
}

#[derive(Deserialize)]
struct ReportingData {
    #[serde(default)]
    campaigns: Option<Vec<CampaignMetrics>>,
}

#[derive(Deserialize)]
struct Reporting {
    #[serde(default)]
    data: Option<ReportingData>,
}

#[derive(Clone)]
pub struct ApiClient {
    auth_url: String,
    campaign_url: String,
    ended_after: NaiveDate,
    headers: HeaderMap,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        Ok(ApiClient {
            auth_url: config.auth_url.to_string(),
            campaign_url: config.campaign_url.to_string(),
            ended_after: config.ended_after,
            headers: config.headers()?,
        })
    }

    async fn try_list_campaigns(
        &self,
        session: &Session,
        account_id: &str,
    ) -> Result<Vec<String>, Error> {
        let mut url = endpoint(&self.campaign_url, &["vendors", account_id, "campaigns"])?;
        url.query_pairs_mut()
            .append_pair("ended_after", &self.ended_after.format("%Y-%m-%d").to_string())
            .append_pair("product", PRODUCT)
            .append_pair("pricing_model", PRICING_MODEL);

        let resp = session.get(url, account_id).send().await?;
        let campaigns: CampaignList = read_json(resp, "campaigns").await?;

        let ids: Vec<String> = campaigns
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|campaign| campaign.id.to_string())
            .collect();

        if ids.is_empty() {
            debug!("Vendor {} has no matching campaigns", account_id);
        }

        Ok(ids)
    }

    async fn try_fetch_metrics(
        &self,
        session: &Session,
        account_id: &str,
        campaign_id: &str,
    ) -> Result<Vec<CampaignMetrics>, Error> {
        let mut url = endpoint(&self.campaign_url, &["reporting"])?;
        url.query_pairs_mut()
            .append_pair("product_type", PRODUCT)
            .append_pair("campaign_ids", campaign_id)
            .append_pair("aggregation_level", "daily")
            .append_pair("filter_zero_clicks", "false")
            .append_pair("include_segment", "true");

        let resp = session.get(url, account_id).send().await?;
        let reporting: Reporting = read_json(resp, "reporting").await?;

        let campaigns = reporting
            .data
            .and_then(|data| data.campaigns)
            .unwrap_or_default();

        if campaigns.is_empty() {
            debug!("Campaign {} of vendor {} reported no metrics", campaign_id, account_id);
        }

        Ok(campaigns)
    }
}

#[async_trait::async_trait]
impl PartnerPortal for ApiClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Login, Error> {
        let client = Client::builder()
            .cookie_store(true)
            .default_headers(self.headers.clone())
            .build()?;

        let url = endpoint(&self.auth_url, &["login"])?;
        let resp = client.post(url).json(credentials).send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if status != StatusCode::OK {
            error!("Login rejected with {}: {}", status, body);
            return Err(Error::Authentication {
                reason: format!("login returned {}", status),
            });
        }

        let login: LoginResponse =
            serde_json::from_str(&body).map_err(|err| Error::Authentication {
                reason: format!("unreadable login response: {}", err),
            })?;

        let mut account_ids: Vec<String> = Vec::with_capacity(login.profile.accounts.len());
        for account in login.profile.accounts {
            let account_id = account.vendor_id.to_string();
            if !account_ids.contains(&account_id) {
                account_ids.push(account_id);
            }
        }

        info!("Logged in as {}", credentials.username);

        Ok(Login {
            session: Session::new(client, AuthToken::new(login.keymaker.access_token)),
            account_ids,
        })
    }

    async fn list_campaigns(&self, session: &Session, account_id: &str) -> Vec<String> {
        match self.try_list_campaigns(session, account_id).await {
            Ok(ids) => ids,
            Err(err) => {
                error!("Error listing campaigns for vendor {}: {}", account_id, err);
                vec![]
            }
        }
    }

    async fn fetch_metrics(
        &self,
        session: &Session,
        account_id: &str,
        campaign_id: &str,
    ) -> Vec<CampaignMetrics> {
        match self.try_fetch_metrics(session, account_id, campaign_id).await {
            Ok(campaigns) => campaigns,
            Err(err) => {
                error!(
                    "Error fetching metrics for campaign {} of vendor {}: {}",
                    campaign_id, account_id, err
                );
                vec![]
            }
        }
    }
}

/// Appends `segments` to the path of `base`.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, Error> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| Error::UrlParsingFailed(url::ParseError::SetHostOnCannotBeABaseUrl))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn read_json<T: DeserializeOwned>(resp: Response, endpoint: &str) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if status != StatusCode::OK {
        return Err(Error::UpstreamEmpty {
            endpoint: endpoint.to_string(),
            reason: format!("{} {}", status, body),
        });
    }

    serde_json::from_str(&body).map_err(|err| Error::UpstreamEmpty {
        endpoint: endpoint.to_string(),
        reason: format!("unreadable response: {}", err),
    })
}
