use crate::error::Error;
use chrono::NaiveDate;
use clap::Args as ClapArgs;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ORIGIN, REFERER,
    USER_AGENT,
};
use serde::Serialize;
use std::fmt;

const DEFAULT_AUTH_URL: &str = "https://bff-api.eu.prd.portal.restaurant/auth/v4/oneweb";
const DEFAULT_CAMPAIGN_URL: &str = "https://at-vc-gtw.deliveryhero.io/api/v1/entities/HS_SA";
const DEFAULT_ENDED_AFTER: &str = "2024-01-01";
const DEFAULT_ORIGIN: &str = "https://partner-app.hungerstation.com";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";
const DEFAULT_APP_VERSION: &str = "2.6.2";
const OUTPUT_PATH: &str = "./data/ksa_cpc.csv";
const LOG_DIR: &str = "./log_file";

const APP_NAME: &str = "one-web";

#[derive(ClapArgs)]
pub struct Config {
    #[arg(long, default_value = DEFAULT_AUTH_URL, env = "PORTAL_AUTH_URL")]
    pub(crate) auth_url: String,

    #[arg(long, default_value = DEFAULT_CAMPAIGN_URL, env = "PORTAL_CAMPAIGN_URL")]
    pub(crate) campaign_url: String,

    #[arg(long, env = "PORTAL_USERNAME")]
    pub(crate) username: String,

    #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
    pub(crate) password: String,

    #[arg(
        long,
        default_value = DEFAULT_ENDED_AFTER,
        env = "CAMPAIGNS_ENDED_AFTER",
        help = "Date should be in the form YYYY-MM-DD",
        value_parser = validate_date
    )]
    pub(crate) ended_after: NaiveDate,

    #[arg(long, default_value = DEFAULT_ORIGIN, env = "PORTAL_ORIGIN")]
    pub(crate) origin: String,

    #[arg(long, default_value = DEFAULT_USER_AGENT, env = "PORTAL_USER_AGENT")]
    pub(crate) user_agent: String,

    #[arg(long, default_value = DEFAULT_APP_VERSION, env = "PORTAL_APP_VERSION")]
    pub(crate) app_version: String,

    #[arg(long, default_value = OUTPUT_PATH, env = "OUTPUT_PATH")]
    pub(crate) output_path: String,

    #[arg(long, default_value = LOG_DIR, env = "LOG_DIR")]
    pub(crate) log_dir: String,
}

/// Login pair sent as the JSON body of the portal login request.
#[derive(Serialize, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Config {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// Builds the browser-like header bundle the portal expects on every request.
    ///
    /// # Returns
    /// A Result containing either the [`HeaderMap`] or an [`Error`] when a configured
    /// value is not a valid header value.
    pub fn headers(&self) -> Result<HeaderMap, Error> {
        let referer = format!("{}/", self.origin.trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ORIGIN, HeaderValue::from_str(&self.origin)?);
        headers.insert(REFERER, HeaderValue::from_str(&referer)?);
        headers.insert(USER_AGENT, HeaderValue::from_str(&self.user_agent)?);

        let static_headers = [
            ("priority", "u=1, i"),
            (
                "sec-ch-ua",
                "\"Chromium\";v=\"128\", \"Not;A=Brand\";v=\"24\", \"Google Chrome\";v=\"128\"",
            ),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", "\"Windows\""),
            ("sec-fetch-dest", "empty"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-site", "cross-site"),
            ("x-app-name", APP_NAME),
        ];
        for (name, value) in static_headers {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        headers.insert(
            HeaderName::from_static("x-app-version"),
            HeaderValue::from_str(&self.app_version)?,
        );

        Ok(headers)
    }
}

pub(crate) fn validate_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|err| format!("Invalid date '{}', expected YYYY-MM-DD: {}", s, err))
}

#[cfg(test)]
impl Config {
    /// Config pointing both portal hosts at `base_url`, as a mock server would.
    pub(crate) fn for_base_url(base_url: &str, output_path: &str) -> Self {
        Config {
            auth_url: base_url.to_string(),
            campaign_url: base_url.to_string(),
            username: "merchant@example.com".to_string(),
            password: "secret".to_string(),
            ended_after: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            origin: DEFAULT_ORIGIN.to_string(),
            user_agent: "campaign-export-tests".to_string(),
            app_version: DEFAULT_APP_VERSION.to_string(),
            output_path: output_path.to_string(),
            log_dir: "./log_file".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_date() {
        assert_eq!(
            validate_date("2024-01-01"),
            Ok(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
        assert!(validate_date("2024-13-01").is_err());
        assert!(validate_date("2024-02-30").is_err());
        assert!(validate_date("yesterday").is_err());
        assert!(validate_date("2024-01-01T00:00").is_err());
    }

    #[test]
    fn test_headers_bundle() {
        let config = Config::for_base_url("http://localhost", "out.csv");
        let headers = config.headers().unwrap();

        assert_eq!(headers[ORIGIN], DEFAULT_ORIGIN);
        assert_eq!(headers[REFERER], "https://partner-app.hungerstation.com/");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers["x-app-name"], "one-web");
        assert_eq!(headers["x-app-version"], DEFAULT_APP_VERSION);
        assert_eq!(headers[USER_AGENT], "campaign-export-tests");
    }

    #[test]
    fn test_headers_reject_invalid_value() {
        let mut config = Config::for_base_url("http://localhost", "out.csv");
        config.user_agent = "bad\nagent".to_string();

        assert!(matches!(config.headers(), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let config = Config::for_base_url("http://localhost", "out.csv");
        let printed = format!("{:?}", config.credentials());

        assert!(printed.contains("merchant@example.com"));
        assert!(!printed.contains("secret"));
    }
}
