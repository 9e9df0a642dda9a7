use crate::config::Settings;
use crate::domain::stock::{OwnedSecurity, StockListing};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_SECURITIES_PATH: &str = "/securities";
const DEFAULT_PORTFOLIO_PATH: &str = "/portfolio";

/// Session handle returned by the platform after a successful login.
///
/// The platform redirects to a URL carrying `suid` (session user id) and
/// `aut` (auth token) as query parameters; both must be echoed on every
/// authenticated request.
#[derive(Debug, Clone)]
pub struct PlatformSession {
    pub session_id: String,
    pub auth_token: String,
}

#[derive(Debug)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    login_path: String,
    securities_path: String,
    portfolio_path: String,
    retries: u32,
}

impl PlatformClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_platform_base_url()?.to_string();

        let timeout_secs = std::env::var("PLATFORM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("PLATFORM_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .cookie_store(true)
            .build()
            .context("failed to build platform http client")?;

        Ok(Self {
            http,
            base_url,
            username: settings.platform_username.clone(),
            password: settings.platform_password.clone(),
            login_path: path_from_env("PLATFORM_LOGIN_PATH", DEFAULT_LOGIN_PATH),
            securities_path: path_from_env("PLATFORM_SECURITIES_PATH", DEFAULT_SECURITIES_PATH),
            portfolio_path: path_from_env("PLATFORM_PORTFOLIO_PATH", DEFAULT_PORTFOLIO_PATH),
            retries,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    fn url(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Posts the credential form and extracts the session from the post-login
    /// redirect URL.
    pub async fn login(&self) -> Result<PlatformSession> {
        let username = self.username.as_deref().context("PLATFORM_USERNAME is required")?;
        let password = self.password.as_deref().context("PLATFORM_PASSWORD is required")?;

        let url = self.url(&self.login_path);
        let form = [("txt_email", username), ("txt_password", password)];

        let res = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .context("platform login request failed")?;

        let status = res.status();
        let final_url = res.url().clone();
        if !status.is_success() {
            anyhow::bail!("platform login HTTP {status}");
        }

        session_from_redirect(&final_url)
            .context("login succeeded but the redirect carried no session; check credentials")
    }

    /// Fetches the instrument catalog. Works without a session; passing one
    /// scopes the catalog to the logged-in contest.
    pub async fn fetch_catalog(
        &self,
        session: Option<&PlatformSession>,
    ) -> Result<Vec<StockListing>> {
        let url = self.url(&self.securities_path);
        let query = session_query(session);

        let entries: Vec<CatalogEntry> = self
            .fetch_json(&url, &query)
            .await
            .context("failed to fetch platform catalog")?;

        // The platform pads its symbol dropdown with an empty 0th entry.
        let listings: Vec<StockListing> = entries
            .into_iter()
            .filter(|e| !e.id.trim().is_empty())
            .map(|e| StockListing {
                symbol: e.id.trim().to_string(),
                name: e.name.trim().to_string(),
            })
            .collect();

        Ok(listings)
    }

    /// Fetches the securities currently owned by the logged-in user.
    ///
    /// Rows with missing or unparsable fields are skipped, not fatal.
    pub async fn fetch_portfolio(&self, session: &PlatformSession) -> Result<Vec<OwnedSecurity>> {
        let url = self.url(&self.portfolio_path);
        let query = session_query(Some(session));

        let rows: Vec<PortfolioRow> = self
            .fetch_json(&url, &query)
            .await
            .context("failed to fetch owned securities")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_owned_security() {
                Some(sec) => out.push(sec),
                None => tracing::warn!("skipping portfolio row with missing fields"),
            }
        }
        Ok(out)
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let res = self.http.get(url).query(query).send().await;
            let res = match res {
                Ok(r) => r,
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err).context("platform request failed");
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, error = %err, "platform request failed; retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            };

            let status = res.status();
            let text = res
                .text()
                .await
                .context("failed to read platform response")?;

            if !status.is_success() {
                let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                if retryable && attempt < self.retries {
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, http_status = %status, "platform HTTP error; retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                anyhow::bail!("platform HTTP {status}: {text}");
            }

            return serde_json::from_str::<T>(&text)
                .with_context(|| format!("platform response is not valid JSON: {text}"));
        }
    }
}

fn path_from_env(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn session_query(session: Option<&PlatformSession>) -> Vec<(&'static str, String)> {
    match session {
        Some(s) => vec![
            ("suid", s.session_id.clone()),
            ("aut", s.auth_token.clone()),
        ],
        None => Vec::new(),
    }
}

fn session_from_redirect(url: &Url) -> Result<PlatformSession> {
    let mut session_id = None;
    let mut auth_token = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "suid" => session_id = Some(v.into_owned()),
            "aut" => auth_token = Some(v.into_owned()),
            _ => {}
        }
    }

    let session_id = session_id
        .filter(|s| !s.is_empty())
        .context("missing suid in login redirect")?;
    let auth_token = auth_token
        .filter(|s| !s.is_empty())
        .context("missing aut in login redirect")?;

    Ok(PlatformSession {
        session_id,
        auth_token,
    })
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PortfolioRow {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
    quantity: Option<NumberOrText>,
    average_price: Option<NumberOrText>,
    current_price: Option<NumberOrText>,
    #[serde(default)]
    gain_loss: String,
}

impl PortfolioRow {
    fn into_owned_security(self) -> Option<OwnedSecurity> {
        let symbol = self.symbol.trim().to_string();
        if symbol.is_empty() {
            return None;
        }

        let quantity = self.quantity?.as_f64()?;
        let average_price = self.average_price?.as_f64()?;
        let current_price = self.current_price?.as_f64()?;

        Some(OwnedSecurity {
            symbol,
            name: self.name.trim().to_string(),
            quantity: quantity as i64,
            average_price,
            current_price,
            gain_loss: self.gain_loss.trim().to_string(),
        })
    }
}

/// The platform reports money either as a number or as a display string
/// ("$1,234.56").
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrText::Number(n) => Some(*n),
            NumberOrText::Text(s) => parse_money(s),
        }
    }
}

fn parse_money(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ','))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_money_display_strings() {
        assert_eq!(parse_money("$1,234.56"), Some(1234.56));
        assert_eq!(parse_money("150.00"), Some(150.0));
        assert_eq!(parse_money(" $12 "), Some(12.0));
        assert_eq!(parse_money(""), None);
        assert_eq!(parse_money("N/A"), None);
    }

    #[test]
    fn extracts_session_from_redirect_query() {
        let url = Url::parse("https://platform.example/home?suid=abc123&aut=tok456").unwrap();
        let session = session_from_redirect(&url).unwrap();
        assert_eq!(session.session_id, "abc123");
        assert_eq!(session.auth_token, "tok456");
    }

    #[test]
    fn rejects_redirect_without_session_params() {
        let url = Url::parse("https://platform.example/login?error=1").unwrap();
        assert!(session_from_redirect(&url).is_err());
    }

    #[test]
    fn catalog_entries_drop_empty_symbols() {
        let v = json!([
            {"id": "", "name": ""},
            {"id": "MMM:EGX", "name": "3M Corp."},
            {"id": "VNP:CA", "name": "5N Plus"}
        ]);
        let entries: Vec<CatalogEntry> = serde_json::from_value(v).unwrap();
        let listings: Vec<StockListing> = entries
            .into_iter()
            .filter(|e| !e.id.trim().is_empty())
            .map(|e| StockListing {
                symbol: e.id.trim().to_string(),
                name: e.name.trim().to_string(),
            })
            .collect();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].symbol, "MMM:EGX");
        assert_eq!(listings[0].name, "3M Corp.");
    }

    #[test]
    fn portfolio_rows_accept_numbers_and_money_strings() {
        let v = json!([
            {
                "symbol": "MMM:EGX",
                "name": "3M Corp.",
                "quantity": 10,
                "average_price": "$120.50",
                "current_price": 130.25,
                "gain_loss": "success"
            },
            {
                "symbol": "BROKEN",
                "name": "Broken Row",
                "quantity": "ten",
                "average_price": 1.0,
                "current_price": 1.0
            }
        ]);
        let rows: Vec<PortfolioRow> = serde_json::from_value(v).unwrap();
        let owned: Vec<OwnedSecurity> = rows
            .into_iter()
            .filter_map(PortfolioRow::into_owned_security)
            .collect();

        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].symbol, "MMM:EGX");
        assert_eq!(owned[0].quantity, 10);
        assert!((owned[0].average_price - 120.50).abs() < 1e-9);
        assert_eq!(owned[0].gain_loss, "success");
    }
}
