//! National Weather Service active-alerts feed client.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use fire_alerts::{AlertRecord, AlertSource, HazardFilter};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::FeedConfig;
use crate::error::{BotError, BotResult};

const GEO_JSON: &str = "application/geo+json";

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Value>,
}

/// Fetches active alerts from the NWS feed.
#[derive(Debug, Clone)]
pub struct NwsClient {
    http: reqwest::Client,
    url: Url,
    filter: HazardFilter,
    server_side_filter: bool,
}

impl NwsClient {
    /// Creates a client from the feed configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// built.
    pub fn new(config: &FeedConfig) -> BotResult<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| BotError::Config(format!("invalid feed url {}: {e}", config.url)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GEO_JSON));

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url,
            filter: config.filter(),
            server_side_filter: config.server_side_filter,
        })
    }

    /// Returns the hazard filter applied to fetched alerts.
    #[must_use]
    pub const fn filter(&self) -> &HazardFilter {
        &self.filter
    }

    /// Returns the URL a fetch will request.
    #[must_use]
    pub fn request_url(&self) -> Url {
        let mut url = self.url.clone();
        if self.server_side_filter {
            url.query_pairs_mut()
                .append_pair("event", &self.filter.event_types().join(","));
        }
        url
    }

    /// Fetches and filters the active alerts, reporting failures.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a body
    /// that is not a feature collection.
    pub async fn try_fetch(&self) -> BotResult<Vec<AlertRecord>> {
        let url = self.request_url();
        let response = self.http.get(url.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Feed(format!("NWS API returned {status}")));
        }

        let body = response.text().await?;
        let alerts = parse_collection(&body, &self.filter)?;
        debug!(url = %url, matched = alerts.len(), "fetched active alerts");
        Ok(alerts)
    }
}

impl AlertSource for NwsClient {
    fn fetch<'a>(&'a self) -> Pin<Box<dyn Future<Output = Vec<AlertRecord>> + Send + 'a>> {
        Box::pin(async move {
            match self.try_fetch().await {
                Ok(alerts) => alerts,
                Err(e) => {
                    warn!(error = %e, "error fetching NWS alerts");
                    Vec::new()
                }
            }
        })
    }
}

/// Parses a feed response body into the alerts that pass `filter`.
///
/// Features whose `properties` cannot be read as an alert are skipped.
///
/// # Errors
///
/// Returns an error if the body is not a JSON object with a `features` list.
pub fn parse_collection(body: &str, filter: &HazardFilter) -> BotResult<Vec<AlertRecord>> {
    let collection: FeatureCollection = serde_json::from_str(body)
        .map_err(|e| BotError::Feed(format!("unreadable feed response: {e}")))?;

    let mut alerts = Vec::with_capacity(collection.features.len());
    for mut feature in collection.features {
        let properties = feature
            .get_mut("properties")
            .map(Value::take)
            .unwrap_or(Value::Null);
        match serde_json::from_value::<AlertRecord>(properties) {
            Ok(alert) => alerts.push(alert),
            Err(e) => debug!(error = %e, "skipping malformed feature"),
        }
    }

    Ok(filter.apply(alerts))
}
