use std::time::Duration;

use chrono::Local;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

use crate::config::{Endpoint, FetchConfig};
use crate::models::ActivityMap;
use crate::payload::ActivityPayload;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request url: {0}")]
    Url(String),
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected payload: {0}")]
    Schema(String),
}

pub fn build_client(timeout: Duration) -> Result<Client, FetchError> {
    Client::builder()
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(FetchError::Transport)
}

pub fn endpoint_url(base: &Url, endpoint: &Endpoint) -> Result<Url, FetchError> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| FetchError::Url(format!("{base} cannot be used as a base url")))?;
        segments.pop_if_empty();
        match endpoint {
            Endpoint::Profile { user, .. } => {
                segments.extend(["users", user.as_str(), "profile"]);
            }
            Endpoint::Results { .. } => {
                segments.push("results");
            }
            Endpoint::TestActivity => {
                segments.extend(["users", "currentTestActivity"]);
            }
        }
    }
    match endpoint {
        Endpoint::Profile { is_uid: true, .. } => {
            url.query_pairs_mut().append_pair("isUid", "true");
        }
        Endpoint::Results { limit: Some(limit) } => {
            url.query_pairs_mut()
                .append_pair("limit", &limit.to_string());
        }
        _ => {}
    }
    Ok(url)
}

fn auth_headers(api_key: Option<&str>) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    if let Some(key) = api_key {
        let mut value = HeaderValue::from_str(&format!("ApeKey {key}"))
            .map_err(|err| FetchError::Url(format!("api key is not a valid header value: {err}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

pub async fn fetch_payload(
    client: &Client,
    config: &FetchConfig,
) -> Result<ActivityPayload, FetchError> {
    let url = endpoint_url(&config.base_url, &config.endpoint)?;
    tracing::info!(%url, endpoint = config.endpoint.name(), "fetching typing activity");

    let response = client
        .get(url)
        .headers(auth_headers(config.api_key.as_deref())?)
        .send()
        .await?;
    let status = response.status();
    tracing::info!(status = status.as_u16(), "api responded");

    let body = response.text().await?;
    if !status.is_success() {
        return Err(FetchError::Status { status, body });
    }

    let body: serde_json::Value = serde_json::from_str(&body)?;
    let payload = ActivityPayload::from_body(body)?;
    tracing::debug!(shape = payload.kind(), "decoded upstream payload");
    Ok(payload)
}

/// Runs one fetch and converts every failure into an empty map.
pub async fn fetch_activity(client: &Client, config: &FetchConfig) -> ActivityMap {
    if config.api_key.is_none() {
        tracing::warn!("no api key configured; requesting public data only");
    }

    let result = match fetch_payload(client, config).await {
        Ok(payload) => payload.into_activity(&Local),
        Err(err) => Err(err),
    };

    match result {
        Ok(activity) => {
            tracing::info!(
                days = activity.len(),
                tests = activity.total_tests(),
                "activity collected"
            );
            activity
        }
        Err(err) => {
            tracing::warn!(error = %err, "could not collect typing activity");
            ActivityMap::default()
        }
    }
}
