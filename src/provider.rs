/*
 *  provider.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Schedule and lunch service client
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use async_trait::async_trait;
use flate2::read::GzDecoder;
use log::debug;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::io::Read;
use std::time::Duration;
use thiserror::Error;

use crate::token::AuthToken;

const SCHEDULE_ROUTE: &str = "/schedule/get";
const LUNCH_ROUTE: &str = "/lunch/get";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{route} answered {status}")]
    Status { route: &'static str, status: StatusCode },
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The remote schedule/lunch service. Payloads are returned raw; parsing
/// (and tolerating bad shapes) is up to the caller.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn fetch_schedule(&self, token: &AuthToken) -> Result<Value, ProviderError>;

    async fn fetch_lunch(&self) -> Result<Value, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct HttpDataProvider {
    base_url: String,
    client: Client,
}

impl HttpDataProvider {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        const VERSION: &str = concat!("SchoolRing ", env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(VERSION));
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post(&self, route: &'static str, token: Option<&AuthToken>) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.base_url, route);
        debug!("POST {}", url);

        let mut request = self.client.post(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token.as_str());
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { route, status });
        }

        let raw = response.bytes().await?;
        let plain = decode_body(&raw);
        Ok(serde_json::from_str(&plain)?)
    }
}

#[async_trait]
impl DataProvider for HttpDataProvider {
    async fn fetch_schedule(&self, token: &AuthToken) -> Result<Value, ProviderError> {
        self.post(SCHEDULE_ROUTE, Some(token)).await
    }

    async fn fetch_lunch(&self) -> Result<Value, ProviderError> {
        self.post(LUNCH_ROUTE, None).await
    }
}

/// Gunzips the body when it is gzip, otherwise reads it as UTF-8.
fn decode_body(raw: &[u8]) -> String {
    let mut decoder = GzDecoder::new(raw);
    let mut decoded = String::new();
    match decoder.read_to_string(&mut decoded) {
        Ok(_) => decoded,
        Err(_) => String::from_utf8_lossy(raw).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_plain_body() {
        assert_eq!(decode_body(br#"{"lunch":{}}"#), r#"{"lunch":{}}"#);
    }

    #[test]
    fn test_gzip_body() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"schedule":null}"#).unwrap();
        let gz = encoder.finish().unwrap();
        assert_eq!(decode_body(&gz), r#"{"schedule":null}"#);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = HttpDataProvider::new(
            "http://localhost:8080/",
            Duration::from_millis(100),
            Duration::from_millis(100),
        )
        .unwrap();
        assert_eq!(provider.base_url, "http://localhost:8080");
    }
}
