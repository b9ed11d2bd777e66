//! In-process sender: a fresh reqwest client (and with it a fresh cookie jar)
//! per request, the shared redirect/timeout/TLS policy, and duplicate-capable
//! header appends for the bypass headers that are sent twice.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, USER_AGENT};
use reqwest::redirect;

use crate::error::TransportError;
use crate::records::{Record, MAX_REDIRECTS};

use super::{split_header_line, Reply, Sender};

pub struct LibrarySender {
    pub connect_timeout: u64,
    pub read_timeout: u64,
}

#[async_trait]
impl Sender for LibrarySender {
    async fn send(&self, record: &Record) -> Result<Reply, TransportError> {
        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .connect_timeout(Duration::from_secs(self.connect_timeout))
            .timeout(Duration::from_secs(self.connect_timeout + self.read_timeout))
            .danger_accept_invalid_hostnames(true)
            .danger_accept_invalid_certs(true);
        if let Some(proxy) = record.proxy.as_deref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        let client = builder.build()?;

        let method = reqwest::Method::from_bytes(record.method.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(record.method.clone()))?;
        let mut request_builder = client.request(method, &record.url);
        if let Some(body) = record.body.as_deref() {
            request_builder = request_builder.body(body.to_string());
        }
        let mut request = request_builder.build()?;

        // custom header lines override the per-record user agent
        let custom_user_agent = record
            .headers
            .iter()
            .any(|line| line.to_lowercase().starts_with("user-agent"));
        if !custom_user_agent && !record.user_agent.is_empty() {
            let value = HeaderValue::from_str(&record.user_agent)
                .map_err(|_| TransportError::InvalidHeader(record.user_agent.clone()))?;
            request.headers_mut().insert(USER_AGENT, value);
        }
        for line in &record.headers {
            let (key, value) = split_header_line(line)?;
            let name = HeaderName::from_str(&key)
                .map_err(|_| TransportError::InvalidHeader(line.clone()))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|_| TransportError::InvalidHeader(line.clone()))?;
            request.headers_mut().append(name, value);
        }

        let response = client.execute(request).await?;
        let code = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();
        Ok(Reply {
            code,
            length: body.len(),
            headers,
            body,
        })
    }
}
