use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;

const REQUEST_TIMEOUT_SECS: u64 = 10;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// Adds the project key and bearer token every store request carries.
pub fn with_store_headers(req: RequestBuilder, api_key: &str, bearer: &str) -> RequestBuilder {
    req.header(USER_AGENT, concat!("cadet_rating/", env!("CARGO_PKG_VERSION")))
        .header("apikey", api_key)
        .header(AUTHORIZATION, format!("Bearer {bearer}"))
        .header(ACCEPT, "application/json")
        .header(CONTENT_TYPE, "application/json")
}

/// Reads the body and turns a non-2xx status into an error carrying the service message.
pub fn read_body(resp: Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow!("http {}: {}", status.as_u16(), error_message(&body)));
    }
    Ok(body)
}

/// Picks the human-readable part of an error payload, or the raw body.
pub fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    for key in ["error_description", "msg", "message", "error"] {
        if let Some(text) = value.get(key).and_then(Value::as_str) {
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }
    body.trim().to_string()
}
