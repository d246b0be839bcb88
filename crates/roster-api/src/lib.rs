// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use roster_app::{ApiError, User, UserDirectory, UserUpdate};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5173/api";
pub const DEFAULT_API_KEY: &str = "secret_api_key";
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?}",
                parsed.scheme()
            );
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(api_key)
                .context("api.api_key contains characters not allowed in a header")?,
        );

        let http = HttpClient::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `{base}/users/search`, with `name` only when it is non-blank.
    pub fn search_url(&self, name: Option<&str>) -> Result<Url, ApiError> {
        let mut url = self.endpoint("users/search")?;
        if let Some(name) = name.map(str::trim)
            && !name.is_empty()
        {
            url.query_pairs_mut().append_pair("name", name);
        }
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Url::parse(&format!("{}/{path}", self.base_url))
            .map_err(|error| ApiError::new(format!("invalid request URL: {error}")))
    }

    fn execute(&self, request: RequestBuilder, url: &Url) -> Result<Vec<User>, ApiError> {
        let response = request.send().map_err(|error| {
            warn!(url = %url, error = %error, "request did not reach the API");
            connection_error(&self.base_url)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), url = %url, "API returned an error");
            return Err(clean_error_response(status, &body));
        }

        let body = response.text().map_err(|error| {
            warn!(url = %url, error = %error, "failed to read API response body");
            read_error(&error)
        })?;

        let users = decode_users(&body)?;
        debug!(url = %url, count = users.len(), "API response decoded");
        Ok(users)
    }
}

impl UserDirectory for Client {
    fn search_users(&self, name: Option<&str>) -> Result<Vec<User>, ApiError> {
        let url = self.search_url(name)?;
        self.execute(self.http.get(url.clone()), &url)
    }

    fn update_user(&self, update: &UserUpdate) -> Result<User, ApiError> {
        self.update_users(std::slice::from_ref(update))?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::new("The server returned no user for the update."))
    }

    fn update_users(&self, batch: &[UserUpdate]) -> Result<Vec<User>, ApiError> {
        let url = self.endpoint("users/update")?;
        self.execute(self.http.post(url.clone()).json(batch), &url)
    }
}

/// Accepts a bare array or a `{"data": [...]}` envelope. Any other JSON
/// shape yields no users.
pub fn decode_users(body: &str) -> Result<Vec<User>, ApiError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|error| ApiError::new(format!("Invalid response from server: {error}")))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut fields) => match fields.remove("data") {
            Some(Value::Array(items)) => items,
            _ => return Ok(Vec::new()),
        },
        _ => return Ok(Vec::new()),
    };

    serde_json::from_value(Value::Array(items))
        .map_err(|error| ApiError::new(format!("Invalid user in server response: {error}")))
}

fn connection_error(base_url: &str) -> ApiError {
    ApiError::new(format!(
        "Network error. Please check your connection and ensure the API is reachable at {base_url}."
    ))
}

fn read_error(error: &dyn std::fmt::Display) -> ApiError {
    ApiError::new(format!("Failed to read response from server: {error}"))
}

fn clean_error_response(status: StatusCode, body: &str) -> ApiError {
    let code = status.as_u16();
    let message = match status {
        StatusCode::UNAUTHORIZED => "Unauthorized access. Please check your credentials.".to_owned(),
        StatusCode::FORBIDDEN => "Access forbidden. Invalid API key.".to_owned(),
        StatusCode::NOT_FOUND => "Resource not found.".to_owned(),
        StatusCode::INTERNAL_SERVER_ERROR => {
            "Internal server error. Please try again later.".to_owned()
        }
        _ => body_message(body).unwrap_or_else(|| {
            format!(
                "HTTP {code}: {}",
                status.canonical_reason().unwrap_or("Unknown Status")
            )
        }),
    };
    ApiError::with_status(code, message)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<Value>,
    error: Option<Value>,
}

fn body_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok()?;
    [parsed.message, parsed.error]
        .into_iter()
        .flatten()
        .find_map(|value| match value {
            Value::String(text) if !text.is_empty() => Some(text),
            Value::Null | Value::String(_) => None,
            other => Some(other.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::{Client, body_message, clean_error_response, decode_users};
    use anyhow::Result;
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn decode_accepts_bare_and_enveloped_arrays() -> Result<()> {
        let bare = decode_users(r#"[{"id":1,"username":"a","email":"a@x","birthdate":"2000-01-01"}]"#)?;
        assert_eq!(bare.len(), 1);

        let wrapped = decode_users(r#"{"data":[{"id":2,"username":"b","email":null}]}"#)?;
        assert_eq!(wrapped[0].username, "b");
        assert_eq!(wrapped[0].email, "");
        Ok(())
    }

    #[test]
    fn decode_other_shapes_as_empty() -> Result<()> {
        assert!(decode_users(r#"{"users":[]}"#)?.is_empty());
        assert!(decode_users(r#"{"data":"nope"}"#)?.is_empty());
        assert!(decode_users("42")?.is_empty());
        assert!(decode_users("not json").is_err());
        Ok(())
    }

    #[test]
    fn status_codes_map_to_fixed_messages() {
        let cases = [
            (StatusCode::UNAUTHORIZED, "Unauthorized access. Please check your credentials."),
            (StatusCode::FORBIDDEN, "Access forbidden. Invalid API key."),
            (StatusCode::NOT_FOUND, "Resource not found."),
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error. Please try again later.",
            ),
        ];
        for (status, expected) in cases {
            let error = clean_error_response(status, r#"{"message":"ignored"}"#);
            assert_eq!(error.message, expected);
            assert_eq!(error.status, Some(status.as_u16()));
        }
    }

    #[test]
    fn other_statuses_prefer_body_message() {
        let error = clean_error_response(StatusCode::BAD_REQUEST, r#"{"error":"bad birthdate"}"#);
        assert_eq!(error.message, "bad birthdate");

        let error = clean_error_response(StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(error.message, "HTTP 502: Bad Gateway");

        assert_eq!(body_message(r#"{"message":"","error":"x"}"#).as_deref(), Some("x"));
    }

    #[test]
    fn client_rejects_bad_base_urls() {
        assert!(Client::new("", "k", Duration::from_secs(1)).is_err());
        assert!(Client::new("not a url", "k", Duration::from_secs(1)).is_err());
        assert!(Client::new("ftp://host/api", "k", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn search_url_trims_and_encodes_name() -> Result<()> {
        let client = Client::new("http://localhost:5173/api/", "k", Duration::from_secs(1))?;
        assert_eq!(client.base_url(), "http://localhost:5173/api");
        assert_eq!(
            client.search_url(Some("  ann lee "))?.as_str(),
            "http://localhost:5173/api/users/search?name=ann+lee"
        );
        assert_eq!(
            client.search_url(Some("   "))?.as_str(),
            "http://localhost:5173/api/users/search"
        );
        Ok(())
    }
}
