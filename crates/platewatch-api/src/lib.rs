// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use platewatch_app::{
    Car, CarUpdate, Coordinates, DeleteRequest, FilterCriteria, LookupRequest, LookupResult,
    MakeCount, StatusReply,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::{Url, form_urlencoded};

/// Blocking client for the car inventory backend.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Option<Duration>,
    http: HttpClient,
}

impl Client {
    /// `timeout` of `None` waits for the backend indefinitely.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = validate_base_url(base_url)?;
        let http = HttpClient::builder()
            .timeout(timeout)
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

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn list_cars(&self, criteria: &FilterCriteria) -> Result<Vec<Car>> {
        let query = criteria.to_query_string();
        let path = if query.is_empty() {
            "/api/cars".to_owned()
        } else {
            format!("/api/cars?{query}")
        };
        self.get_json(&path, "car list")
    }

    pub fn list_unknown_cars(&self) -> Result<Vec<Car>> {
        self.get_json("/api/unknown_cars", "unknown car list")
    }

    pub fn first_car_location(&self) -> Result<Coordinates> {
        self.get_json("/api/first_car_location", "first car location")
    }

    pub fn list_makes(&self) -> Result<Vec<MakeCount>> {
        self.get_json("/api/makes", "make list")
    }

    pub fn list_models(&self, make: Option<&str>) -> Result<Vec<String>> {
        let path = match make.filter(|make| !make.is_empty()) {
            Some(make) => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("make", make)
                    .finish();
                format!("/api/models?{query}")
            }
            None => "/api/models".to_owned(),
        };
        self.get_json(&path, "model list")
    }

    pub fn list_years(&self) -> Result<Vec<i32>> {
        self.get_json("/api/years", "year list")
    }

    pub fn list_states(&self) -> Result<Vec<String>> {
        self.get_json("/api/states", "state list")
    }

    pub fn update_car(&self, update: &CarUpdate) -> Result<()> {
        self.post_status("/api/update_car", update, "update")?;
        tracing::info!(id = %update.id, "car updated");
        Ok(())
    }

    pub fn delete_car(&self, request: &DeleteRequest) -> Result<()> {
        self.post_status("/api/delete_car", request, "delete")?;
        tracing::info!(id = %request.id, "car deleted");
        Ok(())
    }

    pub fn refresh_car(&self, request: &LookupRequest) -> Result<LookupResult> {
        let reply = self.post_status("/api/refresh_car", request, "lookup")?;
        Ok(reply.lookup_result())
    }

    /// Absolute URL of a clip, each path segment percent-encoded.
    pub fn video_url(&self, video_path: &str) -> Result<String> {
        video_url(&self.base_url, video_path)
    }

    /// Cheapest round trip the backend offers.
    pub fn ping(&self) -> Result<()> {
        self.list_years().map(|_| ())
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "GET");
        let response = self.send(self.http.get(&url))?;
        response
            .json()
            .with_context(|| format!("decode {what} from {url}"))
    }

    fn post_status<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<StatusReply> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "POST");
        let response = self.send(self.http.post(&url).json(body))?;
        let reply: StatusReply = response
            .json()
            .with_context(|| format!("decode {what} reply from {url}"))?;
        if !reply.is_success() {
            let reason = reply
                .message
                .as_deref()
                .filter(|message| !message.trim().is_empty())
                .unwrap_or("no message");
            tracing::warn!(%url, status = %reply.status, reason, "backend rejected {what}");
            bail!("{what} failed: {reason}");
        }
        Ok(reply)
    }

    fn send(&self, request: RequestBuilder) -> Result<reqwest::blocking::Response> {
        let response = request.send().map_err(|error| {
            tracing::warn!(base_url = %self.base_url, %error, "request failed");
            connection_error(&self.base_url, error)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "backend returned an error status");
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }
}

/// Trims trailing slashes and insists on an absolute http(s) URL.
pub fn validate_base_url(raw: &str) -> Result<String> {
    let base_url = raw.trim().trim_end_matches('/').to_owned();
    if base_url.is_empty() {
        bail!("server.base_url must not be empty");
    }
    let parsed = Url::parse(&base_url)
        .with_context(|| format!("server.base_url {base_url:?} is not a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!(
            "server.base_url must use http or https, got {:?}",
            parsed.scheme()
        );
    }
    Ok(base_url)
}

pub fn video_url(base_url: &str, video_path: &str) -> Result<String> {
    let mut url = Url::parse(base_url)
        .with_context(|| format!("server.base_url {base_url:?} is not a valid URL"))?;
    let segments = video_path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>();
    if segments.is_empty() {
        bail!("video path {video_path:?} is empty");
    }
    url.path_segments_mut()
        .map_err(|()| anyhow!("base url {base_url} cannot carry a path"))?
        .pop_if_empty()
        .push("videos")
        .extend(segments);
    Ok(url.to_string())
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!(
            "{} did not answer in time -- raise [server].timeout or check the backend ({})",
            base_url,
            error
        );
    }
    anyhow!(
        "cannot reach {} -- is the backend running? ({})",
        base_url,
        error
    )
}

#[derive(Debug, Deserialize)]
struct MessageEnvelope {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<String>,
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<MessageEnvelope>(body)
        && let Some(message) = parsed.message
        && !message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), error);
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains(['{', '<']) {
        return anyhow!("server error ({}): {}", status.as_u16(), trimmed);
    }

    anyhow!("server returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::{Client, clean_error_response, video_url};
    use anyhow::Result;
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn error_message_envelope_is_unwrapped() {
        let error = clean_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"status":"error","message":"database is locked"}"#,
        );
        assert_eq!(error.to_string(), "server error (500): database is locked");
    }

    #[test]
    fn error_field_envelope_is_unwrapped() {
        let error = clean_error_response(StatusCode::NOT_FOUND, r#"{"error":"no such car"}"#);
        assert_eq!(error.to_string(), "server error (404): no such car");
    }

    #[test]
    fn html_bodies_are_not_echoed() {
        let error = clean_error_response(
            StatusCode::BAD_GATEWAY,
            "<html><body>Bad Gateway</body></html>",
        );
        assert_eq!(error.to_string(), "server returned 502");
        let short = clean_error_response(StatusCode::BAD_REQUEST, "bad year\n");
        assert_eq!(short.to_string(), "server error (400): bad year");
    }

    #[test]
    fn video_url_encodes_segments() -> Result<()> {
        assert_eq!(
            video_url("http://cam.local:5000", "clips/2024 05/a#1.mp4")?,
            "http://cam.local:5000/videos/clips/2024%2005/a%231.mp4"
        );
        assert_eq!(
            video_url("http://cam.local/base/", "/../x.mp4")?,
            "http://cam.local/base/videos/x.mp4"
        );
        assert!(video_url("http://cam.local", "").is_err());
        Ok(())
    }

    #[test]
    fn base_url_is_validated() {
        assert!(Client::new("", None).is_err());
        assert!(Client::new("cam.local:5000", None).is_err());
        assert!(Client::new("ftp://cam.local", None).is_err());
        let client = Client::new("http://cam.local:5000/", Some(Duration::from_secs(3)))
            .expect("client should initialize");
        assert_eq!(client.base_url(), "http://cam.local:5000");
        assert_eq!(client.timeout(), Some(Duration::from_secs(3)));
    }
}
