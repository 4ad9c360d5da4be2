use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::RateMeta;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Decoded body of one successful GET plus the paging and quota headers that came with it.
#[derive(Debug, Clone)]
pub struct RestResponse<T> {
    pub value: T,
    pub rate: RateMeta,
    pub next_page: Option<u32>,
    pub status: StatusCode,
}

pub fn build_client(cfg: &Config) -> Result<Client> {
    let mut default_headers = HeaderMap::new();
    let ua = HeaderValue::from_str(&cfg.user_agent)
        .map_err(|e| Error::Config(format!("invalid user agent: {}", e)))?;
    default_headers.insert(USER_AGENT, ua);
    // Authorization header is injected per request.
    let client = Client::builder()
        .default_headers(default_headers)
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .use_rustls_tls()
        .build()?;
    Ok(client)
}

fn auth_header(token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| Error::Config("token contains characters not allowed in a header".into()))
}

pub fn map_status_to_error(status: StatusCode, message: String) -> Error {
    let code = match status {
        StatusCode::BAD_REQUEST => "bad_request",
        StatusCode::UNAUTHORIZED => "unauthorized",
        StatusCode::FORBIDDEN => "forbidden",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::CONFLICT => "conflict",
        StatusCode::TOO_MANY_REQUESTS => "rate_limited",
        s if s.is_server_error() => "upstream_error",
        _ => "server_error",
    };
    Error::Api {
        status: status.as_u16(),
        code: code.to_string(),
        message,
    }
}

fn header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u32>().ok())
}

pub fn extract_rate_from_rest(headers: &HeaderMap) -> RateMeta {
    let reset_at = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|epoch| DateTime::<Utc>::from_timestamp(epoch, 0));
    RateMeta {
        limit: header_u32(headers, "x-ratelimit-limit"),
        remaining: header_u32(headers, "x-ratelimit-remaining"),
        used: header_u32(headers, "x-ratelimit-used"),
        reset_at,
    }
}

pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Pause used when a rate-limit rejection names neither `Retry-After` nor a future reset.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// When a failed response is a rate-limit rejection, the instant the request may be repeated.
///
/// Every 429 is a rate limit. A 403 is one only with `x-ratelimit-remaining: 0` (primary limit)
/// or `Retry-After` (secondary limit); otherwise it is a plain permission failure.
pub fn rate_limit_reset(
    status: StatusCode,
    rate: &RateMeta,
    retry_after: Option<Duration>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }
    if let Some(wait) = retry_after {
        let wait = chrono::Duration::from_std(wait).ok()?;
        return Some(now + wait);
    }
    if status == StatusCode::TOO_MANY_REQUESTS || rate.is_exhausted() {
        let fallback = now + chrono::Duration::seconds(DEFAULT_RATE_LIMIT_WAIT.as_secs() as i64);
        return Some(rate.reset_at.filter(|r| *r > now).unwrap_or(fallback));
    }
    None
}

/// Page number carried by the `rel="next"` entry of a `Link` header.
pub fn next_page_from_link(headers: &HeaderMap) -> Option<u32> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == "rel=\"next\"") {
            return None;
        }
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');
        let url = Url::parse(target).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse::<u32>().ok())
            .filter(|p| *p > 0)
    })
}

pub fn encode_path_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// GET `path` (relative to the API root) with the given query and decode the JSON body.
///
/// Rate-limit rejections come back as `Error::RateLimited`; every other non-success status is
/// mapped through `map_status_to_error`. Nothing is retried here.
pub async fn rest_get_json<T: DeserializeOwned>(
    client: &Client,
    cfg: &Config,
    path: &str,
    query: &[(&str, String)],
) -> Result<RestResponse<T>> {
    let url = format!("{}{}", cfg.api_url, path);
    debug!("GET {} {:?}", url, query);
    let res = client
        .get(&url)
        .query(query)
        .header(AUTHORIZATION, auth_header(&cfg.token)?)
        .header("X-GitHub-Api-Version", &cfg.api_version)
        .header(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        )
        .send()
        .await?;

    let status = res.status();
    let headers = res.headers().clone();
    let rate = extract_rate_from_rest(&headers);

    if status.is_success() {
        let text = res.text().await?;
        let value = serde_json::from_str::<T>(&text)?;
        return Ok(RestResponse {
            value,
            next_page: next_page_from_link(&headers),
            rate,
            status,
        });
    }

    if let Some(reset_at) = rate_limit_reset(status, &rate, retry_after(&headers), Utc::now()) {
        warn!("GET {} rate limited (status {}), reset at {}", url, status, reset_at);
        return Err(Error::RateLimited { reset_at });
    }

    let text = res.text().await.unwrap_or_default();
    Err(map_status_to_error(status, text))
}
