//! HTTP fetch primitives: one request with retries, and the pagination-aware
//! multi-page loop built on top of it.
//!
//! The single-request layer owns the retry budget: success statuses return,
//! retriable statuses honor `Retry-After` (delta seconds or HTTP-date) or
//! fall back to exponential backoff, any other status is terminal, and
//! transport errors burn a retry with backoff. The multi-page layer owns the
//! page budget and the strategy-specific next-page computation.

use crate::constants;
use crate::error::Error;
use crate::http::pagination::{
    extract_json_path, value_to_param, Pagination, PaginationStrategy,
};
use reqwest::{Client, Method, Url};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime};
use tokio::time::sleep;
use tracing::debug;

/// Per-fetch budget, combined from the HTTP settings and the per-call
/// timeout carried by the plan.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_pages: usize,
    pub max_retries: usize,
    pub retry_backoff: f64,
}

impl FetchOptions {
    #[must_use]
    pub fn from_settings(settings: &crate::config::HttpSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            max_pages: settings.max_pages,
            max_retries: settings.max_retries,
            retry_backoff: settings.retry_backoff,
        }
    }

    /// Overrides the timeout with a per-call value when the spec carries one.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        if let Some(secs) = timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        self
    }
}

/// One upstream response, reduced to what the pipeline consumes.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    /// Response headers with lowercased names.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl PageResponse {
    async fn from_response(response: reqwest::Response) -> Result<Self, Error> {
        let status = response.status().as_u16();
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_lowercase(), value.to_string());
            }
        }
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Body size as reported by `Content-Length`, else the received length.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.header(constants::HEADER_CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.body.len())
    }

    /// Decodes the body as JSON, enforcing the `application/json` content
    /// type that pagination and dataset extraction require.
    ///
    /// # Errors
    ///
    /// Returns a fetch error for non-JSON content types or malformed bodies.
    pub fn json(&self) -> Result<Value, Error> {
        let content_type = self
            .header(constants::HEADER_CONTENT_TYPE)
            .unwrap_or_default()
            .to_lowercase();
        if !content_type.contains(constants::CONTENT_TYPE_JSON) {
            return Err(Error::unsupported_content_type(content_type));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Everything the multi-page fetch collected, plus its accounting.
#[derive(Debug)]
pub struct FetchedPages {
    pub pages: Vec<PageResponse>,
    pub requests_issued: usize,
    pub may_have_more: bool,
    pub bytes_received: usize,
    pub elapsed: Duration,
}

impl FetchedPages {
    /// Whether the origin answered the conditional request with `304`.
    #[must_use]
    pub fn not_modified(&self) -> bool {
        self.pages.first().is_some_and(|p| p.status == constants::STATUS_NOT_MODIFIED)
    }
}

/// Parses a `Retry-After` value: either delta seconds or an HTTP-date.
/// A date in the past yields `None`.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    if let Ok(date) = httpdate::parse_http_date(value) {
        return date.duration_since(SystemTime::now()).ok();
    }
    None
}

fn backoff_delay(retry_backoff: f64, attempt: usize) -> Duration {
    let exp = i32::try_from(attempt.min(30)).unwrap_or(30);
    Duration::from_secs_f64(retry_backoff * 2f64.powi(exp))
}

/// Issues one request, retrying on retriable statuses and transport errors.
///
/// Returns the first success-set response together with the number of
/// requests issued. Terminal statuses fail immediately; an exhausted retry
/// budget surfaces the last error.
///
/// # Errors
///
/// Returns a fetch error on terminal statuses, exhausted retries, or an
/// invalid URL/header set.
pub async fn send_with_retries(
    client: &Client,
    method: Method,
    url: &str,
    query: &BTreeMap<String, String>,
    headers: &BTreeMap<String, String>,
    body: Option<&Value>,
    options: &FetchOptions,
) -> Result<(PageResponse, usize), Error> {
    let mut requests_issued = 0;
    let mut last_error = String::from("no attempts made");

    for attempt in 0..options.max_retries {
        let mut request = client
            .request(method.clone(), url)
            .timeout(options.timeout);
        if !query.is_empty() {
            request = request.query(query);
        }
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        requests_issued += 1;
        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if constants::is_success_status(status) {
                    let page = PageResponse::from_response(response).await?;
                    return Ok((page, requests_issued));
                }

                if constants::is_retriable_status(status) {
                    let delay = response
                        .headers()
                        .get(constants::HEADER_RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_retry_after)
                        .unwrap_or_else(|| backoff_delay(options.retry_backoff, attempt));
                    debug!(url, status, attempt, ?delay, "retriable status, backing off");
                    last_error = format!("HTTP status {status}");
                    sleep(delay).await;
                    continue;
                }

                return Err(Error::fetch_failed(
                    url,
                    format!("unexpected HTTP status: {status}"),
                ));
            }
            Err(e) => {
                debug!(url, attempt, error = %e, "transport error, backing off");
                last_error = e.to_string();
                sleep(backoff_delay(options.retry_backoff, attempt)).await;
            }
        }
    }

    Err(Error::retries_exhausted(url, options.max_retries, last_error))
}

fn has_pagination_header(page: &PageResponse) -> bool {
    page.header(constants::HEADER_LINK)
        .is_some_and(|link| link.to_lowercase().contains(constants::LINK_REL_NEXT))
}

fn has_pagination_keys(page: &PageResponse) -> bool {
    let Ok(body) = page.json() else {
        return false;
    };
    body.as_object().is_some_and(|map| {
        constants::PAGINATION_HINT_KEYS
            .iter()
            .any(|key| map.contains_key(*key))
    })
}

fn same_host(first: &Url, next: &Url) -> bool {
    first.host_str() == next.host_str() && first.port_or_known_default() == next.port_or_known_default()
}

/// Fetches up to `max_pages` pages (or the first-page estimate when the
/// descriptor translates page-count parameters), following the configured
/// pagination strategy.
///
/// # Errors
///
/// Returns a fetch error when the single-request layer fails, when a
/// paginated response is not JSON, or when a `nextPath` URL leaves the
/// origin host.
pub async fn fetch_json_pages(
    client: &Client,
    method: Method,
    url: &str,
    query: &BTreeMap<String, String>,
    headers: &BTreeMap<String, String>,
    body: Option<&Value>,
    pagination: Option<&Pagination>,
    options: &FetchOptions,
) -> Result<FetchedPages, Error> {
    let start = Instant::now();
    let first_url =
        Url::parse(url).map_err(|e| Error::fetch_failed(url, format!("invalid url: {e}")))?;

    let mut current_url = url.to_string();
    let mut query = query.clone();
    let mut pages: Vec<PageResponse> = Vec::new();
    let mut requests_issued = 0;
    let mut estimated_total_pages: Option<usize> = None;
    let mut page_count = 0;

    loop {
        let bound = estimated_total_pages.map_or(options.max_pages, |estimate| {
            estimate.min(options.max_pages)
        });
        if page_count >= bound {
            break;
        }
        page_count += 1;

        let (page, issued) = send_with_retries(
            client,
            method.clone(),
            &current_url,
            &query,
            headers,
            body,
            options,
        )
        .await?;
        requests_issued += issued;
        debug!(url = %current_url, page_count, status = page.status, "fetched page");

        let status = page.status;
        pages.push(page);
        if status != constants::STATUS_OK {
            break;
        }

        let Some(pagination) = pagination else {
            break;
        };

        // Non-JSON payloads cannot be paginated; this is a configuration
        // error, not a degraded mode
        let page_json = pages
            .last()
            .map(PageResponse::json)
            .transpose()?
            .unwrap_or(Value::Null);

        if estimated_total_pages.is_none() {
            if let Some(translation) = &pagination.param_translation {
                let page_size = extract_json_path(&page_json, &translation.page_size_path)
                    .and_then(Value::as_u64);
                let total_size = extract_json_path(&page_json, &translation.total_size_path)
                    .and_then(Value::as_u64);
                if let (Some(page_size), Some(total_size)) = (page_size, total_size) {
                    if page_size > 0 {
                        estimated_total_pages =
                            Some(usize::try_from(total_size.div_ceil(page_size)).unwrap_or(usize::MAX));
                    }
                }
            }
        }

        if let Some(next_path) = &pagination.next_path {
            // Cursor-style: the response carries a self-contained next URL
            let next = extract_json_path(&page_json, next_path)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty());
            let Some(next) = next else {
                break;
            };

            let next_url = first_url
                .join(next)
                .map_err(|e| Error::fetch_failed(next, format!("invalid next url: {e}")))?;
            if !same_host(&first_url, &next_url) {
                return Err(Error::fetch_failed(
                    next_url.as_str(),
                    "next-page url leaves the origin host",
                ));
            }
            current_url = next_url.to_string();
            query.clear();
            continue;
        }

        if let Some(params) = &pagination.pagination_params {
            let mut new_params = BTreeMap::new();
            for (param, json_path) in params {
                if let Some(value) = extract_json_path(&page_json, json_path) {
                    if !value.is_null() {
                        new_params.insert(param.clone(), value_to_param(value));
                    }
                }
            }
            if new_params.is_empty() {
                break;
            }
            query.extend(new_params);

            if pagination.strategy == Some(PaginationStrategy::Page) {
                if let Some(translation) = &pagination.param_translation {
                    let next_page = query
                        .get(&translation.page_ref)
                        .and_then(|v| v.parse::<u64>().ok())
                        .map_or(2, |page| page + 1);
                    if let Some(total) = estimated_total_pages {
                        if next_page > total as u64 {
                            break;
                        }
                    }
                    query.insert(translation.page_ref.clone(), next_page.to_string());
                }
            }
            continue;
        }

        // Unknown strategy with no companion fields: nothing to follow
        break;
    }

    let stopped_at_bound = pages.len() >= options.max_pages;
    let last_page_hints = pages.last().is_some_and(|page| {
        page.status == constants::STATUS_OK
            && (has_pagination_header(page) || has_pagination_keys(page))
    });
    let first_page_ok = pages
        .first()
        .is_some_and(|page| page.status == constants::STATUS_OK);
    let may_have_more = first_page_ok && (stopped_at_bound || last_page_hints);

    let bytes_received = pages.iter().map(PageResponse::byte_size).sum();

    Ok(FetchedPages {
        pages,
        requests_issued,
        may_have_more,
        bytes_received,
        elapsed: start.elapsed(),
    })
}
