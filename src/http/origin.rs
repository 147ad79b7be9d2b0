//! Cache-aware origin fetcher.
//!
//! Sits between the planner's concrete request descriptions and the raw
//! multi-page fetcher, adding the origin cache protocol: a body cached
//! without validators is fresh until TTL; a body cached with validators is
//! revalidated with `If-None-Match` / `If-Modified-Since`; a `304` answer
//! reuses the cached body and at most refreshes the sidecar.
//!
//! A cached body whose revalidation request fails is reported as a failure,
//! not served stale. Callers wanting staleness tolerance opt in by caching
//! without validators.

use crate::cache::{Cache, Validators};
use crate::constants;
use crate::error::Error;
use crate::http::client::{fetch_json_pages, FetchOptions, PageResponse};
use crate::http::pagination::{extract_json_path, Pagination};
use crate::stats::{FetchStats, FetchStatsSnapshot};
use reqwest::{Client, Method};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One concrete upstream source, as resolved by the planner.
#[derive(Debug, Clone)]
pub struct RestDataSource {
    /// URL with optional `{name}` path placeholders.
    pub url_template: String,
    /// Path and query arguments; names matching a placeholder fill the
    /// path, the rest become the query string.
    pub parameter_args: BTreeMap<String, String>,
    pub header_args: BTreeMap<String, String>,
    pub method: Method,
    /// JSON body for POST calls.
    pub body: Option<Value>,
    /// Per-call timeout override in seconds.
    pub timeout: Option<u64>,
    pub pagination: Option<Pagination>,
}

impl RestDataSource {
    /// Origin cache key: SHA-256 of the canonical template plus sorted,
    /// urlencoded parameter args. Header values never participate.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let sorted_params = self
            .parameter_args
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let raw_key = format!("{}?{sorted_params}", self.url_template);
        let mut hasher = Sha256::new();
        hasher.update(raw_key.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Extracts the `{name}` placeholder keys from a URL template.
fn template_keys(template: &str) -> Vec<&str> {
    let mut keys = Vec::new();
    for fragment in template.split('{').skip(1) {
        if let Some((key, _)) = fragment.split_once('}') {
            if !key.is_empty() {
                keys.push(key);
            }
        }
    }
    keys
}

/// Splits parameter args into a concrete URL and residual query parameters.
///
/// # Errors
///
/// Returns a resolve error when a placeholder has no matching argument.
pub fn compose_url(
    url_template: &str,
    parameter_args: &BTreeMap<String, String>,
) -> Result<(String, BTreeMap<String, String>), Error> {
    let path_keys = template_keys(url_template);
    let mut url = url_template.to_string();
    for key in &path_keys {
        let value = parameter_args
            .get(*key)
            .ok_or_else(|| Error::missing_path_parameter(*key))?;
        url = url.replace(&format!("{{{key}}}"), value);
    }

    let query = parameter_args
        .iter()
        .filter(|(k, _)| !path_keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Ok((url, query))
}

fn conditional_headers(
    base: &BTreeMap<String, String>,
    validators: Option<&Validators>,
) -> BTreeMap<String, String> {
    let mut headers = base.clone();
    if let Some(validators) = validators {
        if let Some(etag) = &validators.etag {
            headers.insert(constants::HEADER_IF_NONE_MATCH.to_string(), etag.clone());
        }
        if let Some(last_modified) = &validators.last_modified {
            headers.insert(
                constants::HEADER_IF_MODIFIED_SINCE.to_string(),
                last_modified.clone(),
            );
        }
    }
    headers
}

fn response_validators(page: &PageResponse) -> Option<Validators> {
    let validators = Validators {
        etag: page.header(constants::HEADER_ETAG).map(str::to_string),
        last_modified: page
            .header(constants::HEADER_LAST_MODIFIED)
            .map(str::to_string),
    };
    (!validators.is_empty()).then_some(validators)
}

/// Merges a page-level value into an accumulating dataset slot:
/// lists concatenate, objects merge, mixed shapes push or replace.
pub(crate) fn aggregate(slot: &mut Value, incoming: Value) {
    match (slot, incoming) {
        (Value::Array(existing), Value::Array(new)) => existing.extend(new),
        (Value::Array(existing), new) => existing.push(new),
        (Value::Object(existing), Value::Object(new)) => existing.extend(new),
        (slot, new) => *slot = new,
    }
}

/// Converts fetched page bodies into the dataset map the transform stage
/// consumes. Selectors map dataset names to dot-paths; an empty or `"."`
/// path selects the full page root under the root dataset key.
///
/// # Errors
///
/// Returns a fetch error when a selector path is absent from a page.
pub fn pages_to_datasets(
    pages: &[Value],
    selectors: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, Value>, Error> {
    let mut output: BTreeMap<String, Value> = BTreeMap::new();

    if selectors.is_empty() {
        output.insert("data".to_string(), Value::Array(pages.to_vec()));
        return Ok(output);
    }

    for page in pages {
        for (dataset_name, path) in selectors {
            let (key, value) = if path.is_empty() || path == constants::ROOT_DATASET_KEY {
                (constants::ROOT_DATASET_KEY.to_string(), page.clone())
            } else {
                let value = extract_json_path(page, path)
                    .ok_or_else(|| Error::selector_not_found(dataset_name, path))?;
                (dataset_name.clone(), value.clone())
            };

            match output.get_mut(&key) {
                Some(slot) => aggregate(slot, value),
                None => {
                    output.insert(key, value);
                }
            }
        }
    }

    Ok(output)
}

/// Fetches origin data through the origin cache.
pub struct OriginFetcher {
    client: Client,
    cache: Option<Arc<Cache>>,
    options: FetchOptions,
    stats: Arc<FetchStats>,
}

impl OriginFetcher {
    #[must_use]
    pub fn new(client: Client, options: FetchOptions, cache: Option<Arc<Cache>>) -> Self {
        Self {
            client,
            cache,
            options,
            stats: Arc::new(FetchStats::default()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> FetchStatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn cache(&self) -> Option<&Arc<Cache>> {
        self.cache.as_ref()
    }

    /// Fetches all pages for a source, honoring the origin cache.
    ///
    /// Returns the page bodies as a JSON array — the shape the cache stores.
    ///
    /// # Errors
    ///
    /// Returns a resolve error for unfillable URL templates and a fetch
    /// error when the upstream cannot be read.
    pub async fn fetch_pages(&self, source: &RestDataSource) -> Result<Value, Error> {
        let (url, query) = compose_url(&source.url_template, &source.parameter_args)?;
        let cache_key = source.cache_key();
        debug!(url, cache_key, "fetching origin source");

        let (cached_body, cached_validators) = match &self.cache {
            Some(cache) => cache.get_data_with_validators(&cache_key).await,
            None => (None, None),
        };

        if let Some(cached) = &cached_body {
            if cached_validators.is_none() {
                debug!(cache_key, "cached body without validators, fresh until ttl");
                return Ok(cached.clone());
            }
        }

        let headers = conditional_headers(&source.header_args, cached_validators.as_ref());
        let options = self.options.clone().with_timeout(source.timeout);
        let fetched = fetch_json_pages(
            &self.client,
            source.method.clone(),
            &url,
            &query,
            &headers,
            source.body.as_ref(),
            source.pagination.as_ref(),
            &options,
        )
        .await?;

        self.stats
            .record_fetch(fetched.requests_issued, fetched.bytes_received, fetched.elapsed);
        if fetched.may_have_more {
            warn!(url, "pagination budget exhausted, pages may be left unfetched");
        }

        let new_validators = fetched.pages.first().and_then(response_validators);

        if fetched.not_modified() {
            let Some(cached) = cached_body else {
                return Err(Error::fetch_failed(
                    &url,
                    "origin replied 304 but no cached body is available",
                ));
            };
            if let (Some(cache), Some(new)) = (&self.cache, &new_validators) {
                if cached_validators.as_ref() != Some(new) {
                    debug!(cache_key, "revalidated, refreshing validator sidecar");
                    cache.set_validators(&cache_key, new).await;
                }
            }
            debug!(cache_key, "revalidated, reusing cached body");
            return Ok(cached);
        }

        let pages_json = fetched
            .pages
            .iter()
            .map(PageResponse::json)
            .collect::<Result<Vec<_>, _>>()?;
        let body = Value::Array(pages_json);

        if let Some(cache) = &self.cache {
            let changed = new_validators
                .as_ref()
                .filter(|new| cached_validators.as_ref() != Some(*new));
            cache.set(&cache_key, &body, changed, None).await;
        }

        Ok(body)
    }

    /// Fetches a source and normalizes it into datasets via its selectors.
    ///
    /// # Errors
    ///
    /// Propagates fetch errors plus selector mismatches.
    pub async fn fetch_datasets(
        &self,
        source: &RestDataSource,
        selectors: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, Value>, Error> {
        let body = self.fetch_pages(source).await?;
        let pages = body.as_array().cloned().unwrap_or_else(|| vec![body]);
        pages_to_datasets(&pages, selectors)
    }
}
