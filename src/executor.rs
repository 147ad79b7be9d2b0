//! Pipeline orchestration.
//!
//! One executor serves many concurrent requests. Each request flows through
//! plan construction, response-cache lookup, staged origin fetching,
//! transformation, encoding, and best-effort response-cache writeback. The
//! executor never returns `Err` to its caller: every failure folds into the
//! error envelope, and only construction can fail.

use crate::cache::{create_cache, Cache};
use crate::config::{CacheRole, Settings};
use crate::error::Error;
use crate::http::client::FetchOptions;
use crate::http::origin::{aggregate, OriginFetcher};
use crate::serialize::{Payload, Serializer};
use crate::spec::planner::{Planner, ResolvedRequest};
use crate::stats::{AppStats, RuntimeStats};
use crate::transform::{self, Registry, Table};
use crate::constants::PREPEND_FIELD_PREFIX;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Response envelope returned for every request.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub status: ResponseStatus,
    pub data: Option<Payload>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    Error,
}

impl ServiceResponse {
    #[must_use]
    pub const fn ok(data: Payload) -> Self {
        Self {
            status: ResponseStatus::Ok,
            data: Some(data),
            message: None,
        }
    }

    #[must_use]
    pub const fn error(message: String) -> Self {
        Self {
            status: ResponseStatus::Error,
            data: None,
            message: Some(message),
        }
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, ResponseStatus::Ok)
    }
}

pub struct Executor {
    settings: Settings,
    response_cache: Option<Arc<Cache>>,
    origin_fetcher: OriginFetcher,
    response_serializer: Serializer,
    registry: Registry,
    stats: Arc<AppStats>,
}

impl Executor {
    /// Builds the runtime from settings: caches, serializers, the shared
    /// HTTP client, and the transform registry.
    ///
    /// # Errors
    ///
    /// Returns a cache error when a configured cache cannot be constructed
    /// (encoding policy violation, unreachable backend, bad directory) and
    /// a fetch error when the HTTP client cannot be built.
    pub async fn new(settings: Settings) -> Result<Self, Error> {
        let response_cache = if settings.response_cache.enabled {
            let cache = create_cache(
                &settings.response_cache,
                settings.response_encoding,
                CacheRole::Response,
            )
            .await?;
            debug!(backend = cache.backend_id(), "response cache ready");
            Some(Arc::new(cache))
        } else {
            debug!("response cache disabled");
            None
        };

        let origin_cache = if settings.origin_cache.enabled {
            let cache = create_cache(
                &settings.origin_cache,
                settings.origin_encoding,
                CacheRole::Origin,
            )
            .await?;
            debug!(backend = cache.backend_id(), "origin cache ready");
            Some(Arc::new(cache))
        } else {
            debug!("origin cache disabled");
            None
        };

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::fetch_failed("client", format!("failed to build http client: {e}")))?;
        let origin_fetcher = OriginFetcher::new(
            client,
            FetchOptions::from_settings(&settings.http),
            origin_cache,
        );

        Ok(Self {
            response_serializer: Serializer::new(settings.response_encoding),
            settings,
            response_cache,
            origin_fetcher,
            registry: Registry::with_builtins(),
            stats: Arc::new(AppStats::default()),
        })
    }

    /// Registers a custom transform function for export chains.
    pub fn register_transform<F>(&mut self, name: &str, function: F)
    where
        F: Fn(Table, &BTreeMap<String, Value>) -> Result<Table, Error> + Send + Sync + 'static,
    {
        self.registry.register(name, function);
    }

    /// Runs one endpoint specification through the pipeline.
    pub async fn get_endpoint_data(&self, spec_string: &str) -> ServiceResponse {
        let start = Instant::now();
        self.stats.record_received();

        let planner = match Planner::new(spec_string) {
            Ok(planner) => planner,
            Err(e) => {
                return self.failure(start, format!("invalid endpoint spec: {e}"));
            }
        };

        if let Some(cache) = &self.response_cache {
            if let Some(payload) = cache.get_payload(planner.fingerprint()).await {
                debug!(fingerprint = planner.fingerprint(), "response cache hit");
                return self.success(start, payload);
            }
        }

        let datasets = match self.fetch_origin_data(&planner).await {
            Ok(datasets) => datasets,
            Err(e) => {
                return self.failure(
                    start,
                    format!("error fetching data from origin servers: {e}"),
                );
            }
        };

        let transformed = match transform::apply_exports(
            &planner.spec().spec.output.exports,
            &datasets,
            &self.registry,
        ) {
            Ok(transformed) => transformed,
            Err(e) => {
                return self.failure(start, format!("internal error transforming the data: {e}"));
            }
        };

        let payload = match self.response_serializer.encode(&transformed) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                return self.failure(
                    start,
                    "internal error encoding the response: empty result".to_string(),
                );
            }
            Err(e) => {
                return self.failure(start, format!("internal error encoding the response: {e}"));
            }
        };

        if let Some(cache) = &self.response_cache {
            cache
                .set_payload(planner.fingerprint(), payload.clone(), None)
                .await;
        }

        self.success(start, payload)
    }

    /// Executes the plan stage by stage: nodes within a stage fetch
    /// concurrently, prerequisites always complete before their dependents.
    /// Each API is fetched exactly once and memoized by name.
    async fn fetch_origin_data(
        &self,
        planner: &Planner,
    ) -> Result<BTreeMap<String, Value>, Error> {
        let cap = self.settings.max_reference_expansion;
        let mut api_data: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
        let mut output: BTreeMap<String, Value> = BTreeMap::new();

        for stage in planner.stages() {
            let node_futures = stage.iter().map(|node| {
                let requests = Planner::expand(node, &api_data, cap);
                async move {
                    let requests = requests?;
                    let datasets = self.fetch_node(&requests, &node.output_selectors).await?;
                    Ok::<_, Error>((node, datasets))
                }
            });

            let stage_results = futures::future::try_join_all(node_futures).await?;
            for (node, node_datasets) in stage_results {
                for key in &node.declared_keys {
                    if let Some(value) = node_datasets.get(key) {
                        output.insert(key.clone(), value.clone());
                    }
                }
                api_data.insert(node.api_name.clone(), node_datasets);
            }
        }

        if output.is_empty() {
            return Err(Error::no_origin_data());
        }
        Ok(output)
    }

    /// Fetches every expanded request of one plan node concurrently and
    /// accumulates the tagged results into the node's dataset map.
    async fn fetch_node(
        &self,
        requests: &[ResolvedRequest],
        selectors: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, Value>, Error> {
        let fetches = requests
            .iter()
            .map(|request| self.origin_fetcher.fetch_datasets(&request.source, selectors));
        let results = futures::future::try_join_all(fetches).await?;

        let mut accumulated: BTreeMap<String, Value> = BTreeMap::new();
        for (request, mut datasets) in requests.iter().zip(results) {
            tag_prepend_values(&mut datasets, &request.prepend_values);
            for (key, value) in datasets {
                match accumulated.get_mut(&key) {
                    Some(slot) => aggregate(slot, value),
                    None => {
                        accumulated.insert(key, value);
                    }
                }
            }
        }
        Ok(accumulated)
    }

    fn success(&self, start: Instant, payload: Payload) -> ServiceResponse {
        self.stats.record_processing_time(start.elapsed());
        self.stats.record_served(payload.size());
        ServiceResponse::ok(payload)
    }

    fn failure(&self, start: Instant, message: String) -> ServiceResponse {
        self.stats.record_processing_time(start.elapsed());
        self.stats.record_failed();
        warn!(%message, "request failed");
        ServiceResponse::error(message)
    }

    /// Combined stats snapshot across every component.
    #[must_use]
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            app: self.stats.snapshot(),
            fetcher: self.origin_fetcher.stats(),
            response_cache: self.response_cache.as_ref().map(|c| c.stats()),
            origin_cache: self.origin_fetcher.cache().map(|c| c.stats()),
            response_encoder: self.response_serializer.stats(),
        }
    }

    /// Empties the response cache. Returns `false` when none is configured.
    ///
    /// # Errors
    ///
    /// Returns a cache error if the backend clear fails.
    pub async fn clear_response_cache(&self) -> Result<bool, Error> {
        match &self.response_cache {
            Some(cache) => {
                cache.clear().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Empties the origin cache. Returns `false` when none is configured.
    ///
    /// # Errors
    ///
    /// Returns a cache error if the backend clear fails.
    pub async fn clear_origin_cache(&self) -> Result<bool, Error> {
        match self.origin_fetcher.cache() {
            Some(cache) => {
                cache.clear().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Tags every row of every dataset with the values that drove the request,
/// under `argument-<name>` field names.
fn tag_prepend_values(datasets: &mut BTreeMap<String, Value>, prepend_values: &BTreeMap<String, Value>) {
    if prepend_values.is_empty() {
        return;
    }
    for value in datasets.values_mut() {
        for (name, prepend) in prepend_values {
            let field = format!("{PREPEND_FIELD_PREFIX}{name}");
            match value {
                Value::Array(rows) => {
                    for row in rows.iter_mut() {
                        if let Value::Object(map) = row {
                            map.insert(field.clone(), prepend.clone());
                        }
                    }
                }
                Value::Object(map) => {
                    map.insert(field, prepend.clone());
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tag_prepend_values_tags_list_rows() {
        let mut datasets = BTreeMap::from([(".".to_string(), json!([{"a": 1}, {"a": 2}]))]);
        let prepend = BTreeMap::from([("id".to_string(), json!(7))]);
        tag_prepend_values(&mut datasets, &prepend);
        assert_eq!(
            datasets.get(".").unwrap(),
            &json!([{"a": 1, "argument-id": 7}, {"a": 2, "argument-id": 7}])
        );
    }

    #[test]
    fn tag_prepend_values_tags_object_datasets() {
        let mut datasets = BTreeMap::from([("meta".to_string(), json!({"total": 3}))]);
        let prepend = BTreeMap::from([("id".to_string(), json!("x"))]);
        tag_prepend_values(&mut datasets, &prepend);
        assert_eq!(
            datasets.get("meta").unwrap(),
            &json!({"total": 3, "argument-id": "x"})
        );
    }

    #[test]
    fn envelope_constructors() {
        let ok = ServiceResponse::ok(Payload::Bytes(vec![1]));
        assert!(ok.is_ok());
        assert!(ok.message.is_none());

        let err = ServiceResponse::error("boom".to_string());
        assert!(!err.is_ok());
        assert_eq!(err.data, None);
        assert_eq!(err.message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn invalid_spec_yields_error_envelope() {
        let executor = Executor::new(Settings::default()).await.unwrap();
        let response = executor.get_endpoint_data("{ not a spec").await;
        assert!(!response.is_ok());
        assert!(response
            .message
            .as_deref()
            .unwrap()
            .starts_with("invalid endpoint spec"));

        let stats = executor.stats();
        assert_eq!(stats.app.requests_received, 1);
        assert_eq!(stats.app.requests_failed, 1);
        assert_eq!(stats.app.requests_served, 0);
    }

    #[tokio::test]
    async fn clear_without_caches_reports_absent() {
        let executor = Executor::new(Settings::default()).await.unwrap();
        assert!(!executor.clear_response_cache().await.unwrap());
        assert!(!executor.clear_origin_cache().await.unwrap());
    }
}
