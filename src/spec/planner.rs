//! Spec planner: dependency resolution and plan emission.
//!
//! Builds a directed acyclic graph over the API calls a specification needs
//! (an output selector or a reference argument is an edge), validates it,
//! and emits plan nodes grouped into topological stages via Kahn's
//! algorithm. Nodes within one stage share no dependency and may be fetched
//! in parallel; a node's prerequisites always live in earlier stages.
//!
//! The planner performs no I/O. Reference arguments stay unresolved in the
//! emitted nodes; [`Planner::expand`] is the pure helper the executor calls
//! once prerequisite data is in hand, producing one concrete request per
//! referenced value (bounded by the configured expansion cap).

use crate::error::Error;
use crate::http::origin::RestDataSource;
use crate::http::pagination::{extract_json_path, value_to_param, Pagination};
use crate::spec::{
    ArgLocation, ArgSource, EndpointSpec, MethodKind, ReferenceSelector,
};
use crate::constants::ROOT_DATASET_KEY;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::OnceLock;
use tracing::debug;

/// An unresolved reference argument: which prerequisite dataset and row
/// field supply its values.
#[derive(Debug, Clone)]
pub struct ReferenceArg {
    pub name: String,
    pub location: ArgLocation,
    pub api: String,
    /// Dataset key within the prerequisite's normalized output (the first
    /// path segment, or the root key).
    pub dataset: String,
    /// Per-row field path (the remaining segments), when present.
    pub field: Option<String>,
}

/// One API call, resolved as far as plan time allows.
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub api_name: String,
    pub method: MethodKind,
    pub url_template: String,
    pub timeout: Option<u64>,
    pub pagination: Option<Pagination>,
    pub parameter_args: BTreeMap<String, String>,
    pub header_args: BTreeMap<String, String>,
    pub data_args: serde_json::Map<String, Value>,
    pub reference_args: Vec<ReferenceArg>,
    /// Dataset name → path, for normalizing this call's responses. Includes
    /// selectors synthesized for dependents' reference arguments.
    pub output_selectors: BTreeMap<String, String>,
    /// Keys of this node's datasets that belong in the final dataset map
    /// (declared by the spec's output section).
    pub declared_keys: BTreeSet<String>,
}

/// One concrete request produced by expanding a plan node.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub source: RestDataSource,
    /// Values pulled from prerequisites, to be attached to each output row
    /// as `argument-<name>` fields.
    pub prepend_values: BTreeMap<String, Value>,
}

/// Substitutes `$NAME` references from the process environment; unresolved
/// names stay literal.
fn substitute_env(input: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"\$\w+").expect("static pattern"));
    pattern
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let name = &caps[0][1..];
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Splits a reference path into its dataset key and per-row field path.
fn split_reference_path(path: &str) -> (String, Option<String>) {
    if path.is_empty() || path == ROOT_DATASET_KEY {
        return (ROOT_DATASET_KEY.to_string(), None);
    }
    match path.split_once('.') {
        Some((dataset, rest)) if !rest.is_empty() => (dataset.to_string(), Some(rest.to_string())),
        _ => (path.to_string(), None),
    }
}

#[derive(Debug)]
pub struct Planner {
    spec: EndpointSpec,
    fingerprint: String,
    stages: Vec<Vec<PlanNode>>,
}

impl Planner {
    /// Parses a specification and builds the staged plan.
    ///
    /// # Errors
    ///
    /// Returns a spec error for parse failures, unknown API references,
    /// dependency cycles, conflicting output selectors, unimplemented
    /// methods, or a missing server list; a resolve error for unbound
    /// runtime arguments.
    pub fn new(spec_string: &str) -> Result<Self, Error> {
        let fingerprint = crate::spec::fingerprint(spec_string)?;
        let spec = EndpointSpec::parse(spec_string)?;
        let stages = build_stages(&spec)?;
        debug!(
            stages = stages.len(),
            apis = stages.iter().map(Vec::len).sum::<usize>(),
            "plan built"
        );
        Ok(Self {
            spec,
            fingerprint,
            stages,
        })
    }

    /// The response-cache key for this specification.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[must_use]
    pub const fn spec(&self) -> &EndpointSpec {
        &self.spec
    }

    /// Plan nodes in topological stages: every node's prerequisites live in
    /// an earlier stage.
    #[must_use]
    pub fn stages(&self) -> &[Vec<PlanNode>] {
        &self.stages
    }

    /// The flat, ordered list of plan nodes.
    #[must_use]
    pub fn nodes(&self) -> Vec<&PlanNode> {
        self.stages.iter().flatten().collect()
    }

    /// Resolves a node's reference arguments against fetched prerequisite
    /// data, producing one concrete request per referenced value.
    ///
    /// List-valued references expand in lockstep, bounded by `cap`. Scalar
    /// references produce a single request. Each expanded request records
    /// the driving values in `prepend_values`.
    ///
    /// # Errors
    ///
    /// Returns an error when prerequisite data for a referenced API or
    /// dataset is missing.
    pub fn expand(
        node: &PlanNode,
        prerequisite_data: &BTreeMap<String, BTreeMap<String, Value>>,
        cap: usize,
    ) -> Result<Vec<ResolvedRequest>, Error> {
        if node.reference_args.is_empty() {
            return Ok(vec![ResolvedRequest {
                source: build_source(node, &BTreeMap::new()),
                prepend_values: BTreeMap::new(),
            }]);
        }

        let mut per_arg_values: Vec<(usize, Vec<Value>)> = Vec::new();
        for (index, reference) in node.reference_args.iter().enumerate() {
            let datasets = prerequisite_data.get(&reference.api).ok_or_else(|| {
                Error::spec_invalid(format!(
                    "prerequisite API '{}' was not fetched before '{}'",
                    reference.api, node.api_name
                ))
            })?;
            let dataset = datasets.get(&reference.dataset).ok_or_else(|| {
                Error::selector_not_found(&reference.dataset, reference.field.as_deref().unwrap_or(""))
            })?;
            per_arg_values.push((index, reference_values(dataset, reference.field.as_deref())));
        }

        let count = per_arg_values
            .iter()
            .map(|(_, values)| values.len())
            .min()
            .unwrap_or(0)
            .min(cap);

        let mut requests = Vec::with_capacity(count);
        for i in 0..count {
            let mut overrides = BTreeMap::new();
            let mut prepend_values = BTreeMap::new();
            for (index, values) in &per_arg_values {
                let reference = &node.reference_args[*index];
                let value = values[i].clone();
                prepend_values.insert(reference.name.clone(), value.clone());
                overrides.insert(reference.name.clone(), (reference.location, value));
            }
            requests.push(ResolvedRequest {
                source: build_source(node, &overrides),
                prepend_values,
            });
        }
        Ok(requests)
    }
}

/// Extracts the list of values a reference argument iterates over.
fn reference_values(dataset: &Value, field: Option<&str>) -> Vec<Value> {
    match field {
        Some(field) => match dataset {
            Value::Array(rows) => rows
                .iter()
                .map(|row| extract_json_path(row, field).cloned().unwrap_or(Value::Null))
                .collect(),
            other => vec![extract_json_path(other, field).cloned().unwrap_or(Value::Null)],
        },
        None => match dataset {
            Value::Array(values) => values.clone(),
            other => vec![other.clone()],
        },
    }
}

fn build_source(
    node: &PlanNode,
    overrides: &BTreeMap<String, (ArgLocation, Value)>,
) -> RestDataSource {
    let mut parameter_args = node.parameter_args.clone();
    let mut header_args = node.header_args.clone();
    let mut data_args = node.data_args.clone();

    for (name, (location, value)) in overrides {
        match location {
            ArgLocation::Parameter => {
                parameter_args.insert(name.clone(), value_to_param(value));
            }
            ArgLocation::Header => {
                header_args.insert(name.clone(), value_to_param(value));
            }
            ArgLocation::Data => {
                data_args.insert(name.clone(), value.clone());
            }
        }
    }

    let body = (!data_args.is_empty()).then(|| Value::Object(data_args));
    RestDataSource {
        url_template: node.url_template.clone(),
        parameter_args,
        header_args,
        method: node.method.as_reqwest(),
        body,
        timeout: node.timeout,
        pagination: node.pagination.clone(),
    }
}

/// Parses a reference argument's selector value, when it is one.
fn reference_selector(value: &Value) -> Option<ReferenceSelector> {
    value
        .as_object()
        .and_then(|_| serde_json::from_value(value.clone()).ok())
}

fn build_stages(spec: &EndpointSpec) -> Result<Vec<Vec<PlanNode>>, Error> {
    let calls = &spec.spec.api_calls;
    let output = &spec.spec.output;

    // Root set: every API referenced by an output selector
    let mut needed: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    for (dataset_name, selector) in &output.data {
        if !calls.contains_key(&selector.api) {
            return Err(Error::unknown_api(&selector.api, dataset_name));
        }
        if needed.insert(selector.api.clone()) {
            queue.push_back(selector.api.clone());
        }
    }

    // Reject conflicting output selectors up front: at most one selector may
    // address the response root, and dataset names are unique by construction
    let root_selectors: Vec<&String> = output
        .data
        .iter()
        .filter(|(_, s)| s.path.is_empty() || s.path == ROOT_DATASET_KEY)
        .map(|(name, _)| name)
        .collect();
    if root_selectors.len() > 1 {
        return Err(Error::spec_invalid(format!(
            "conflicting output selectors: {} all address the response root",
            root_selectors
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    // Walk reference arguments to close the needed set and collect edges
    let mut edges: Vec<(String, String)> = Vec::new(); // (prerequisite, dependent)
    let mut reference_args: BTreeMap<String, Vec<ReferenceArg>> = BTreeMap::new();
    while let Some(api_name) = queue.pop_front() {
        let call = &calls[&api_name];
        for arg in &call.arguments {
            if arg.source != ArgSource::Reference {
                continue;
            }
            let Some(selector) = reference_selector(&arg.value) else {
                continue; // string references resolve via the environment
            };
            if !calls.contains_key(&selector.api) {
                return Err(Error::unknown_api(
                    &selector.api,
                    format!("argument '{}' of '{api_name}'", arg.name),
                ));
            }
            let (dataset, field) = split_reference_path(&selector.path);
            reference_args
                .entry(api_name.clone())
                .or_default()
                .push(ReferenceArg {
                    name: arg.name.clone(),
                    location: arg.location,
                    api: selector.api.clone(),
                    dataset,
                    field,
                });
            edges.push((selector.api.clone(), api_name.clone()));
            if needed.insert(selector.api.clone()) {
                queue.push_back(selector.api.clone());
            }
        }
    }

    // Kahn's algorithm, staged: each round's zero-in-degree nodes form one
    // stage and may execute concurrently
    let mut in_degree: BTreeMap<&str, usize> = needed.iter().map(|api| (api.as_str(), 0)).collect();
    for (_, dependent) in &edges {
        if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
            *degree += 1;
        }
    }

    let mut remaining = needed.clone();
    let mut staged_names: Vec<Vec<String>> = Vec::new();
    while !remaining.is_empty() {
        let ready: Vec<String> = remaining
            .iter()
            .filter(|api| in_degree.get(api.as_str()) == Some(&0))
            .cloned()
            .collect();
        if ready.is_empty() {
            let cycle: Vec<String> = remaining.into_iter().collect();
            return Err(Error::dependency_cycle(&cycle));
        }
        for api in &ready {
            remaining.remove(api);
            for (prerequisite, dependent) in &edges {
                if prerequisite == api {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree = degree.saturating_sub(1);
                    }
                }
            }
        }
        staged_names.push(ready);
    }

    // Emit nodes stage by stage
    let mut stages = Vec::with_capacity(staged_names.len());
    for stage_names in staged_names {
        let mut stage = Vec::with_capacity(stage_names.len());
        for api_name in stage_names {
            stage.push(build_node(spec, &api_name, &reference_args)?);
        }
        stages.push(stage);
    }
    Ok(stages)
}

fn build_node(
    spec: &EndpointSpec,
    api_name: &str,
    all_reference_args: &BTreeMap<String, Vec<ReferenceArg>>,
) -> Result<PlanNode, Error> {
    let call = &spec.spec.api_calls[api_name];

    if call.call_type != "url" {
        return Err(Error::spec_invalid(format!(
            "API '{api_name}': invalid call type '{}'",
            call.call_type
        )));
    }
    if call.method == MethodKind::Put {
        return Err(Error::spec_invalid(format!(
            "API '{api_name}': the PUT method is not implemented"
        )));
    }
    let server = spec
        .servers
        .first()
        .ok_or_else(|| Error::spec_invalid("no servers defined in the spec"))?;
    let url_template = format!(
        "{}/{}",
        server.url.trim_end_matches('/'),
        call.endpoint.trim_start_matches('/')
    );

    let own_references: Vec<ReferenceArg> = all_reference_args
        .get(api_name)
        .cloned()
        .unwrap_or_default();
    let reference_names: BTreeSet<&str> =
        own_references.iter().map(|r| r.name.as_str()).collect();

    let mut parameter_args = BTreeMap::new();
    let mut header_args = BTreeMap::new();
    let mut data_args = serde_json::Map::new();
    for arg in &call.arguments {
        if reference_names.contains(arg.name.as_str()) {
            continue; // resolved at expansion time
        }

        let mut value = arg.value.clone();
        if let Value::String(s) = &value {
            if s.contains('$') {
                value = Value::String(substitute_env(s));
            }
        }
        if arg.source == ArgSource::Runtime && value.is_null() {
            return Err(Error::unbound_runtime_arg(api_name, &arg.name));
        }

        match arg.location {
            ArgLocation::Parameter => {
                parameter_args.insert(arg.name.clone(), value_to_param(&value));
            }
            ArgLocation::Header => {
                header_args.insert(arg.name.clone(), value_to_param(&value));
            }
            ArgLocation::Data => {
                data_args.insert(arg.name.clone(), value);
            }
        }
    }

    // Declared selectors for this API, plus selectors synthesized for the
    // datasets that dependents' reference arguments pull from
    let mut output_selectors = BTreeMap::new();
    let mut declared_keys = BTreeSet::new();
    for (dataset_name, selector) in &spec.spec.output.data {
        if selector.api != api_name {
            continue;
        }
        output_selectors.insert(dataset_name.clone(), selector.path.clone());
        if selector.path.is_empty() || selector.path == ROOT_DATASET_KEY {
            declared_keys.insert(ROOT_DATASET_KEY.to_string());
        } else {
            declared_keys.insert(dataset_name.clone());
        }
    }
    for references in all_reference_args.values() {
        for reference in references {
            if reference.api != api_name {
                continue;
            }
            match output_selectors.get(&reference.dataset) {
                Some(existing) if existing != &reference.dataset => {
                    return Err(Error::spec_invalid(format!(
                        "conflicting selectors for dataset '{}' of API '{api_name}'",
                        reference.dataset
                    )));
                }
                Some(_) => {}
                None => {
                    output_selectors
                        .insert(reference.dataset.clone(), reference.dataset.clone());
                }
            }
        }
    }

    Ok(PlanNode {
        api_name: api_name.to_string(),
        method: call.method,
        url_template,
        timeout: spec.spec.timeout,
        pagination: call.pagination.clone(),
        parameter_args,
        header_args,
        data_args,
        reference_args: own_references,
        output_selectors,
        declared_keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec_with_calls(api_calls: Value, data: Value) -> String {
        json!({
            "spec": {
                "apiCalls": api_calls,
                "output": {"data": data, "exports": {}},
                "timeout": 30
            },
            "servers": [{"url": "http://origin/"}]
        })
        .to_string()
    }

    fn simple_call(endpoint: &str) -> Value {
        json!({"type": "url", "endpoint": endpoint, "method": "get", "arguments": []})
    }

    #[test]
    fn single_api_yields_single_stage() {
        let planner = Planner::new(&spec_with_calls(
            json!({"GetPersons": simple_call("/persons")}),
            json!({"Person": {"api": "GetPersons", "path": "."}}),
        ))
        .unwrap();

        assert_eq!(planner.stages().len(), 1);
        let node = &planner.stages()[0][0];
        assert_eq!(node.api_name, "GetPersons");
        assert_eq!(node.url_template, "http://origin/persons");
        assert_eq!(node.timeout, Some(30));
        assert!(node.declared_keys.contains("."));
    }

    #[test]
    fn unknown_output_api_is_fatal() {
        let result = Planner::new(&spec_with_calls(
            json!({"GetPersons": simple_call("/persons")}),
            json!({"Person": {"api": "Missing", "path": "."}}),
        ));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Missing"));
    }

    #[test]
    fn prerequisites_are_scheduled_in_earlier_stages() {
        let planner = Planner::new(&spec_with_calls(
            json!({
                "GetIds": simple_call("/ids"),
                "GetVisits": {
                    "type": "url", "endpoint": "/visits/{id}", "method": "get",
                    "arguments": [{
                        "name": "id", "argLocation": "parameter", "type": "string",
                        "source": "reference",
                        "value": {"api": "GetIds", "path": "ids"}
                    }]
                }
            }),
            json!({"Visit": {"api": "GetVisits", "path": "."}}),
        ))
        .unwrap();

        assert_eq!(planner.stages().len(), 2);
        assert_eq!(planner.stages()[0][0].api_name, "GetIds");
        assert_eq!(planner.stages()[1][0].api_name, "GetVisits");

        // The prerequisite gets a synthesized selector for the dataset the
        // reference pulls from
        let prereq = &planner.stages()[0][0];
        assert_eq!(prereq.output_selectors.get("ids").unwrap(), "ids");
        assert!(prereq.declared_keys.is_empty());
    }

    #[test]
    fn dependency_cycles_are_fatal() {
        let make_ref_call = |endpoint: &str, dep: &str| {
            json!({
                "type": "url", "endpoint": endpoint, "method": "get",
                "arguments": [{
                    "name": "x", "argLocation": "parameter", "type": "string",
                    "source": "reference", "value": {"api": dep, "path": "xs"}
                }]
            })
        };
        let result = Planner::new(&spec_with_calls(
            json!({
                "A": make_ref_call("/a", "B"),
                "B": make_ref_call("/b", "A")
            }),
            json!({"Out": {"api": "A", "path": "."}}),
        ));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("cycle"), "expected cycle error, got: {err}");
        assert!(err.contains('A') && err.contains('B'));
    }

    #[test]
    fn put_method_is_rejected() {
        let result = Planner::new(&spec_with_calls(
            json!({"Update": {"type": "url", "endpoint": "/x", "method": "put", "arguments": []}}),
            json!({"Out": {"api": "Update", "path": "."}}),
        ));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("PUT"), "got: {err}");
    }

    #[test]
    fn unbound_runtime_argument_is_fatal() {
        let result = Planner::new(&spec_with_calls(
            json!({"GetX": {
                "type": "url", "endpoint": "/x", "method": "get",
                "arguments": [{
                    "name": "token", "argLocation": "header", "type": "string",
                    "source": "runtime", "value": null
                }]
            }}),
            json!({"Out": {"api": "GetX", "path": "."}}),
        ));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("token"), "got: {err}");
    }

    #[test]
    fn multiple_root_selectors_conflict() {
        let result = Planner::new(&spec_with_calls(
            json!({
                "A": simple_call("/a"),
                "B": simple_call("/b")
            }),
            json!({
                "OutA": {"api": "A", "path": "."},
                "OutB": {"api": "B", "path": ""}
            }),
        ));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("conflicting"), "got: {err}");
    }

    #[test]
    fn env_variables_substitute_into_string_arguments() {
        std::env::set_var("WEFT_TEST_TOKEN", "s3cret");
        let planner = Planner::new(&spec_with_calls(
            json!({"GetX": {
                "type": "url", "endpoint": "/x", "method": "get",
                "arguments": [
                    {"name": "auth", "argLocation": "header", "type": "string",
                     "source": "constant", "value": "Bearer $WEFT_TEST_TOKEN"},
                    {"name": "missing", "argLocation": "header", "type": "string",
                     "source": "reference", "value": "$WEFT_TEST_UNSET_VAR"}
                ]
            }}),
            json!({"Out": {"api": "GetX", "path": "."}}),
        ))
        .unwrap();

        let node = &planner.stages()[0][0];
        assert_eq!(node.header_args.get("auth").unwrap(), "Bearer s3cret");
        // Unresolved references stay literal
        assert_eq!(
            node.header_args.get("missing").unwrap(),
            "$WEFT_TEST_UNSET_VAR"
        );
    }

    #[test]
    fn expand_without_references_yields_one_request() {
        let planner = Planner::new(&spec_with_calls(
            json!({"GetPersons": simple_call("/persons")}),
            json!({"Person": {"api": "GetPersons", "path": "."}}),
        ))
        .unwrap();

        let node = &planner.stages()[0][0];
        let requests = Planner::expand(node, &BTreeMap::new(), 20).unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prepend_values.is_empty());
    }

    #[test]
    fn expand_produces_one_request_per_referenced_value() {
        let planner = Planner::new(&spec_with_calls(
            json!({
                "GetIds": simple_call("/ids"),
                "GetVisits": {
                    "type": "url", "endpoint": "/visits/{id}", "method": "get",
                    "arguments": [{
                        "name": "id", "argLocation": "parameter", "type": "string",
                        "source": "reference", "value": {"api": "GetIds", "path": "ids"}
                    }]
                }
            }),
            json!({"Visit": {"api": "GetVisits", "path": "."}}),
        ))
        .unwrap();

        let dependent = &planner.stages()[1][0];
        let prereq_data = BTreeMap::from([(
            "GetIds".to_string(),
            BTreeMap::from([("ids".to_string(), json!([10, 11, 12]))]),
        )]);

        let requests = Planner::expand(dependent, &prereq_data, 20).unwrap();
        assert_eq!(requests.len(), 3);
        for (request, expected) in requests.iter().zip([10, 11, 12]) {
            assert_eq!(request.prepend_values.get("id").unwrap(), &json!(expected));
            assert_eq!(
                request.source.parameter_args.get("id").unwrap(),
                &expected.to_string()
            );
        }
    }

    #[test]
    fn expansion_respects_the_cap() {
        let planner = Planner::new(&spec_with_calls(
            json!({
                "GetIds": simple_call("/ids"),
                "GetVisits": {
                    "type": "url", "endpoint": "/visits/{id}", "method": "get",
                    "arguments": [{
                        "name": "id", "argLocation": "parameter", "type": "string",
                        "source": "reference", "value": {"api": "GetIds", "path": "ids"}
                    }]
                }
            }),
            json!({"Visit": {"api": "GetVisits", "path": "."}}),
        ))
        .unwrap();

        let dependent = &planner.stages()[1][0];
        let many: Vec<i64> = (0..50).collect();
        let prereq_data = BTreeMap::from([(
            "GetIds".to_string(),
            BTreeMap::from([("ids".to_string(), json!(many))]),
        )]);

        let requests = Planner::expand(dependent, &prereq_data, 20).unwrap();
        assert_eq!(requests.len(), 20);
    }

    #[test]
    fn expand_extracts_per_row_fields() {
        let reference = ReferenceArg {
            name: "id".to_string(),
            location: ArgLocation::Parameter,
            api: "A".to_string(),
            dataset: "people".to_string(),
            field: Some("person.id".to_string()),
        };
        let dataset = json!([
            {"person": {"id": 1}},
            {"person": {"id": 2}}
        ]);
        let values = reference_values(&dataset, reference.field.as_deref());
        assert_eq!(values, vec![json!(1), json!(2)]);
    }

    #[test]
    fn split_reference_path_cases() {
        assert_eq!(split_reference_path("ids"), ("ids".to_string(), None));
        assert_eq!(
            split_reference_path("people.person.id"),
            ("people".to_string(), Some("person.id".to_string()))
        );
        assert_eq!(split_reference_path(""), (".".to_string(), None));
        assert_eq!(split_reference_path("."), (".".to_string(), None));
    }

    #[test]
    fn fingerprint_is_exposed() {
        let raw = spec_with_calls(
            json!({"GetPersons": simple_call("/persons")}),
            json!({"Person": {"api": "GetPersons", "path": "."}}),
        );
        let planner = Planner::new(&raw).unwrap();
        assert_eq!(planner.fingerprint().len(), 64);
        assert_eq!(planner.fingerprint(), crate::spec::fingerprint(&raw).unwrap());
    }
}
