//! Transform function registry and export application.
//!
//! The transformation DSL itself lives outside the runtime; this module is
//! the function-registry callback surface the executor invokes on the
//! normalized dataset map. A handful of field-level builtins ship with the
//! registry, and embedders register their own functions under new names.
//!
//! Each export selects an input dataset, runs every output field's function
//! chain against a working copy of that table, and keeps the rows where all
//! output fields resolved. Functions receive and return whole tables so a
//! single chain can reshape intermediate columns freely.

use crate::error::Error;
use crate::spec::ExportSpec;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One flat record of a dataset.
pub type Row = Map<String, Value>;
/// A dataset normalized to records.
pub type Table = Vec<Row>;

/// Signature of a transform function: a table in, a table out.
pub type TransformFn =
    Arc<dyn Fn(Table, &BTreeMap<String, Value>) -> Result<Table, Error> + Send + Sync>;

/// Named transform functions available to export chains.
#[derive(Clone)]
pub struct Registry {
    functions: HashMap<String, TransformFn>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl Registry {
    /// An empty registry, for embedders that want full control.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// The standard registry: field mapping, concatenation, arithmetic.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("map_field", map_field);
        registry.register("concatenate_fields", concatenate_fields);
        registry.register("multiply_by_value", multiply_by_value);
        registry.register("subtract_columns", subtract_columns);
        registry.register("operator", apply_operator);
        registry
    }

    /// Registers a function under `name`, replacing any previous binding.
    pub fn register<F>(&mut self, name: &str, function: F)
    where
        F: Fn(Table, &BTreeMap<String, Value>) -> Result<Table, Error> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Arc::new(function));
    }

    fn get(&self, name: &str) -> Result<&TransformFn, Error> {
        self.functions
            .get(name)
            .ok_or_else(|| Error::unknown_transform(name))
    }
}

fn param_str<'a>(params: &'a BTreeMap<String, Value>, key: &str) -> Result<&'a str, Error> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::transform_failed(format!("missing string parameter '{key}'")))
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `map_field(source, target)`: copies the source column to the target name.
fn map_field(mut table: Table, params: &BTreeMap<String, Value>) -> Result<Table, Error> {
    let source = param_str(params, "source")?.to_string();
    let target = param_str(params, "target")?.to_string();
    for row in &mut table {
        let value = row.get(&source).cloned().unwrap_or(Value::Null);
        row.insert(target.clone(), value);
    }
    Ok(table)
}

/// `concatenate_fields(col1, col2, output)`: string concatenation.
fn concatenate_fields(mut table: Table, params: &BTreeMap<String, Value>) -> Result<Table, Error> {
    let col1 = param_str(params, "col1")?.to_string();
    let col2 = param_str(params, "col2")?.to_string();
    let output = param_str(params, "output")?.to_string();
    for row in &mut table {
        let left = row.get(&col1).map(value_as_text).unwrap_or_default();
        let right = row.get(&col2).map(value_as_text).unwrap_or_default();
        row.insert(output.clone(), Value::String(format!("{left}{right}")));
    }
    Ok(table)
}

fn numeric(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

fn number_value(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// `multiply_by_value(column, value, output)`: scales a numeric column.
fn multiply_by_value(mut table: Table, params: &BTreeMap<String, Value>) -> Result<Table, Error> {
    let column = param_str(params, "column")?.to_string();
    let factor = params
        .get("value")
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::transform_failed("missing numeric parameter 'value'"))?;
    let output = param_str(params, "output")?.to_string();
    for row in &mut table {
        let result = numeric(row.get(&column)).map_or(Value::Null, |v| number_value(v * factor));
        row.insert(output.clone(), result);
    }
    Ok(table)
}

/// `subtract_columns(from_col, other_col, output)`.
fn subtract_columns(mut table: Table, params: &BTreeMap<String, Value>) -> Result<Table, Error> {
    let from_col = param_str(params, "from_col")?.to_string();
    let other_col = param_str(params, "other_col")?.to_string();
    let output = param_str(params, "output")?.to_string();
    for row in &mut table {
        let result = match (numeric(row.get(&from_col)), numeric(row.get(&other_col))) {
            (Some(a), Some(b)) => number_value(a - b),
            _ => Value::Null,
        };
        row.insert(output.clone(), result);
    }
    Ok(table)
}

/// `operator(operator, col1, col2, output)`: columnwise arithmetic.
fn apply_operator(mut table: Table, params: &BTreeMap<String, Value>) -> Result<Table, Error> {
    let operator = param_str(params, "operator")?.to_string();
    let col1 = param_str(params, "col1")?.to_string();
    let col2 = param_str(params, "col2")?.to_string();
    let output = param_str(params, "output")?.to_string();

    for row in &mut table {
        let result = match (numeric(row.get(&col1)), numeric(row.get(&col2))) {
            (Some(a), Some(b)) => match operator.as_str() {
                "add" => number_value(a + b),
                "subtract" => number_value(a - b),
                "multiply" => number_value(a * b),
                "divide" => {
                    if b == 0.0 {
                        Value::Null
                    } else {
                        number_value(a / b)
                    }
                }
                other => {
                    return Err(Error::transform_failed(format!(
                        "unsupported operator: {other}"
                    )))
                }
            },
            _ => Value::Null,
        };
        row.insert(output.clone(), result);
    }
    Ok(table)
}

/// Normalizes a dataset value into a flat table. Arrays contribute their
/// object elements as rows; a bare object is a one-row table.
fn to_table(dataset: &Value) -> Result<Table, Error> {
    match dataset {
        Value::Array(elements) => Ok(elements
            .iter()
            .filter_map(Value::as_object)
            .cloned()
            .collect()),
        Value::Object(map) => Ok(vec![map.clone()]),
        other => Err(Error::transform_failed(format!(
            "dataset is not tabular: {other}"
        ))),
    }
}

/// Applies the export definitions to the dataset map.
///
/// With no exports configured, the dataset map passes through untouched.
/// Rows where any output field resolved to null are dropped.
///
/// # Errors
///
/// Returns a transform error for unknown datasets, unknown functions, and
/// function failures.
pub fn apply_exports(
    exports: &BTreeMap<String, ExportSpec>,
    datasets: &BTreeMap<String, Value>,
    registry: &Registry,
) -> Result<Value, Error> {
    if exports.is_empty() {
        let map: Map<String, Value> = datasets
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        return Ok(Value::Object(map));
    }

    let mut result = Map::new();
    for (export_name, export) in exports {
        let input = datasets.get(&export.dataframe).ok_or_else(|| {
            Error::transform_failed(format!(
                "export '{export_name}' references unknown dataset '{}'",
                export.dataframe
            ))
        })?;
        let input_rows = to_table(input)?;

        // Each output field runs its chain against a fresh copy of the
        // input table, then contributes one column
        let mut columns: Vec<(String, Vec<Value>)> = Vec::new();
        for (field_name, chain) in &export.fields {
            let mut table = input_rows.clone();
            for step in chain {
                let function = registry.get(&step.function)?;
                table = function(table, &step.params).map_err(|e| {
                    Error::transform_failed(format!(
                        "export '{export_name}', field '{field_name}', function '{}': {e}",
                        step.function
                    ))
                })?;
            }
            let column = table
                .iter()
                .map(|row| row.get(field_name).cloned().unwrap_or(Value::Null))
                .collect();
            columns.push((field_name.clone(), column));
        }

        let row_count = columns.iter().map(|(_, col)| col.len()).min().unwrap_or(0);
        let mut rows = Vec::with_capacity(row_count);
        for i in 0..row_count {
            let row: Map<String, Value> = columns
                .iter()
                .map(|(name, col)| (name.clone(), col[i].clone()))
                .collect();
            if row.values().any(Value::is_null) {
                continue; // incomplete row, dropped
            }
            rows.push(Value::Object(row));
        }
        result.insert(export_name.clone(), Value::Array(rows));
    }

    Ok(Value::Object(result))
}
