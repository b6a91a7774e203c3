//! Filter tree → SQL predicate over a jsonb column, with numbered
//! placeholders.

use pgvector::Vector;
use serde_json::{Map, Value};

use crate::common::scalar_to_string;
use crate::error::{Error, Result};

/// A bind value of the generated SQL.
#[derive(Debug, Clone)]
pub enum SqlValue {
    Int(i64),
    Float(f64),
    Text(String),
    TextArray(Vec<String>),
    Vector(Vector),
}

/// Accumulates bind values and hands out their placeholders.
#[derive(Debug, Default)]
pub struct SqlArgs {
    pub values: Vec<SqlValue>,
}

impl SqlArgs {
    pub fn push(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }
}

fn listify(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Guarded list extraction: scalar stored values yield an empty array
/// instead of a runtime error, so `overlaps` against a scalar is a
/// non-match.
fn list_elements(fields_column: &str, field: &str) -> String {
    format!(
        "ARRAY(SELECT jsonb_array_elements_text(CASE WHEN jsonb_typeof({fields_column}->'{field}') = 'array' THEN {fields_column}->'{field}' ELSE '[]'::jsonb END))"
    )
}

fn negated(condition: String, negate: bool) -> String {
    if negate {
        format!("NOT ({condition})")
    } else {
        condition
    }
}

fn build_leaf(
    field: &str,
    value: &Value,
    fields_column: &str,
    args: &mut SqlArgs,
    negate: bool,
) -> Result<Vec<String>> {
    let mut conditions = Vec::new();

    match value {
        Value::Object(operators) => {
            for (op, op_value) in operators {
                match op.as_str() {
                    "not" => {
                        conditions.extend(build_leaf(
                            field,
                            op_value,
                            fields_column,
                            args,
                            !negate,
                        )?);
                    }
                    "gte" | "lte" => {
                        let number = op_value.as_f64().ok_or_else(|| {
                            Error::Config(format!("{op} on field {field} requires a number"))
                        })?;
                        let placeholder = args.push(SqlValue::Float(number));
                        let operator = if op == "gte" { ">=" } else { "<=" };
                        conditions.push(negated(
                            format!(
                                "CAST({fields_column}->>'{field}' AS double precision) {operator} {placeholder}"
                            ),
                            negate,
                        ));
                    }
                    "eq" => {
                        let condition = match op_value.as_f64() {
                            Some(number) => {
                                let placeholder = args.push(SqlValue::Float(number));
                                format!(
                                    "CAST({fields_column}->>'{field}' AS double precision) = {placeholder}"
                                )
                            }
                            None => {
                                let placeholder =
                                    args.push(SqlValue::Text(scalar_to_string(op_value)));
                                format!("{fields_column}->>'{field}' = {placeholder}")
                            }
                        };
                        conditions.push(negated(condition, negate));
                    }
                    "contains" => {
                        // All-of on a list field.
                        let values = listify(op_value);
                        let placeholder = args.push(SqlValue::Text(
                            Value::Array(values).to_string(),
                        ));
                        conditions.push(negated(
                            format!("{fields_column}->'{field}' @> ({placeholder})::jsonb"),
                            negate,
                        ));
                    }
                    "in" => {
                        // Any-of: compare the jsonb text representation.
                        let values: Vec<String> =
                            listify(op_value).iter().map(|v| v.to_string()).collect();
                        let placeholder = args.push(SqlValue::TextArray(values));
                        conditions.push(negated(
                            format!("({fields_column}->'{field}')::text = ANY({placeholder})"),
                            negate,
                        ));
                    }
                    "overlaps" => {
                        // Intersect-any on a list field.
                        let values: Vec<String> =
                            listify(op_value).iter().map(scalar_to_string).collect();
                        let placeholder = args.push(SqlValue::TextArray(values));
                        conditions.push(negated(
                            format!("{} && {placeholder}", list_elements(fields_column, field)),
                            negate,
                        ));
                    }
                    other => {
                        return Err(Error::Config(format!(
                            "unknown filter operator: {other}"
                        )));
                    }
                }
            }
        }
        scalar => {
            let placeholder = args.push(SqlValue::Text(scalar_to_string(scalar)));
            conditions.push(negated(
                format!("{fields_column}->>'{field}' = {placeholder}"),
                negate,
            ));
        }
    }

    Ok(conditions)
}

/// Translate a filter tree into one SQL predicate over `fields_column`.
pub fn build_filter_sql(
    filters: &Map<String, Value>,
    fields_column: &str,
    args: &mut SqlArgs,
) -> Result<String> {
    let mut conditions = Vec::new();

    for (key, value) in filters {
        match key.as_str() {
            "and" | "or" => {
                let subfilters = value.as_array().ok_or_else(|| {
                    Error::Config(format!("{key} expects a list of filters"))
                })?;
                let mut nested = Vec::new();
                for subfilter in subfilters {
                    let map = subfilter
                        .as_object()
                        .ok_or_else(|| Error::Config(format!("{key} expects filter objects")))?;
                    nested.push(build_filter_sql(map, fields_column, args)?);
                }
                let joiner = if key == "and" { " AND " } else { " OR " };
                conditions.push(format!("({})", nested.join(joiner)));
            }
            "not" => {
                let map = value
                    .as_object()
                    .ok_or_else(|| Error::Config("not expects a filter object".into()))?;
                let nested = build_filter_sql(map, fields_column, args)?;
                conditions.push(format!("NOT ({nested})"));
            }
            field => {
                conditions.extend(build_leaf(field, value, fields_column, args, false)?);
            }
        }
    }

    Ok(conditions.join(" AND "))
}
