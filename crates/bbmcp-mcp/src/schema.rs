//! Declarative tool parameters.
//!
//! Every tool describes its arguments once as a slice of [`ParamSpec`]. The
//! same declaration produces the advertised JSON Schema and drives argument
//! validation, so the two cannot drift apart.

use bbmcp_core::{Error, Result};
use serde_json::{Map, Value};

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy)]
pub enum ParamKind {
    String,
    Integer,
    /// Non-negative integer such as an entity ID.
    Id,
    StringArray,
    /// Object whose fields are all optional.
    Object(&'static [ParamSpec]),
}

impl ParamKind {
    /// JSON Schema type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer | ParamKind::Id => "integer",
            ParamKind::StringArray => "array",
            ParamKind::Object(_) => "object",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            ParamKind::String => "a string",
            ParamKind::Integer => "an integer",
            ParamKind::Id => "a non-negative integer",
            ParamKind::StringArray => "an array of strings",
            ParamKind::Object(_) => "an object",
        }
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
    /// Advertised allowed values; the remote API does the enforcing.
    pub enum_values: &'static [&'static str],
}

impl ParamSpec {
    pub const fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::String, description)
    }

    pub const fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Integer, description)
    }

    pub const fn id(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::Id, description)
    }

    pub const fn string_array(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamKind::StringArray, description)
    }

    pub const fn object(
        name: &'static str,
        fields: &'static [ParamSpec],
        description: &'static str,
    ) -> Self {
        Self::new(name, ParamKind::Object(fields), description)
    }

    const fn new(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
            enum_values: &[],
        }
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn one_of(self, values: &'static [&'static str]) -> Self {
        Self {
            enum_values: values,
            ..self
        }
    }

    fn schema(&self) -> Value {
        let mut schema = match self.kind {
            ParamKind::StringArray => serde_json::json!({
                "type": "array",
                "items": { "type": "string" }
            }),
            ParamKind::Object(fields) => object_schema(fields),
            ParamKind::Id => serde_json::json!({ "type": "integer", "minimum": 0 }),
            kind => serde_json::json!({ "type": kind.type_name() }),
        };

        if let Some(obj) = schema.as_object_mut() {
            obj.insert("description".into(), self.description.into());
            if !self.enum_values.is_empty() {
                obj.insert("enum".into(), self.enum_values.into());
            }
        }
        schema
    }

    /// Coerce `value` to this parameter's kind, or `None` if it does not fit.
    fn normalize(&self, value: &Value) -> Option<Value> {
        match (self.kind, value) {
            (ParamKind::String, Value::String(_)) => Some(value.clone()),
            (ParamKind::Integer, Value::Number(n)) => match n.as_i64() {
                Some(i) => Some(Value::from(i)),
                None if n.is_u64() => None,
                // Clients send numbers as floats; drop the fraction
                None => n
                    .as_f64()
                    .map(f64::trunc)
                    .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .map(|f| Value::from(f as i64)),
            },
            (ParamKind::Id, Value::Number(n)) => match n.as_u64() {
                Some(u) => Some(Value::from(u)),
                None if n.is_i64() => None,
                None => n
                    .as_f64()
                    .map(f64::trunc)
                    .filter(|f| *f >= 0.0 && *f < u64::MAX as f64)
                    .map(|f| Value::from(f as u64)),
            },
            (ParamKind::StringArray, Value::Array(items)) => Some(Value::Array(
                items.iter().filter(|v| v.is_string()).cloned().collect(),
            )),
            (ParamKind::Object(fields), Value::Object(map)) => {
                Some(Value::Object(keep_matching(fields, map)))
            }
            _ => None,
        }
    }
}

/// JSON Schema (`type: object`) describing `params`.
pub fn object_schema(params: &[ParamSpec]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|p| (p.name.to_string(), p.schema()))
        .collect();

    let required: Vec<&str> = params.iter().filter(|p| p.required).map(|p| p.name).collect();

    let mut schema = serde_json::json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = required.into();
    }
    schema
}

/// Validate raw tool arguments against `params`.
///
/// Returns only the declared, correctly typed arguments. Every missing or
/// mistyped required parameter is reported in one [`Error::InvalidArguments`];
/// optional parameters that do not fit are dropped.
pub fn validate(params: &[ParamSpec], arguments: Option<&Value>) -> Result<Map<String, Value>> {
    let empty = Map::new();
    let args = match arguments {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(Error::InvalidArguments(
                "arguments must be an object".to_string(),
            ))
        }
    };

    let problems: Vec<String> = params
        .iter()
        .filter(|p| p.required)
        .filter(|p| args.get(p.name).and_then(|v| p.normalize(v)).is_none())
        .map(|p| format!("{} is required and must be {}", p.name, p.kind.describe()))
        .collect();

    if !problems.is_empty() {
        return Err(Error::InvalidArguments(problems.join("; ")));
    }

    Ok(keep_matching(params, args))
}

fn keep_matching(params: &[ParamSpec], args: &Map<String, Value>) -> Map<String, Value> {
    params
        .iter()
        .filter_map(|p| {
            let value = args.get(p.name)?;
            p.normalize(value).map(|v| (p.name.to_string(), v))
        })
        .collect()
}
