use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Map, Value};

use crate::error::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
}

impl ParamKind {
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Object => "object",
        }
    }
}

/// One declared tool argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
    pub default: Option<Value>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: true,
            default: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn optional(
        name: &'static str,
        kind: ParamKind,
        description: &'static str,
        default: Value,
    ) -> Self {
        Self {
            required: false,
            default: Some(default),
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_range(mut self, minimum: i64, maximum: i64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSchema {
    pub params: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    pub fn required_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().filter(|p| p.required).map(|p| p.name)
    }

    /// JSON Schema (draft 7) form, used both for validation and for
    /// advertising the tool to the model and to protocol clients.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut property = json!({
                "type": param.kind.json_type(),
                "description": param.description,
            });
            if let Some(default) = &param.default {
                property["default"] = default.clone();
            }
            if let Some(minimum) = param.minimum {
                property["minimum"] = json!(minimum);
            }
            if let Some(maximum) = param.maximum {
                property["maximum"] = json!(maximum);
            }
            properties.insert(param.name.to_string(), property);
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_keys().collect::<Vec<_>>(),
        })
    }

    /// Check `arguments` against the declared parameters and return them with
    /// defaults filled in. The first missing required key is named in the
    /// error.
    pub fn validate(&self, arguments: &Value) -> Result<Map<String, Value>, ToolError> {
        let mut args = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => {
                return Err(ToolError::InvalidArguments(
                    "arguments must be a JSON object".to_string(),
                ))
            }
        };

        for param in &self.params {
            match args.get(param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        return Err(ToolError::InvalidArguments(format!(
                            "missing required argument: {}",
                            param.name
                        )));
                    }
                    if let Some(default) = &param.default {
                        args.insert(param.name.to_string(), default.clone());
                    }
                }
                Some(value) => {
                    if let Some(coerced) = coerce_numeric(param.kind, value) {
                        args.insert(param.name.to_string(), coerced);
                    }
                }
            }
        }

        let schema_value = self.to_json_schema();
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema_value)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid tool schema: {}", e)))?;

        let instance = Value::Object(args.clone());
        if let Err(errors) = schema.validate(&instance) {
            let error_messages: Vec<String> = errors
                .map(|e| format!("{}: {}", e.instance_path, e))
                .collect();
            return Err(ToolError::InvalidArguments(error_messages.join("; ")));
        }

        Ok(args)
    }
}

/// Small models often quote numbers ("30") or send whole numbers as floats
/// (30.0); accept those for numeric params.
fn coerce_numeric(kind: ParamKind, value: &Value) -> Option<Value> {
    match (kind, value) {
        (ParamKind::Integer, Value::Number(n)) if n.as_i64().is_none() => {
            let f = n.as_f64()?;
            let whole = f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64;
            whole.then(|| Value::from(f as i64))
        }
        (ParamKind::Integer, Value::String(text)) => {
            text.trim().parse::<i64>().ok().map(Value::from)
        }
        (ParamKind::Number, Value::String(text)) => {
            text.trim().parse::<f64>().ok().map(Value::from)
        }
        _ => None,
    }
}
