//! Unit parameters.
//!
//! A parameter is a named, typed setting of a unit. Its JSON form is
//!
//! ```json
//! { "name": "level", "type": "dropdown", "value": "high", "args": { "items": ["low", "high"] } }
//! ```
//!
//! where `args` holds arguments specific to the type. The shape of `value` must
//! match the declared type; this is checked with a JSON schema built for each
//! parameter.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use crate::{PipecacheError, Result};

/// Parameter types known to the editor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParamType {
    /// one value out of `args.items`
    Dropdown,
    /// free input, `args.datatype` is `number` or `string`
    Input,
    /// on/off switch
    Boolean,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub value: JsonValue,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, JsonValue>,
}

impl Parameter {
    pub fn dropdown<I, V>(
        name: &str,
        items: I,
        value: impl Into<JsonValue>,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        let items: Vec<JsonValue> = items.into_iter().map(Into::into).collect();
        let mut args = Map::new();
        args.insert("items".to_string(), JsonValue::Array(items));
        Self {
            name: name.to_string(),
            kind: ParamType::Dropdown,
            value: value.into(),
            args,
        }
    }

    pub fn number(
        name: &str,
        value: f64,
    ) -> Self {
        Self::input(name, "number", value.into())
    }

    pub fn text(
        name: &str,
        value: &str,
    ) -> Self {
        Self::input(name, "string", value.into())
    }

    pub fn boolean(
        name: &str,
        value: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamType::Boolean,
            value: JsonValue::Bool(value),
            args: Map::new(),
        }
    }

    fn input(
        name: &str,
        datatype: &str,
        value: JsonValue,
    ) -> Self {
        let mut args = Map::new();
        args.insert("datatype".to_string(), json!(datatype));
        Self {
            name: name.to_string(),
            kind: ParamType::Input,
            value,
            args,
        }
    }

    /// Parses and validates a parameter from its JSON form.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        let param = serde_json::from_value::<Self>(value).map_err(|e| PipecacheError::Validation(format!("invalid parameter: {}", e)))?;
        param.validate()?;
        Ok(param)
    }

    /// Returns the schema the JSON form of this parameter must satisfy.
    pub fn schema(&self) -> JsonValue {
        let (args, value) = match self.kind {
            ParamType::Dropdown => {
                let args = json!({
                    "type": "object",
                    "required": ["items"],
                    "properties": {
                        "items": { "type": "array", "minItems": 1 }
                    }
                });
                // the enum is only well formed once items is a non-empty list
                let value = match self.args.get("items") {
                    Some(JsonValue::Array(items)) if !items.is_empty() => json!({ "enum": items }),
                    _ => json!({}),
                };
                (args, value)
            }
            ParamType::Input => {
                let args = json!({
                    "type": "object",
                    "properties": {
                        "datatype": { "enum": ["number", "string"] }
                    }
                });
                let value = match self.args.get("datatype").and_then(JsonValue::as_str) {
                    Some("number") => json!({ "type": "number" }),
                    _ => json!({ "type": "string" }),
                };
                (args, value)
            }
            ParamType::Boolean => (json!({ "type": "object" }), json!({ "type": "boolean" })),
        };

        json!({
            "type": "object",
            "required": ["name", "type", "value"],
            "properties": {
                "name": { "type": "string", "minLength": 1 },
                "type": { "const": self.kind.as_ref() },
                "value": value,
                "args": args
            }
        })
    }

    /// Checks that the value matches the declared type.
    pub fn validate(&self) -> Result<()> {
        let instance = serde_json::to_value(self)?;
        if self.kind == ParamType::Dropdown && !self.args.contains_key("items") {
            return Err(PipecacheError::Validation(format!("parameter {}: dropdown requires args.items", self.name)));
        }
        jsonschema::validate(&self.schema(), &instance).map_err(|e| PipecacheError::Validation(format!("parameter {}: {}", self.name, e)))
    }
}

/// Validates every parameter of a unit and the uniqueness of their names.
pub fn validate_parameters(params: &[Parameter]) -> Result<()> {
    let mut names = HashSet::new();
    for param in params {
        param.validate()?;
        if !names.insert(param.name.as_str()) {
            return Err(PipecacheError::Validation(format!("duplicated parameter name {}", param.name)));
        }
    }
    Ok(())
}

/// Settings given to a unit when the caller has no specific ones.
///
/// - `dropdownPar`: dropdown over `low`, `medium`, `high`, set to `high`
/// - `numberPar`: numeric input set to `14.5`
/// - `boolPar`: boolean set to `false`
pub fn default_parameters() -> Vec<Parameter> {
    vec![
        Parameter::dropdown("dropdownPar", ["low", "medium", "high"], "high"),
        Parameter::number("numberPar", 14.5),
        Parameter::boolean("boolPar", false),
    ]
}
