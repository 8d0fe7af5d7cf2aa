//! Helpers for CloudFormation intrinsic functions.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const ACCOUNT_ID: &str = "AWS::AccountId";
pub const PARTITION: &str = "AWS::Partition";
pub const REGION: &str = "AWS::Region";
pub const URL_SUFFIX: &str = "AWS::URLSuffix";

/// `{ "Ref": logical_id }`
pub fn get_ref(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{ "Fn::GetAtt": [logical_id, attribute] }`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{ "Fn::Sub": template }`
pub fn sub(template: impl Into<String>) -> Value {
    json!({ "Fn::Sub": template.into() })
}

/// `{ "Fn::Join": [delimiter, parts] }`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// A property value that is either a plain string or an intrinsic function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrVal {
    String(String),
    Val(Value),
}

impl Default for StrVal {
    fn default() -> Self {
        StrVal::String(String::new())
    }
}

impl StrVal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StrVal::String(s) => Some(s),
            StrVal::Val(Value::String(s)) => Some(s),
            StrVal::Val(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.as_str(), Some(""))
    }
}

impl From<&str> for StrVal {
    fn from(value: &str) -> Self {
        StrVal::String(value.to_string())
    }
}

impl From<String> for StrVal {
    fn from(value: String) -> Self {
        StrVal::String(value)
    }
}

impl From<&String> for StrVal {
    fn from(value: &String) -> Self {
        StrVal::String(value.clone())
    }
}

impl From<Value> for StrVal {
    fn from(value: Value) -> Self {
        StrVal::Val(value)
    }
}

impl From<StrVal> for Value {
    fn from(value: StrVal) -> Self {
        match value {
            StrVal::String(s) => Value::String(s),
            StrVal::Val(v) => v,
        }
    }
}
