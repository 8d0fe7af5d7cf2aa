//! CloudFormation template model shared by every resource crate.
//!
//! Resource crates push [`Resource`]s onto an [`Input`]; the top level crate
//! turns the [`Input`] into a [`SavedTemplate`] with
//! [`validate_resources_to_template`] and hands it to [`deploy::StackDeployer`].

pub use serde_json;

pub mod deploy;
mod error;
pub mod intrinsics;
pub mod assets;
pub mod iam;
mod template;

pub use error::{AssetError, StackError};
pub use intrinsics::*;
pub use iam::*;
pub use template::*;

use serde_json::Value;

/// Anything that can be rendered as the `Type` + `Properties` of a
/// CloudFormation resource.
pub trait CfnResource {
    fn type_string(&self) -> &'static str;
    fn properties(&self) -> Result<Value, serde_json::Error>;
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Serialize a property struct. Fails for types that cannot be represented
/// as JSON, such as maps with non-string keys.
pub fn to_properties<T: serde::Serialize>(props: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(props)
}

/// Implements [`CfnResource`] for a serde property struct.
///
/// ```ignore
/// cfn_resource!(CfnKey, "AWS::KMS::Key");
/// ```
#[macro_export]
macro_rules! cfn_resource {
    ($ty:ty, $type_string:expr) => {
        impl $crate::CfnResource for $ty {
            fn type_string(&self) -> &'static str {
                $type_string
            }
            fn properties(&self) -> Result<$crate::serde_json::Value, $crate::serde_json::Error> {
                $crate::to_properties(self)
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

pub struct Resource {
    pub name: String,
    pub properties: Box<dyn CfnResource>,
    pub depends_on: Vec<String>,
    pub deletion_policy: Option<DeletionPolicy>,
    pub update_replace_policy: Option<DeletionPolicy>,
}

impl Resource {
    pub fn new(name: impl Into<String>, properties: impl CfnResource + 'static) -> Self {
        Self {
            name: name.into(),
            properties: Box::new(properties),
            depends_on: vec![],
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    /// sets both `DeletionPolicy` and `UpdateReplacePolicy`.
    pub fn removal_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self.update_replace_policy = Some(policy);
        self
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("type", &self.properties.type_string())
            .field("depends_on", &self.depends_on)
            .finish()
    }
}

/// Everything a stack is built from. Resource crates only ever append to this.
#[derive(Debug, Default)]
pub struct Input {
    /// if left empty, [`validate_stack_name`] falls back to a default name.
    pub stack_name: String,
    pub description: String,
    pub resources: Vec<Resource>,
    pub parameters: Vec<(String, TemplateParameter)>,
    pub outputs: Vec<(String, ResourceOutput)>,
}

impl Input {
    pub fn push(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.resources.iter().any(|r| r.name == logical_id)
    }

    pub fn get(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == logical_id)
    }

    /// all resources of a given CloudFormation type, in declaration order.
    pub fn of_type<'a>(&'a self, ty: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources.iter().filter(move |r| r.properties.type_string() == ty)
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, description: impl Into<String>) {
        let param = TemplateParameter {
            ty: "String".to_string(),
            description: Some(description.into()),
        };
        self.parameters.push((name.into(), param));
    }

    pub fn add_output(&mut self, name: impl Into<String>, description: impl Into<String>, value: impl Into<Value>) {
        let output = ResourceOutput {
            description: description.into(),
            value: value.into(),
        };
        self.outputs.push((name.into(), output));
    }
}
