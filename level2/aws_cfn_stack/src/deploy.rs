//! Applies a synthesized template with CloudFormation and waits for it to settle.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_cloudformation::error::DisplayErrorContext;
use aws_sdk_cloudformation::types::{Capability, OnFailure, Parameter, Stack};
use tracing::{debug, info};

use crate::{SavedTemplate, StackError};

/// Where a stack status string puts the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    InProgress,
    Complete,
    Deleted,
    Failed,
}

pub fn classify_status(status: &str) -> StatusClass {
    match status {
        s if s.ends_with("_IN_PROGRESS") => StatusClass::InProgress,
        "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "IMPORT_COMPLETE" => StatusClass::Complete,
        // the previous template is back in place and the stack is usable.
        "UPDATE_ROLLBACK_COMPLETE" | "IMPORT_ROLLBACK_COMPLETE" => StatusClass::Complete,
        "DELETE_COMPLETE" => StatusClass::Deleted,
        // ROLLBACK_COMPLETE after a failed create, *_FAILED, and anything new.
        _ => StatusClass::Failed,
    }
}

/// whether an UpdateStack error only says the template and parameters are unchanged.
pub fn is_no_op_update(message: &str) -> bool {
    message.contains("No updates are to be performed")
}

/// The outputs of a settled stack, unless the change this deploy submitted
/// was rolled back. A stack that was already rolled back before an
/// unchanged deploy is usable as is.
pub fn settled_outputs(
    name: &str,
    changed: bool,
    status: &str,
    outputs: HashMap<String, String>,
) -> Result<HashMap<String, String>, StackError> {
    if changed && status.ends_with("ROLLBACK_COMPLETE") {
        return Err(StackError::StackFailed {
            stack: name.to_string(),
            status: status.to_string(),
            reason: "the update was rolled back, see the stack events for the failing resource".to_string(),
        });
    }
    Ok(outputs)
}

#[derive(Debug, Clone, PartialEq)]
pub enum StackState {
    Missing,
    InProgress(String),
    Complete { status: String, outputs: HashMap<String, String> },
    Failed { status: String, reason: String },
}

fn stack_state(stack: &Stack) -> StackState {
    let status = stack.stack_status().map(|s| s.as_str().to_string()).unwrap_or_default();
    match classify_status(&status) {
        StatusClass::InProgress => StackState::InProgress(status),
        StatusClass::Deleted => StackState::Missing,
        StatusClass::Complete => {
            let mut outputs = HashMap::new();
            for output in stack.outputs() {
                if let (Some(key), Some(val)) = (output.output_key(), output.output_value()) {
                    outputs.insert(key.to_string(), val.to_string());
                }
            }
            StackState::Complete { status, outputs }
        }
        StatusClass::Failed => StackState::Failed {
            reason: stack
                .stack_status_reason()
                .unwrap_or("Failed to get stack failure reason")
                .to_string(),
            status,
        },
    }
}

pub struct StackDeployer {
    client: aws_sdk_cloudformation::Client,
    poll_interval: Duration,
}

impl StackDeployer {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudformation::Client::new(config),
            poll_interval: Duration::from_millis(700),
        }
    }

    pub async fn describe_stack(&self, name: &str) -> Result<StackState, StackError> {
        match self.client.describe_stacks().stack_name(name).send().await {
            Ok(d) => Ok(d.stacks().first().map(stack_state).unwrap_or(StackState::Missing)),
            Err(e) => {
                let e_str = DisplayErrorContext(&e).to_string();
                if e_str.contains("does not exist") {
                    return Ok(StackState::Missing);
                }
                Err(StackError::Cloudformation { op: "DescribeStacks", stack: name.to_string(), message: e_str })
            }
        }
    }

    pub async fn does_stack_exist(&self, name: &str) -> Result<bool, StackError> {
        Ok(self.describe_stack(name).await? != StackState::Missing)
    }

    /// polls until the stack reaches a terminal state and returns that status with the outputs.
    pub async fn wait_for_output(&self, name: &str) -> Result<(String, HashMap<String, String>), StackError> {
        let mut last_status = String::new();
        loop {
            tokio::time::sleep(self.poll_interval).await;
            match self.describe_stack(name).await? {
                StackState::Complete { status, outputs } => {
                    info!(stack = name, %status, "stack settled");
                    return Ok((status, outputs));
                }
                StackState::InProgress(status) => {
                    if status != last_status {
                        info!(stack = name, %status, "waiting for stack");
                        last_status = status;
                    } else {
                        debug!(stack = name, "still waiting");
                    }
                }
                StackState::Failed { status, reason } => {
                    return Err(StackError::StackFailed { stack: name.to_string(), status, reason });
                }
                StackState::Missing => {
                    return Err(StackError::StackFailed {
                        stack: name.to_string(),
                        status: "DELETE_COMPLETE".to_string(),
                        reason: "stack was rolled back and deleted".to_string(),
                    });
                }
            }
        }
    }

    /// returns false when CloudFormation reports there is nothing to update.
    pub async fn create_or_update_stack(
        &self,
        name: &str,
        body: &str,
        parameters: &[(String, String)],
    ) -> Result<bool, StackError> {
        let parameters: Vec<Parameter> = parameters
            .iter()
            .map(|(key, value)| Parameter::builder().parameter_key(key).parameter_value(value).build())
            .collect();
        if self.does_stack_exist(name).await? {
            info!(stack = name, "updating stack");
            let result = self
                .client
                .update_stack()
                .capabilities(Capability::CapabilityNamedIam)
                .capabilities(Capability::CapabilityIam)
                .stack_name(name)
                .template_body(body)
                .set_parameters(Some(parameters))
                .send()
                .await;
            if let Err(e) = result {
                let e_str = DisplayErrorContext(&e).to_string();
                if is_no_op_update(&e_str) {
                    info!(stack = name, "no changes to deploy");
                    return Ok(false);
                }
                return Err(StackError::Cloudformation { op: "UpdateStack", stack: name.to_string(), message: e_str });
            }
        } else {
            info!(stack = name, "creating stack");
            self.client
                .create_stack()
                .on_failure(OnFailure::Delete)
                .capabilities(Capability::CapabilityNamedIam)
                .capabilities(Capability::CapabilityIam)
                .stack_name(name)
                .template_body(body)
                .set_parameters(Some(parameters))
                .send()
                .await
                .map_err(|e| StackError::Cloudformation {
                    op: "CreateStack",
                    stack: name.to_string(),
                    message: DisplayErrorContext(&e).to_string(),
                })?;
        }
        Ok(true)
    }

    /// create or update, then wait. An unchanged stack still returns its current outputs.
    pub async fn deploy(
        &self,
        name: &str,
        template: &SavedTemplate,
        parameters: &[(String, String)],
    ) -> Result<HashMap<String, String>, StackError> {
        let body = template.to_body()?;
        debug!(stack = name, resources = template.resources.len(), "deploying template");
        let changed = self.create_or_update_stack(name, &body, parameters).await?;
        let (status, outputs) = self.wait_for_output(name).await?;
        settled_outputs(name, changed, &status, outputs)
    }

    pub async fn delete_stack(&self, name: &str) -> Result<(), StackError> {
        if !self.does_stack_exist(name).await? {
            info!(stack = name, "stack does not exist, nothing to delete");
            return Ok(());
        }
        info!(stack = name, "deleting stack");
        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(|e| StackError::Cloudformation {
                op: "DeleteStack",
                stack: name.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        loop {
            tokio::time::sleep(self.poll_interval).await;
            match self.describe_stack(name).await? {
                StackState::Missing => {
                    info!(stack = name, "stack deleted");
                    return Ok(());
                }
                StackState::Failed { status, reason } => {
                    return Err(StackError::StackFailed { stack: name.to_string(), status, reason });
                }
                _ => debug!(stack = name, "waiting for delete"),
            }
        }
    }
}
