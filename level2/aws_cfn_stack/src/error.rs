use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackError {
    #[error("Validation failed on resource '{resource}'\n{message}")]
    Validation { resource: String, message: String },

    #[error("Duplicate logical id '{0}'. Every resource in a stack must have a unique name")]
    DuplicateLogicalId(String),

    #[error("Resource '{resource}' references '{target}' which is not declared in this stack")]
    DanglingReference { resource: String, target: String },

    #[error("Failed to serialize template\n{0}")]
    Serialize(#[from] serde_json::Error),

    #[error("CloudFormation {op} failed for stack {stack}\n{message}")]
    Cloudformation {
        op: &'static str,
        stack: String,
        message: String,
    },

    #[error("Stack {stack} has no output {output}")]
    MissingOutput { stack: String, output: String },

    #[error("Stack {stack} ended in {status}: {reason}")]
    StackFailed {
        stack: String,
        status: String,
        reason: String,
    },
}

impl StackError {
    pub fn validation(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Failed to read asset {path}\n{source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Asset {0} contains no files")]
    Empty(std::path::PathBuf),

    #[error("Failed to package asset {path}\n{message}")]
    Package { path: std::path::PathBuf, message: String },

    #[error("Stack output {0} not found, cannot resolve the destination bucket")]
    MissingOutput(String),

    #[error("S3 {op} failed on bucket {bucket}\n{message}")]
    S3 {
        op: &'static str,
        bucket: String,
        message: String,
    },
}

impl AssetError {
    pub fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
