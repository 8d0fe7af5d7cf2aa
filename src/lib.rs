//! Infrastructure for a personal website and its data API, declared as a
//! CloudFormation stack.
//!
//! The resource crates under `level2/` each push typed resources onto an
//! [`aws_cfn_stack::Input`]. This crate composes them into two units, the
//! [`data_api`] and the [`static_site`], assembles those into a
//! [`WebsiteStack`] from [`Settings`], and [`deploy`]s the result.

pub mod config;
pub mod data_api;
pub mod deploy;
pub mod error;
pub mod stack;
pub mod static_site;

pub use config::Settings;
pub use deploy::{DeployReport, Deployer};
pub use error::{Error, Result};
pub use stack::{resolve_zone, WebsiteStack};
