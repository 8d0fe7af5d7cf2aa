use aws_cfn_stack::{AssetError, StackError};
use aws_route53::ZoneLookupError;
use dotenv_reader::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Stack(#[from] StackError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Zone(#[from] ZoneLookupError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
