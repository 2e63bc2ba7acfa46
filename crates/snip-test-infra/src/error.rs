use std::result::Result as StdResult;
use thiserror::Error;

/// Errors raised while provisioning disposable test services.
#[derive(Debug, Error)]
pub enum TestInfraError {
    #[error("container error: {0}")]
    Container(#[from] testcontainers::TestcontainersError),
}

pub type Result<T> = StdResult<T, TestInfraError>;
