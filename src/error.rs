//! Error type of the service facade.

use thiserror::Error;

use scatter_adapters::AdapterError;
use scatter_core::{AggregateError, BoxError, ConfigurationError, TraceLookupError};
use scatter_types::EntityError;

use crate::settings::SettingsError;

#[derive(Debug, Error)]
pub enum ScatterError {
    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Traces(#[from] TraceLookupError),

    #[error("service graph request failed: {0}")]
    Upstream(#[source] BoxError),
}

impl ScatterError {
    /// Whether the failure was caused by the caller's input rather than the
    /// service or its upstreams.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ScatterError::Entity(_)
                | ScatterError::Aggregate(
                    AggregateError::InvalidDuration(_) | AggregateError::InvalidRange { .. }
                )
        )
    }
}
