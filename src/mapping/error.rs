//! Error definitions for the mapping module

use thiserror::Error;

use crate::controller::DeviceId;
use crate::persistence::ProfileError;

/// Errors raised while resolving or editing mappings
#[derive(Debug, Error)]
pub enum MappingError {
    /// The device has no record and there is no `default` record to clone
    #[error("No mapping for {0} and no 'default' record to clone")]
    MissingDefault(DeviceId),

    /// The backing profile store failed
    #[error("Profile store error: {0}")]
    Store(#[from] ProfileError),
}
