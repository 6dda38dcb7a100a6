use thiserror::Error;

use crate::controller::SourceError;
use crate::mapping::MappingError;
use crate::output::SinkError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Device source error: {0}")]
    Source(#[from] SourceError),

    #[error("Input sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Channel communication error: {0}")]
    ChannelError(String),

    #[error("Engine task error: {0}")]
    Task(String),
}
