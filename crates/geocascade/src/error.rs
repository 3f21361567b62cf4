use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeocascadeError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
    #[error("Stage error: {0}")]
    Stage(#[from] crate::pipeline::StageError),
    #[error("Service error: {0}")]
    Service(#[from] geocascade_services::ServiceError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GeocascadeError>;
