use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[cfg(feature = "http")]
    #[error("HTTP error calling {service}: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} responded with status {status}")]
    Status { service: &'static str, status: u16 },
    #[error("{service} request timed out")]
    Timeout { service: &'static str },
    #[error("{service} returned an invalid response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Invalid gid '{0}': expected source:layer:id")]
    InvalidGid(String),
}

impl ServiceError {
    #[cfg(feature = "http")]
    pub(crate) fn from_reqwest(service: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { service }
        } else if let Some(status) = source.status() {
            Self::Status {
                service,
                status: status.as_u16(),
            }
        } else {
            Self::Http { service, source }
        }
    }

    /// Name of the service that produced the error, when known.
    pub fn service(&self) -> Option<&'static str> {
        match self {
            #[cfg(feature = "http")]
            Self::Http { service, .. } => Some(service),
            Self::Status { service, .. }
            | Self::Timeout { service }
            | Self::InvalidResponse { service, .. }
            | Self::Unavailable { service, .. } => Some(service),
            Self::Serde(_) | Self::InvalidGid(_) => None,
        }
    }
}
