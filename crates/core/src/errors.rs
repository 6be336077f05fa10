use thiserror::Error;

/// Failure talking to the completion API. Never crosses a component boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModelCallError {
    #[error("model transport failure: {0}")]
    Transport(String),
    #[error("model API returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("model returned an empty completion")]
    EmptyResponse,
    #[error("model output did not match the expected shape: {0}")]
    MalformedOutput(String),
}

/// Failure creating the external task. This is the one loud failure in the pipeline.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TaskCreationError {
    #[error("task API unreachable: {0}")]
    Transport(String),
    #[error("task API rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("task API returned an unusable response: {0}")]
    InvalidResponse(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    TaskCreation(#[from] TaskCreationError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("upstream failure: {message}")]
    Upstream { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Upstream { .. } => "Failed to create task.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } | Self::Upstream { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. } | Self::Upstream { correlation_id, .. } => {
                correlation_id
            }
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Upstream { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::InvalidInput(message) => Self::BadRequest { message, correlation_id },
            ApplicationError::TaskCreation(error) => {
                Self::Upstream { message: error.to_string(), correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, InterfaceError, TaskCreationError};

    #[test]
    fn invalid_input_maps_to_bad_request_with_correlation_id() {
        let interface =
            ApplicationError::InvalidInput("text must not be empty".to_owned()).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn task_creation_failure_keeps_underlying_cause() {
        let interface = ApplicationError::from(TaskCreationError::Rejected {
            status: 403,
            message: "Forbidden".to_owned(),
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Upstream { .. }));
        assert!(interface.message().contains("403"));
        assert!(interface.message().contains("Forbidden"));
        assert_eq!(interface.correlation_id(), "req-2");
    }
}
