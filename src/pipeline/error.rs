use thiserror::Error;

/// Invalid bundle declarations, detected before any traffic is served.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("route `{0}` is registered by more than one bundle")]
    DuplicateRoute(String),
    #[error("bundle `{0}` does not include any source files")]
    EmptySources(String),
    #[error("invalid route `{route}`: {reason}")]
    InvalidRoute { route: String, reason: &'static str },
}

/// A post-processing step rejected its input.
#[derive(Debug, Error)]
#[error("post-processor `{step}` failed: {message}")]
pub struct ProcessorError {
    pub step: String,
    pub message: String,
}

impl ProcessorError {
    pub fn new(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
        }
    }
}

/// Failures while rendering a single bundle for a single request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source file `{path}` could not be found")]
    SourceFileMissing { path: String },
    #[error("failed to read source file `{path}`")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::SourceFileMissing { path };
        }
        Self::Io { path, source }
    }
}
