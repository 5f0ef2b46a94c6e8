//! Application error type.
//!
//! Every failure carries a [`ErrorKind`] so callers can branch on the
//! condition itself, plus the process exit code the binary should use.

/// Failure modes of a density run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad command line (missing positional arguments, unknown flags).
    Usage,
    /// Invalid configuration value (flag or environment).
    Config,
    /// Missing or malformed input variables.
    Input,
    /// Too few samples, mismatched lengths or non-finite coordinates.
    InvalidSample,
    /// Grid step is not usable or the grid would be too large.
    InvalidGrid,
    /// Sample covariance is singular (identical or collinear samples).
    SingularCovariance,
    /// Density grid has no usable range (constant or non-finite values).
    DegenerateRange,
    /// Evaluation was cancelled through a `CancelToken`.
    Cancelled,
    /// A pipeline transition was requested from the wrong state.
    State,
    /// Writing the output failed.
    Output,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Usage | ErrorKind::Config | ErrorKind::Input => 2,
            ErrorKind::InvalidSample | ErrorKind::InvalidGrid => 3,
            ErrorKind::SingularCovariance
            | ErrorKind::DegenerateRange
            | ErrorKind::Cancelled
            | ErrorKind::State => 4,
            ErrorKind::Output => 5,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Input, message)
    }

    pub fn invalid_sample(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSample, message)
    }

    pub fn invalid_grid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidGrid, message)
    }

    pub fn singular_covariance(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SingularCovariance, message)
    }

    pub fn degenerate_range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DegenerateRange, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::State, message)
    }

    pub fn output(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Output, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code())
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
