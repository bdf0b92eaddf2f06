use std::fmt::{self, Display};
use std::io;

/// Provides `SimError` and maps other errors to
/// convert to a `SimError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SimError {
    /// A grid access fell outside `[0, width) x [0, height)`. This is a logic defect in the
    /// caller and is never recovered from.
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    InvalidParameters(String),
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
}

impl From<io::Error> for SimError {
    fn from(error: io::Error) -> Self {
        SimError::IoError(error)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(error: serde_json::Error) -> Self {
        SimError::JsonError(error)
    }
}

impl From<csv::Error> for SimError {
    fn from(error: csv::Error) -> Self {
        SimError::CsvError(error)
    }
}

impl From<String> for SimError {
    fn from(error: String) -> Self {
        SimError::InvalidParameters(error)
    }
}

impl From<&str> for SimError {
    fn from(error: &str) -> Self {
        SimError::InvalidParameters(error.to_string())
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::IoError(error) => Some(error),
            SimError::JsonError(error) => Some(error),
            SimError::CsvError(error) => Some(error),
            SimError::OutOfBounds { .. } | SimError::InvalidParameters(_) => None,
        }
    }
}

impl Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::OutOfBounds {
                x,
                y,
                width,
                height,
            } => write!(
                f,
                "Cell position ({x}, {y}) out of bounds for {width}x{height} grid"
            ),
            SimError::InvalidParameters(message) => write!(f, "Invalid parameters: {message}"),
            SimError::IoError(error) => write!(f, "I/O error: {error}"),
            SimError::JsonError(error) => write!(f, "JSON error: {error}"),
            SimError::CsvError(error) => write!(f, "CSV error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_message() {
        let error = SimError::OutOfBounds {
            x: 10,
            y: 2,
            width: 10,
            height: 5,
        };
        assert_eq!(
            error.to_string(),
            "Cell position (10, 2) out of bounds for 10x5 grid"
        );
    }

    #[test]
    fn string_converts_to_invalid_parameters() {
        let error: SimError = "bound must be positive".into();
        assert!(matches!(error, SimError::InvalidParameters(ref m) if m == "bound must be positive"));
    }

    #[test]
    fn io_error_has_source() {
        let error: SimError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(std::error::Error::source(&error).is_some());
    }
}
