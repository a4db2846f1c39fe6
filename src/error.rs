//! Error types.
//!
//! - `CalibError` is what the calibration engine returns. Every kind says *why*
//!   a computation could not produce a valid result; callers decide whether it is
//!   recoverable (`Continue` usually is).
//! - `AppError` is the front-end error: a message plus a process exit code.

/// Result alias for engine routines.
pub type CalibResult<T> = Result<T, CalibError>;

/// Failure kinds of the calibration engine.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibError {
    /// A required input was empty or missing.
    NullInput(String),
    /// Bad numeric range: non-positive widths/tolerances, non-increasing dispersion,
    /// degree mismatches.
    IllegalInput(String),
    /// Buffer or length mismatch between inputs.
    IncompatibleInput(String),
    /// No roots, lines or maxima could be found.
    DataNotFound(String),
    /// Did not converge within the iteration budget.
    Continue(String),
    /// The requested search mode is not available.
    UnsupportedMode(String),
    /// A division by an exactly zero quantity was required.
    DivisionByZero(String),
}

impl CalibError {
    /// Short kind label for reports and logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CalibError::NullInput(_) => "NullInput",
            CalibError::IllegalInput(_) => "IllegalInput",
            CalibError::IncompatibleInput(_) => "IncompatibleInput",
            CalibError::DataNotFound(_) => "DataNotFound",
            CalibError::Continue(_) => "Continue",
            CalibError::UnsupportedMode(_) => "UnsupportedMode",
            CalibError::DivisionByZero(_) => "DivisionByZero",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CalibError::NullInput(m)
            | CalibError::IllegalInput(m)
            | CalibError::IncompatibleInput(m)
            | CalibError::DataNotFound(m)
            | CalibError::Continue(m)
            | CalibError::UnsupportedMode(m)
            | CalibError::DivisionByZero(m) => m,
        }
    }

    /// `true` for the "try again with a larger budget or looser tolerance" kind.
    pub fn is_continue(&self) -> bool {
        matches!(self, CalibError::Continue(_))
    }
}

impl std::fmt::Display for CalibError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind_name(), self.message())
    }
}

impl std::error::Error for CalibError {}

impl From<argmin::core::Error> for CalibError {
    fn from(err: argmin::core::Error) -> Self {
        use argmin::core::ArgminError;
        match err.downcast::<ArgminError>() {
            Ok(ArgminError::InvalidParameter { text }) => CalibError::IllegalInput(text),
            Ok(ArgminError::NotImplemented { text }) => CalibError::UnsupportedMode(text),
            Ok(other) => CalibError::Continue(format!("optimiser failure: {other}")),
            Err(err) => match err.downcast::<CalibError>() {
                Ok(calib) => calib,
                Err(err) => CalibError::Continue(format!("optimiser failure: {err}")),
            },
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<CalibError> for AppError {
    fn from(err: CalibError) -> Self {
        let exit_code = match err {
            CalibError::NullInput(_) | CalibError::IllegalInput(_) | CalibError::IncompatibleInput(_) => 2,
            CalibError::DataNotFound(_) => 3,
            CalibError::Continue(_) | CalibError::UnsupportedMode(_) | CalibError::DivisionByZero(_) => 4,
        };
        AppError::new(exit_code, format!("Calibration failed: {err}"))
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
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calib_error_maps_to_exit_codes() {
        let e: AppError = CalibError::IllegalInput("slit".into()).into();
        assert_eq!(e.exit_code(), 2);
        let e: AppError = CalibError::DataNotFound("lines".into()).into();
        assert_eq!(e.exit_code(), 3);
        let e: AppError = CalibError::Continue("budget".into()).into();
        assert_eq!(e.exit_code(), 4);
        assert!(e.to_string().contains("Continue: budget"));
    }

    #[test]
    fn argmin_errors_keep_their_meaning() {
        let err: argmin::core::Error = argmin::core::ArgminError::InvalidParameter {
            text: "rho".to_string(),
        }
        .into();
        assert_eq!(CalibError::from(err), CalibError::IllegalInput("rho".to_string()));

        let err = argmin::core::Error::new(CalibError::DataNotFound("lines".to_string()));
        assert_eq!(CalibError::from(err), CalibError::DataNotFound("lines".to_string()));
    }
}
