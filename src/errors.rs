
use std::path::PathBuf;

/// Every way a conversion run can fail. Each variant carries enough context to locate the
/// problem (individual, column, token) without re-running.
#[derive(thiserror::Error, Debug)]
pub enum ConvPhaseError {
    #[error("malformed alignment: {message}")]
    Format { message: String },
    #[error("alignment contains no sequences")]
    EmptyInput,
    #[error("encoding failed for {individual:?} at site {site} (column {column}): {message}")]
    Encoding { individual: String, site: usize, column: usize, message: String },
    #[error("could not start phasing engine {program:?}: {source}")]
    EngineUnavailable { program: PathBuf, source: std::io::Error },
    #[error("phasing engine exited with {status}\n--- stderr ---\n{stderr}\n--- stdout ---\n{stdout}")]
    EngineExecution { status: String, stdout: String, stderr: String },
    #[error("phasing engine exceeded the time limit of {seconds:.1} seconds")]
    EngineTimeout { seconds: f64 },
    #[error("phasing engine run was cancelled")]
    EngineCancelled,
    #[error("malformed engine output at line {line}: {message}")]
    ResultParse { line: usize, message: String },
    #[error("engine output does not match the submitted matrix: {message}")]
    ResultMismatch { message: String },
    #[error("code {code:?} is not valid for {individual:?} at site {site}")]
    Decode { individual: String, site: usize, code: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error)
}

impl ConvPhaseError {
    /// Shorthand for building a `Format` error
    pub fn format<S: Into<String>>(message: S) -> ConvPhaseError {
        ConvPhaseError::Format { message: message.into() }
    }

    /// Maps the error onto a process exit code
    pub fn exit_code(&self) -> exitcode::ExitCode {
        match self {
            ConvPhaseError::Format { .. } |
            ConvPhaseError::EmptyInput => exitcode::DATAERR,
            ConvPhaseError::EngineUnavailable { .. } => exitcode::UNAVAILABLE,
            ConvPhaseError::EngineTimeout { .. } |
            ConvPhaseError::EngineCancelled => exitcode::TEMPFAIL,
            ConvPhaseError::Io(_) |
            ConvPhaseError::Csv(_) => exitcode::IOERR,
            ConvPhaseError::Encoding { .. } |
            ConvPhaseError::EngineExecution { .. } |
            ConvPhaseError::ResultParse { .. } |
            ConvPhaseError::ResultMismatch { .. } |
            ConvPhaseError::Decode { .. } => exitcode::SOFTWARE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ConvPhaseError::EmptyInput.exit_code(), exitcode::DATAERR);
        assert_eq!(ConvPhaseError::format("bad").exit_code(), exitcode::DATAERR);
        assert_eq!(ConvPhaseError::EngineTimeout { seconds: 1.0 }.exit_code(), exitcode::TEMPFAIL);
        assert_eq!(ConvPhaseError::ResultMismatch { message: "".to_string() }.exit_code(), exitcode::SOFTWARE);
    }

    #[test]
    fn test_engine_message_has_diagnostics() {
        let err = ConvPhaseError::EngineExecution {
            status: "exit status: 3".to_string(),
            stdout: "reading input".to_string(),
            stderr: "bad locus type".to_string()
        };
        let message = err.to_string();
        assert!(message.contains("exit status: 3"));
        assert!(message.contains("bad locus type"));
        assert!(message.contains("reading input"));
    }
}
