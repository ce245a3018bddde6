use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    FailingFindings,
    InvalidArgs,
    ReportWriteFailed,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::FailingFindings => 1,
            ExitCode::InvalidArgs => 2,
            ExitCode::ReportWriteFailed => 10,
        }
    }

    pub const fn from_failures(has_failures: bool) -> Self {
        if has_failures {
            ExitCode::FailingFindings
        } else {
            ExitCode::Success
        }
    }
}

#[derive(Debug)]
pub struct ExitError {
    pub code: ExitCode,
    pub err: anyhow::Error,
}

impl ExitError {
    pub fn new(code: ExitCode, err: anyhow::Error) -> Self {
        Self { code, err }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.err.as_ref())
    }
}

pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(exit) = err.downcast_ref::<ExitError>() {
        return exit.code.as_i32();
    }
    ExitCode::ReportWriteFailed.as_i32()
}

pub fn invalid_args(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, anyhow::anyhow!(message.into())).into()
}

pub fn invalid_args_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, err).into()
}

pub fn report_write_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::ReportWriteFailed, err).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_codes_survive_downcast() {
        assert_eq!(exit_code(&invalid_args("bad flag")), 2);
        assert_eq!(
            exit_code(&report_write_err(anyhow::anyhow!("disk full"))),
            10
        );
        assert_eq!(exit_code(&anyhow::anyhow!("plain")), 10);
    }

    #[test]
    fn failures_map_to_one() {
        assert_eq!(ExitCode::from_failures(true).as_i32(), 1);
        assert_eq!(ExitCode::from_failures(false).as_i32(), 0);
    }
}
