use std::process::ExitCode;

use crate::args::GlobalArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Success,
    Error,
}

/// Outcome of a command: an exit status plus an optional closing line for
/// stderr.
#[derive(Debug, PartialEq, Eq)]
pub struct Exit {
    status: Status,
    message: Option<String>,
}

impl Exit {
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            message: None,
        }
    }

    #[must_use]
    pub fn error() -> Self {
        Self {
            status: Status::Error,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Print the message and convert to a process exit code. `--quiet`
    /// silences success messages only.
    pub fn report(self, global: &GlobalArgs) -> ExitCode {
        if let Some(message) = &self.message {
            if self.status == Status::Error || !global.quiet {
                eprintln!("{message}");
            }
        }
        match self.status {
            Status::Success => ExitCode::SUCCESS,
            Status::Error => ExitCode::FAILURE,
        }
    }
}
