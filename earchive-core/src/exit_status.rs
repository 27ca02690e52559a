//! Process exit codes.
//!
//! The codes form a flat integer space shared by every command. They carry no hierarchy; the
//! human-readable log line printed alongside is the only detail a caller gets.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    Success,
    /// Bad arguments or configuration.
    UsageError,
    ServiceNotRunning,
    MissingArgument,
    /// Missing input file, wrong extension, empty or misshaped manifest.
    InvalidInput,
    AuthenticationFailed,
    ListingFailed,
    ManifestReadFailed,
    SubmitFailed,
    /// At least one manifest row failed.
    PartialFailure,
    SaveFailed,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::UsageError => 1,
            ExitStatus::ServiceNotRunning => 2,
            ExitStatus::MissingArgument => 3,
            ExitStatus::InvalidInput => 4,
            ExitStatus::AuthenticationFailed => 6,
            ExitStatus::ListingFailed => 7,
            ExitStatus::ManifestReadFailed => 22,
            ExitStatus::SubmitFailed => 100,
            ExitStatus::PartialFailure => 111,
            ExitStatus::SaveFailed => 222,
        }
    }

    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        // All codes fit in a byte.
        std::process::ExitCode::from(status.code() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_documented_values() {
        assert_eq!(ExitStatus::InvalidInput.code(), 4);
        assert_eq!(ExitStatus::ManifestReadFailed.code(), 22);
        assert_eq!(ExitStatus::PartialFailure.code(), 111);
        assert_eq!(ExitStatus::SaveFailed.code(), 222);
        assert!(ExitStatus::Success.is_success());
        assert!(!ExitStatus::PartialFailure.is_success());
    }
}
