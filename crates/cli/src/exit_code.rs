// Consistent exit codes for the m204 CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/validation error
//   10 = backend not reachable
//   11 = authentication error (401/403)
//   12 = conflict (409/412)
//   13 = network timeout
//   14 = not found

use std::process;

use m204_common::dashboard::ProjectFormError;
use m204_common::inventory::EditError;
use m204_common::requirements::DiagramError;
use m204_common::source_files::ValidationError;

use crate::client::ApiError;
use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    Unreachable = 10,
    Auth = 11,
    Conflict = 12,
    Timeout = 13,
    NotFound = 14,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(api_err) = cause.downcast_ref::<ApiError>() {
                return Self::from_status(api_err.status);
            }
            if let Some(http_err) = cause.downcast_ref::<reqwest::Error>() {
                if http_err.is_timeout() {
                    return Self::Timeout;
                }
                if http_err.is_connect() {
                    return Self::Unreachable;
                }
                if let Some(status) = http_err.status() {
                    return Self::from_status(status.as_u16());
                }
            }
            if cause.downcast_ref::<ValidationError>().is_some()
                || cause.downcast_ref::<ProjectFormError>().is_some()
                || cause.downcast_ref::<EditError>().is_some()
                || cause.downcast_ref::<DiagramError>().is_some()
            {
                return Self::Usage;
            }
            if let Some(ConfigError::InvalidUrl(_)) = cause.downcast_ref::<ConfigError>() {
                return Self::Usage;
            }
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                return match io_err.kind() {
                    std::io::ErrorKind::ConnectionRefused => Self::Unreachable,
                    std::io::ErrorKind::TimedOut => Self::Timeout,
                    _ => Self::Error,
                };
            }
        }

        Self::Error
    }

    /// Map an HTTP status to an exit code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            404 => Self::NotFound,
            409 | 412 => Self::Conflict,
            400 | 422 => Self::Usage,
            408 | 504 => Self::Timeout,
            _ => Self::Error,
        }
    }

    /// Exit the process with this code.
    pub fn exit(self) -> ! {
        process::exit(self.code())
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
