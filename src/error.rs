//! Error taxonomy for the report pipeline

use thiserror::Error;

use crate::report::DeviceCommand;

#[derive(Error, Debug)]
pub enum Error {
    /// The device did not acknowledge a command
    #[error("device rejected {command:?}: {reason}")]
    TransportFailure {
        command: DeviceCommand,
        reason: String,
    },

    /// The MIDI sink is closed or rejected a message
    #[error("MIDI sink unavailable: {0}")]
    SinkUnavailable(String),

    /// Unknown report kind or truncated payload
    #[error("malformed report: {0}")]
    MalformedReport(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
