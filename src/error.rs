//! Crate-wide error type and its classification.
//!
//! Every failure maps onto one [`ErrorKind`], which decides how the run
//! loop reacts:
//!
//! | Kind | Reaction |
//! |------|----------|
//! | `Transient` | Logged; retried on the next pass |
//! | `Fatal` | All actuators off, then device restart |
//! | `Malformed` | `ERROR` feedback, no state change |
//! | `Hardware` | Logged at `warn`; state updated optimistically |

use core::fmt;

use crate::commands::CommandError;
use crate::traits::ChannelId;

/// How a failure is handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Recoverable by retrying later.
    Transient,
    /// Recovery requires a restart.
    Fatal,
    /// Bad input from the network.
    Malformed,
    /// An output write failed.
    Hardware,
}

/// Network failures surfaced by the supervisor and the run loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetError {
    /// WiFi association failed `attempts` times in a row.
    WifiExhausted {
        /// Consecutive failures.
        attempts: u8,
    },
    /// Broker connection failed `attempts` times in a row.
    BrokerExhausted {
        /// Consecutive failures.
        attempts: u8,
    },
    /// A publish was refused by the transport.
    PublishFailed,
    /// Servicing the broker connection failed.
    PollFailed,
}

impl NetError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetError::WifiExhausted { .. } | NetError::BrokerExhausted { .. } => ErrorKind::Fatal,
            NetError::PublishFailed | NetError::PollFailed => ErrorKind::Transient,
        }
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::WifiExhausted { attempts } => {
                write!(f, "WiFi unreachable after {} attempts", attempts)
            }
            NetError::BrokerExhausted { attempts } => {
                write!(f, "MQTT broker unreachable after {} attempts", attempts)
            }
            NetError::PublishFailed => write!(f, "publish failed"),
            NetError::PollFailed => write!(f, "broker poll failed"),
        }
    }
}

/// Top-level error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Connectivity failure.
    Net(NetError),
    /// Rejected command.
    Command(CommandError),
    /// Output write failure on a channel.
    Hardware {
        /// Channel that failed.
        channel: ChannelId,
    },
}

impl Error {
    /// Classify this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use room_fx::error::{Error, ErrorKind, NetError};
    /// use room_fx::CommandError;
    ///
    /// let fatal: Error = NetError::BrokerExhausted { attempts: 5 }.into();
    /// assert_eq!(fatal.kind(), ErrorKind::Fatal);
    ///
    /// let bad: Error = CommandError::InvalidSpeed.into();
    /// assert_eq!(bad.kind(), ErrorKind::Malformed);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Net(e) => e.kind(),
            Error::Command(_) => ErrorKind::Malformed,
            Error::Hardware { .. } => ErrorKind::Hardware,
        }
    }

    /// Shorthand for `kind() == ErrorKind::Fatal`.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

impl From<NetError> for Error {
    fn from(e: NetError) -> Self {
        Error::Net(e)
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Error::Command(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Net(e) => write!(f, "network: {}", e),
            Error::Command(e) => write!(f, "command: {}", e),
            Error::Hardware { channel } => write!(f, "output write failed on channel {}", channel),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
