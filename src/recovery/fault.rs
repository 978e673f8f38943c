//! Fault classification
//!
//! Infrastructure errors raised outside the delivery result channel are
//! reduced to a [`Fault`]: a kind that recovery strategies match on, plus the
//! original error text.

use serde::Serialize;
use std::io;
use strum_macros::{Display, EnumIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter)]
pub enum FaultKind {
    /// The resource exists but is held by someone else or refused us
    AccessDenied,
    NotFound,
    Io,
    ConnectionLost,
    RateLimited,
    ServerError,
    Timeout,
    Transport,
    Other,
}

impl FaultKind {
    /// Whether repeating the failed operation can reasonably succeed
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            FaultKind::Io
                | FaultKind::ConnectionLost
                | FaultKind::RateLimited
                | FaultKind::ServerError
                | FaultKind::Timeout
                | FaultKind::Transport
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} fault: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status code
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => FaultKind::AccessDenied,
            404 | 410 => FaultKind::NotFound,
            408 => FaultKind::Timeout,
            429 => FaultKind::RateLimited,
            500..=599 => FaultKind::ServerError,
            _ => FaultKind::Other,
        };
        Self::new(kind, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl From<&io::Error> for Fault {
    fn from(error: &io::Error) -> Self {
        let kind = match error.kind() {
            io::ErrorKind::PermissionDenied | io::ErrorKind::AddrInUse => FaultKind::AccessDenied,
            io::ErrorKind::NotFound => FaultKind::NotFound,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe => FaultKind::ConnectionLost,
            io::ErrorKind::TimedOut => FaultKind::Timeout,
            _ => FaultKind::Io,
        };
        Self::new(kind, error.to_string())
    }
}

impl From<io::Error> for Fault {
    fn from(error: io::Error) -> Self {
        Self::from(&error)
    }
}

impl From<&reqwest::Error> for Fault {
    fn from(error: &reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::from_status(status.as_u16(), error.to_string());
        }
        let kind = if error.is_timeout() {
            FaultKind::Timeout
        } else if error.is_connect() {
            FaultKind::ConnectionLost
        } else if error.is_builder() {
            FaultKind::Other
        } else {
            FaultKind::Transport
        };
        Self::new(kind, error.to_string())
    }
}

impl From<reqwest::Error> for Fault {
    fn from(error: reqwest::Error) -> Self {
        Self::from(&error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_io_classification() {
        let cases = [
            (io::ErrorKind::PermissionDenied, FaultKind::AccessDenied),
            (io::ErrorKind::NotFound, FaultKind::NotFound),
            (io::ErrorKind::ConnectionReset, FaultKind::ConnectionLost),
            (io::ErrorKind::BrokenPipe, FaultKind::ConnectionLost),
            (io::ErrorKind::TimedOut, FaultKind::Timeout),
            (io::ErrorKind::UnexpectedEof, FaultKind::Io),
        ];
        for (io_kind, expected) in cases {
            let fault = Fault::from(io::Error::new(io_kind, "boom"));
            assert_eq!(fault.kind, expected, "{:?}", io_kind);
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(Fault::from_status(503, "").kind, FaultKind::ServerError);
        assert_eq!(Fault::from_status(429, "").kind, FaultKind::RateLimited);
        assert_eq!(Fault::from_status(408, "").kind, FaultKind::Timeout);
        assert_eq!(Fault::from_status(403, "").kind, FaultKind::AccessDenied);
        assert_eq!(Fault::from_status(404, "").kind, FaultKind::NotFound);
        assert_eq!(Fault::from_status(400, "").kind, FaultKind::Other);
    }

    #[test]
    fn test_transient_kinds() {
        let transient: Vec<FaultKind> = FaultKind::iter().filter(|k| k.is_transient()).collect();
        assert!(transient.contains(&FaultKind::Timeout));
        assert!(transient.contains(&FaultKind::RateLimited));
        assert!(!transient.contains(&FaultKind::AccessDenied));
        assert!(!transient.contains(&FaultKind::NotFound));
        assert!(!transient.contains(&FaultKind::Other));
    }

    #[test]
    fn test_display() {
        let fault = Fault::new(FaultKind::ConnectionLost, "port closed");
        assert_eq!(fault.to_string(), "ConnectionLost fault: port closed");
    }
}
