use std::{fmt, io};

use num_traits::FromPrimitive;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error as ThisError;

use crate::ResponseStatus;

/// The category of a failed call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum ErrorKind {
    /// no provider is published for the service path
    RegistryLookup,
    /// the registry backend itself failed
    Registry,
    /// the method is not advertised by the resolved provider
    MethodNotFound,
    /// connect, read or write failed
    Transport,
    /// the provider answered with an error status or an error value
    Protocol,
    /// the request body exceeds the maximum payload
    PayloadTooLarge,
    /// the object codec could not encode or decode a value
    Codec,
    InvalidArgument,
}

#[derive(Debug, Clone, PartialEq, ThisError)]
#[error("{kind}: {message}{}", status_suffix(.status))]
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: Option<u8>,
}

fn status_suffix(status: &Option<u8>) -> String {
    match status.map(|s| (s, ResponseStatus::from_u8(s))) {
        Some((_, Some(st))) => format!(" (status {})", st),
        Some((s, None)) => format!(" (status {})", s),
        None => String::new(),
    }
}

impl Error {
    pub fn new<M>(kind: ErrorKind, message: M) -> Error
    where
        M: fmt::Display,
    {
        Error {
            kind,
            message: message.to_string(),
            status: None,
        }
    }

    /// Attaches the response status byte the provider answered with.
    pub fn with_status(mut self, status: u8) -> Error {
        self.status = Some(status);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The response status of a provider-reported failure.
    pub fn status(&self) -> Option<u8> {
        self.status
    }

    /// Transport failures are the only ones a call session recovers from.
    pub fn is_transport(&self) -> bool {
        self.kind == ErrorKind::Transport
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::new(ErrorKind::Transport, err)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::new(ErrorKind::Protocol, s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Error {
        Error::new(ErrorKind::Protocol, s)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
