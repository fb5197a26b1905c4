use thiserror::Error;

use crate::DecodeError;

pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The client sent something that isn't a known, well-formed envelope
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// An outbound message could not be serialized
    #[error("Could not encode {kind}: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// Handling a message panicked
    #[error("Handling {kind} panicked")]
    Panicked { kind: &'static str },
}

impl RelayError {
    /// Whether the connection that caused this error has to be closed.
    ///
    /// Bad input from a client is dropped, anything that goes wrong while
    /// handling valid input takes the offending connection down.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }
}
