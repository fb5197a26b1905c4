use std::{io, net::SocketAddr};

use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{key} has an invalid value: {value:?}")]
    InvalidConfig { key: &'static str, value: String },
    #[error("Could not listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("Server stopped unexpectedly: {0}")]
    Serve(#[source] io::Error),
}

impl ServerError {
    pub fn hint(&self) -> String {
        match self {
            Self::InvalidConfig { key, .. } => format!(
                "Check the {} environment variable, or unset it to use the default.",
                key
            ),
            Self::Bind { addr, .. } => format!(
                "Make sure nothing else is listening on port {}, or set TANDEM_SERVER_PORT to another port.",
                addr.port()
            ),
            Self::Serve(_) => "This is an I/O error from the operating system. Restarting tandem should fix it.".to_string(),
        }
    }
}
