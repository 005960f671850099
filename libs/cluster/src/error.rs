//! Cluster Error Types
//!
//! Typed mapping of wire response codes plus the transport and protocol
//! failures surfaced by the layers below.

use codec::{Code, ProtocolError, Route};
use network::TransportError;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ClusterError {
    /// The peer answered but the operation failed.
    #[error("Operation {route} failed")]
    Failed { route: Route },

    /// The addressed session does not exist at the peer.
    #[error("Session not found for {route}")]
    NotFoundSession { route: Route },

    /// The peer hit an internal error serving the operation.
    #[error("Peer internal error on {route}")]
    PeerInternal { route: Route },

    /// The peer rejected the request arguments.
    #[error("Invalid argument for {route}")]
    InvalidArgument { route: Route },

    /// Collaborator (locator/discovery) failures.
    #[error("Collaborator error: {message}")]
    Collaborator {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, ClusterError>;

impl ClusterError {
    /// Maps a reply code onto a typed error; `Ok` maps to success.
    pub fn check(route: Route, code: Code) -> Result<()> {
        match code {
            Code::Ok => Ok(()),
            Code::Failed => Err(Self::Failed { route }),
            Code::NotFoundSession => {
                warn!(?route, "session not found");
                Err(Self::NotFoundSession { route })
            }
            Code::InternalError => Err(Self::PeerInternal { route }),
            Code::InvalidArgument => Err(Self::InvalidArgument { route }),
        }
    }

    /// The reply code an error converts back to at the protocol boundary.
    pub fn as_code(&self) -> Code {
        match self {
            Self::Failed { .. } => Code::Failed,
            Self::NotFoundSession { .. } => Code::NotFoundSession,
            Self::InvalidArgument { .. } | Self::Protocol(_) => Code::InvalidArgument,
            Self::PeerInternal { .. } | Self::Collaborator { .. } | Self::Transport(_) => {
                Code::InternalError
            }
        }
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator {
            message: message.into(),
            source: None,
        }
    }

    pub fn collaborator_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Collaborator {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_typed_errors() {
        assert!(ClusterError::check(Route::Bind, Code::Ok).is_ok());
        assert!(matches!(
            ClusterError::check(Route::Push, Code::NotFoundSession),
            Err(ClusterError::NotFoundSession { route: Route::Push })
        ));
        assert!(matches!(
            ClusterError::check(Route::Stat, Code::InternalError),
            Err(ClusterError::PeerInternal { .. })
        ));
    }

    #[test]
    fn errors_round_trip_to_codes() {
        let err = ClusterError::check(Route::Push, Code::NotFoundSession).unwrap_err();
        assert_eq!(err.as_code(), Code::NotFoundSession);
        assert_eq!(ClusterError::collaborator("x").as_code(), Code::InternalError);
    }
}
