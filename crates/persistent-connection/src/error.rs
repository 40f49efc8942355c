//! Connection failure taxonomy.

use std::error::Error as StdError;
use thiserror::Error;

/// Error type returned by resolver and connector collaborators.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Why a single connection attempt failed.
///
/// These never reach callers of the connection accessors; they are reported
/// through [`ConnectionEvent::FailedToConnect`](crate::ConnectionEvent) and
/// retried after a backoff.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The address resolver failed.
    #[error("failed to resolve address: {source}")]
    AddressResolution {
        /// Error returned by the resolver.
        #[source]
        source: BoxError,
    },

    /// The connector failed for a resolved address.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// Debug rendering of the address that was tried.
        address: String,
        /// Error returned by the connector.
        #[source]
        source: BoxError,
    },
}

impl ConnectError {
    /// The collaborator error this attempt failed with.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        match self {
            ConnectError::AddressResolution { source } | ConnectError::Connect { source, .. } => {
                source.as_ref()
            }
        }
    }

    /// Message of the innermost error in the cause chain.
    ///
    /// Two failures with the same underlying reason normalize to the same
    /// string regardless of which stage or wrapper reported them, which is
    /// what repeated-failure suppression compares on.
    pub fn normalized_cause(&self) -> String {
        let mut innermost: &(dyn StdError + 'static) = self.cause();
        while let Some(next) = innermost.source() {
            innermost = next;
        }
        innermost.to_string()
    }

    /// True when the failure happened while resolving the address.
    pub fn is_address_resolution(&self) -> bool {
        matches!(self, ConnectError::AddressResolution { .. })
    }
}
