//! Collaborator traits: the connection handle, address resolution, and
//! connecting.
//!
//! Closures implement [`Resolve`] and [`Connect`] directly, so most callers
//! never name these traits:
//!
//! ```
//! use persistent_connection::{BoxError, Connect, Resolve};
//!
//! fn resolver() -> impl Resolve<String> {
//!     || async { Ok::<_, BoxError>("db.internal:5432".to_string()) }
//! }
//!
//! fn connector() -> impl Connect<String, u64> {
//!     |address: String| async move {
//!         if address.is_empty() {
//!             Err::<u64, BoxError>("empty address".into())
//!         } else {
//!             Ok(7)
//!         }
//!     }
//! }
//! # let _ = (resolver(), connector());
//! ```

use crate::error::BoxError;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use tower::{Service, ServiceExt};

/// Values usable as a server address.
///
/// Addresses are compared by value to decide whether a freshly resolved one
/// is worth reporting.
pub trait Address: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<T> Address for T where T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

/// A live connection handle produced by a [`Connect`] implementation.
///
/// Handles are cloned out to every reader, so cloning should be cheap
/// (typically an `Arc` inside).
pub trait Connection: Clone + Send + Sync + 'static {
    /// Starts closing and completes once the connection is fully closed.
    /// Calling it again after the first call must be harmless.
    fn close(&self) -> BoxFuture<'_, ()>;

    /// Completes once the connection has finished closing, for any reason.
    fn closed(&self) -> BoxFuture<'_, ()>;

    /// Whether the connection is closed or closing.
    fn is_closed(&self) -> bool;
}

/// Produces the address to connect to.
pub trait Resolve<A>: Send + Sync + 'static {
    /// Resolves the server's current address.
    fn resolve(&self) -> BoxFuture<'_, Result<A, BoxError>>;
}

impl<A, F, Fut> Resolve<A> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<A, BoxError>> + Send + 'static,
{
    fn resolve(&self) -> BoxFuture<'_, Result<A, BoxError>> {
        Box::pin(self())
    }
}

/// Opens a connection to an address.
pub trait Connect<A, C>: Send + Sync + 'static {
    /// Connects to `address`.
    fn connect(&self, address: A) -> BoxFuture<'_, Result<C, BoxError>>;
}

impl<A, C, F, Fut> Connect<A, C> for F
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C, BoxError>> + Send + 'static,
{
    fn connect(&self, address: A) -> BoxFuture<'_, Result<C, BoxError>> {
        Box::pin(self(address))
    }
}

/// Resolver that always returns the same address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAddress<A>(A);

impl<A> StaticAddress<A> {
    /// Always resolve to `address`.
    pub fn new(address: A) -> Self {
        Self(address)
    }
}

impl<A> Resolve<A> for StaticAddress<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn resolve(&self) -> BoxFuture<'_, Result<A, BoxError>> {
        let address = self.0.clone();
        Box::pin(async move { Ok(address) })
    }
}

/// Uses a Tower service from address to connection as the connector.
///
/// This is the shape of `tower::MakeConnection`-style services; each attempt
/// drives a clone of the service to readiness and calls it once.
#[derive(Debug, Clone)]
pub struct ServiceConnector<S> {
    service: S,
}

impl<S> ServiceConnector<S> {
    /// Wraps `service`.
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// The wrapped service.
    pub fn get_ref(&self) -> &S {
        &self.service
    }
}

impl<A, S> Connect<A, S::Response> for ServiceConnector<S>
where
    A: Send + 'static,
    S: Service<A> + Clone + Send + Sync + 'static,
    S::Response: Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    fn connect(&self, address: A) -> BoxFuture<'_, Result<S::Response, BoxError>> {
        let service = self.service.clone();
        Box::pin(async move { service.oneshot(address).await.map_err(Into::into) })
    }
}
