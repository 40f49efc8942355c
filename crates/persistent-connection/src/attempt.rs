//! One cycle's resolve-and-connect loop.

use crate::connector::{Address, Connection};
use crate::engine::Shared;
use crate::error::ConnectError;
use crate::slot::Outcome;

/// What has already been reported during the current cycle.
struct Reported<A> {
    address: Option<A>,
    cause: Option<String>,
}

/// Resolves and connects until a connection is made or shutdown is requested.
///
/// Failures never escape: each one is reported as `FailedToConnect` unless it
/// repeats the previously reported cause, then retried after a fresh
/// [`RetryDelay`](crate::RetryDelay). A connection that completes after
/// shutdown was requested is closed instead of returned.
pub(crate) async fn connect_until_ready<A, C>(shared: &Shared<A, C>) -> Outcome<C>
where
    A: Address,
    C: Connection,
{
    let mut reported = Reported {
        address: None,
        cause: None,
    };

    loop {
        if shared.shutdown_requested.is_fired() {
            return Outcome::ShuttingDown;
        }

        #[cfg(feature = "metrics")]
        metrics::counter!("persistent_connection_attempts_total", "server" => shared.events.server_name().to_string())
            .increment(1);

        match try_connect(shared, &mut reported).await {
            Ok(connection) if shared.shutdown_requested.is_fired() => {
                connection.close().await;
                return Outcome::ShuttingDown;
            }
            Ok(connection) => return Outcome::Ready(connection),
            Err(error) => {
                #[cfg(feature = "metrics")]
                metrics::counter!("persistent_connection_failures_total", "server" => shared.events.server_name().to_string())
                    .increment(1);

                let cause = error.normalized_cause();
                if reported.cause.as_deref() != Some(cause.as_str()) {
                    reported.cause = Some(cause.clone());
                    shared.events.failed_to_connect(error, cause);
                }

                let delay = shared.retry_delay.next_delay();
                tokio::select! {
                    biased;
                    _ = shared.shutdown_requested.fired() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

async fn try_connect<A, C>(
    shared: &Shared<A, C>,
    reported: &mut Reported<A>,
) -> Result<C, ConnectError>
where
    A: Address,
    C: Connection,
{
    let address = shared
        .resolver
        .resolve()
        .await
        .map_err(|source| ConnectError::AddressResolution { source })?;

    if reported.address.as_ref() != Some(&address) {
        reported.address = Some(address.clone());
        shared.events.obtained_address(address.clone());
    }

    let target = address.clone();
    shared
        .connector
        .connect(address)
        .await
        .map_err(|source| ConnectError::Connect {
            address: format!("{target:?}"),
            source,
        })
}
