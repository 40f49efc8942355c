use super::support::{EventLog, MockConnection, RETRY, Seen, record_into, seen};
use persistent_connection::{
    ConnectionConfig, PersistentConnection, RetryDelay, ServiceConnector, StaticAddress,
};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test(start_paused = true)]
async fn tower_service_as_connector() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let service = tower::service_fn(move |_address: String| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 2 {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            } else {
                Ok(MockConnection::new(n))
            }
        }
    });

    let log = EventLog::default();
    let builder =
        ConnectionConfig::builder("tower-backed").retry_delay(RetryDelay::fixed(RETRY));
    let conn = PersistentConnection::create(
        record_into(builder, &log).build(),
        StaticAddress::new("10.0.0.7:9000".to_string()),
        ServiceConnector::new(service),
    );

    let live = conn.connected().await;
    assert_eq!(live.id, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        seen(&log),
        vec![
            Seen::Attempting,
            Seen::Address("10.0.0.7:9000".into()),
            Seen::Failed("refused".into()),
            Seen::Connected,
        ]
    );

    conn.close().await;
    assert_eq!(live.close_calls(), 1);
}
