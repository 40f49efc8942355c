use super::support::{Harness, RETRY, Step, assert_gap, settle};
use persistent_connection::{Connection, ConnectionState};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn connected_waits_for_the_first_connection() {
    let start = Instant::now();
    let h = Harness::start(vec![Ok("A")], vec![Step::Fail("refused"), Step::Succeed]);

    settle().await;
    assert!(h.conn.current_connection().is_none());
    assert_eq!(h.conn.state(), ConnectionState::Connecting);

    let live = h.conn.connected().await;
    assert_eq!(live.id, 0);
    assert_gap(start, Instant::now(), RETRY);
    assert_eq!(h.conn.current_connection().map(|c| c.id), Some(0));
    assert_eq!(h.conn.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn concurrent_waiters_share_one_connection() {
    let h = Harness::start(vec![Ok("A")], vec![Step::Fail("refused"), Step::Succeed]);

    let (a, b, c) = tokio::join!(h.conn.connected(), h.conn.connected(), h.conn.connected());

    assert_eq!((a.id, b.id, c.id), (0, 0, 0));
    assert_eq!(h.made().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn closed_connection_is_replaced() {
    let h = Harness::start(vec![Ok("A")], vec![Step::Succeed]);

    let first = h.conn.connected().await;
    first.drop_remotely();

    let second = h.conn.connected().await;
    assert_eq!(second.id, 1);
    assert_eq!(first.close_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn handle_reporting_closed_is_never_returned() {
    let h = Harness::start(vec![Ok("A")], vec![Step::Succeed]);
    let first = h.conn.connected().await;

    // The handle knows it is dead before the engine has been told.
    first.mark_dead();
    let waiter = tokio::spawn({
        let conn = h.conn.clone();
        async move { conn.connected().await }
    });
    settle().await;
    assert!(!waiter.is_finished());

    // Peeking does not check liveness.
    assert_eq!(h.conn.current_connection().map(|c| c.id), Some(0));

    first.drop_remotely();
    let next = waiter.await.unwrap();
    assert_eq!(next.id, 1);
    assert!(!next.is_closed());
}

#[tokio::test(start_paused = true)]
async fn nothing_is_published_between_connections() {
    let h = Harness::start(vec![Ok("A")], vec![Step::Succeed]);

    let first = h.conn.connected().await;
    first.drop_remotely();
    settle().await;

    assert!(h.conn.current_connection().is_none());
    assert_eq!(h.conn.state(), ConnectionState::Connecting);
}
