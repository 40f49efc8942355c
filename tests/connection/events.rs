use super::support::{Harness, RETRY, Seen, Step, assert_gap};
use persistent_connection::RetryDelay;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn repeated_timeout_is_reported_once() {
    let h = Harness::start(
        vec![Ok("A")],
        vec![Step::Fail("timeout"), Step::Fail("timeout"), Step::Succeed],
    );

    h.conn.connected().await;

    assert_eq!(
        h.events(),
        vec![
            Seen::Attempting,
            Seen::Address("A".into()),
            Seen::Failed("timeout".into()),
            Seen::Connected,
        ]
    );
    let calls = h.connect_calls();
    assert_eq!(calls.len(), 3);
    assert_gap(calls[0], calls[1], RETRY);
    assert_gap(calls[1], calls[2], RETRY);
}

#[tokio::test(start_paused = true)]
async fn distinct_causes_are_each_reported_and_backed_off() {
    let start = Instant::now();
    let h = Harness::start(
        vec![Err("dns-error"), Ok("A")],
        vec![Step::Fail("refused"), Step::Succeed],
    );

    h.conn.connected().await;

    assert_eq!(
        h.events(),
        vec![
            Seen::Attempting,
            Seen::Failed("dns-error".into()),
            Seen::Address("A".into()),
            Seen::Failed("refused".into()),
            Seen::Connected,
        ]
    );
    let calls = h.connect_calls();
    assert_eq!(calls.len(), 2);
    assert_gap(start, calls[0], RETRY);
    assert_gap(calls[0], calls[1], RETRY);
}

#[tokio::test(start_paused = true)]
async fn alternating_causes_are_all_reported() {
    let h = Harness::start(
        vec![Ok("A")],
        vec![
            Step::Fail("refused"),
            Step::Fail("reset"),
            Step::Fail("refused"),
            Step::Succeed,
        ],
    );

    h.conn.connected().await;

    let failures: Vec<_> = h
        .events()
        .into_iter()
        .filter(|e| matches!(e, Seen::Failed(_)))
        .collect();
    assert_eq!(
        failures,
        vec![
            Seen::Failed("refused".into()),
            Seen::Failed("reset".into()),
            Seen::Failed("refused".into()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn same_cause_from_resolver_and_connector_is_reported_once() {
    let h = Harness::start(
        vec![Err("timeout"), Ok("A")],
        vec![Step::Fail("timeout"), Step::Succeed],
    );

    h.conn.connected().await;

    assert_eq!(
        h.events(),
        vec![
            Seen::Attempting,
            Seen::Failed("timeout".into()),
            Seen::Address("A".into()),
            Seen::Connected,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn same_address_is_reported_once_per_cycle() {
    let h = Harness::start(
        vec![Ok("A")],
        vec![Step::Fail("refused"), Step::Fail("reset"), Step::Succeed],
    );

    h.conn.connected().await;

    let addresses = h
        .events()
        .into_iter()
        .filter(|e| matches!(e, Seen::Address(_)))
        .count();
    assert_eq!(addresses, 1);
}

#[tokio::test(start_paused = true)]
async fn changed_address_is_reported() {
    let h = Harness::start(
        vec![Ok("A"), Ok("B")],
        vec![Step::Fail("refused"), Step::Succeed],
    );

    h.conn.connected().await;

    assert_eq!(
        h.events(),
        vec![
            Seen::Attempting,
            Seen::Address("A".into()),
            Seen::Failed("refused".into()),
            Seen::Address("B".into()),
            Seen::Connected,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn each_cycle_reports_afresh() {
    let h = Harness::start(
        vec![Ok("A")],
        vec![
            Step::Fail("refused"),
            Step::Succeed,
            Step::Fail("refused"),
            Step::Succeed,
        ],
    );

    let first = h.conn.connected().await;
    first.drop_remotely();
    let second = h.conn.connected().await;
    assert_eq!(second.id, 1);

    assert_eq!(
        h.events(),
        vec![
            Seen::Attempting,
            Seen::Address("A".into()),
            Seen::Failed("refused".into()),
            Seen::Connected,
            Seen::Disconnected,
            Seen::Attempting,
            Seen::Address("A".into()),
            Seen::Failed("refused".into()),
            Seen::Connected,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn panicking_callback_does_not_stop_the_engine() {
    let h = Harness::start_with(
        vec![Ok("A")],
        vec![Step::Fail("refused"), Step::Succeed],
        |builder| {
            builder
                .retry_delay(RetryDelay::fixed(RETRY))
                .on_event(|_| panic!("listener bug"))
        },
    );

    let live = h.conn.connected().await;
    assert_eq!(live.id, 0);
    assert_eq!(
        h.events(),
        vec![
            Seen::Attempting,
            Seen::Address("A".into()),
            Seen::Failed("refused".into()),
            Seen::Connected,
        ]
    );

    h.conn.close().await;
    assert_eq!(live.close_calls(), 1);
}
