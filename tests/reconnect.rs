//! Reconnect backoff, exhaustion and intentional disconnects.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use parking_lot::Mutex;
use serde_json::Value;
use signalbus::{Client, ConnectionState, Error, ReconnectPolicy};
use tokio::time::{sleep, timeout};

use common::{EchoPeer, WAIT, init_tracing, unreachable_url};

type Reports = Arc<Mutex<Vec<(Instant, Option<String>)>>>;

fn recording_client(url: String, policy: ReconnectPolicy) -> Result<(Client, Reports)> {
    let reports: Reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let client = Client::builder()
        .url(url)
        .reconnect_policy(policy)
        .on_error(move |message: Option<&str>| {
            sink.lock().push((Instant::now(), message.map(str::to_string)));
        })
        .build()?;
    Ok((client, reports))
}

async fn wait_for_reports(reports: &Reports, count: usize) {
    timeout(WAIT, async {
        while reports.lock().len() < count {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("error callback timed out");
}

#[tokio::test]
async fn test_gives_up_after_three_retries() -> Result<()> {
    init_tracing();
    let policy = ReconnectPolicy::new()
        .with_base_delay(Duration::from_millis(10))
        .with_jitter(0.0);
    let (client, reports) = recording_client(unreachable_url().await, policy)?;

    // Four failed opens, then the terminal message.
    wait_for_reports(&reports, 5).await;
    let mut state = client.watch_state();
    timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Disconnected)).await??;

    sleep(Duration::from_millis(300)).await;

    let reports = reports.lock().clone();
    assert_eq!(reports.len(), 5, "unexpected reports: {reports:?}");

    let open_failed = Error::OpenFailed.to_string();
    for (_, message) in &reports[..4] {
        assert_eq!(message.as_deref(), Some(open_failed.as_str()));
    }
    assert_eq!(
        reports[4].1.as_deref(),
        Some("Connection closed. Please reload to reconnect.")
    );

    // Gaps between attempts are at least the nominal delays 20, 40, 80 ms.
    let gaps: Vec<Duration> = reports[..4]
        .windows(2)
        .map(|pair| pair[1].0 - pair[0].0)
        .collect();
    for (gap, nominal) in gaps.iter().zip([20u64, 40, 80]) {
        assert!(
            *gap >= Duration::from_millis(nominal),
            "gap {gap:?} shorter than {nominal} ms"
        );
    }

    assert_eq!(client.state(), ConnectionState::Disconnected);
    client.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_connect_after_exhaustion_starts_over() -> Result<()> {
    init_tracing();
    let policy = ReconnectPolicy::new()
        .with_base_delay(Duration::from_millis(5))
        .with_max_attempts(0)
        .with_jitter(0.0);
    let (client, reports) = recording_client(unreachable_url().await, policy)?;

    wait_for_reports(&reports, 2).await;
    client.connect()?;
    wait_for_reports(&reports, 3).await;

    assert_eq!(
        reports.lock()[2].1.as_deref(),
        Some(Error::OpenFailed.to_string().as_str())
    );

    client.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_disconnect_then_connect_keeps_one_socket() -> Result<()> {
    let peer = EchoPeer::start().await;
    let policy = ReconnectPolicy::new()
        .with_base_delay(Duration::from_millis(10))
        .with_jitter(0.0);
    let (client, reports) = recording_client(peer.url(), policy)?;

    client.wait_for_state(ConnectionState::Open).await?;

    client.disconnect()?;
    client.wait_for_state(ConnectionState::Disconnected).await?;

    client.connect()?;
    client.wait_for_state(ConnectionState::Open).await?;

    // Long enough for any stray reconnect to have fired.
    sleep(Duration::from_millis(300)).await;

    assert_eq!(client.state(), ConnectionState::Open);
    assert_eq!(peer.live(), 1);
    assert_eq!(peer.accepted(), 2);
    assert!(
        reports.lock().iter().all(|(_, message)| message.is_none()),
        "lifecycle error reported: {:?}",
        reports.lock()
    );

    client.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_back_to_back_disconnect_connect_keeps_one_socket() -> Result<()> {
    let peer = EchoPeer::start().await;
    let policy = ReconnectPolicy::new()
        .with_base_delay(Duration::from_millis(10))
        .with_jitter(0.0);
    let (client, reports) = recording_client(peer.url(), policy)?;

    client.wait_for_state(ConnectionState::Open).await?;
    let mut state = client.watch_state();
    state.borrow_and_update();

    client.disconnect()?;
    client.connect()?;

    timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Open)).await??;
    sleep(Duration::from_millis(300)).await;

    assert_eq!(client.state(), ConnectionState::Open);
    assert_eq!(peer.live(), 1);
    assert_eq!(peer.accepted(), 2);
    assert!(
        reports.lock().iter().all(|(_, message)| message.is_none()),
        "lifecycle error reported: {:?}",
        reports.lock()
    );

    client.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_dropping_client_closes_socket() -> Result<()> {
    let peer = EchoPeer::start().await;
    let client = Client::builder().url(peer.url()).build()?;

    // A listener that talks back through a weak handle.
    let weak = client.downgrade();
    client.on("test_fn", move |load: &Value| {
        if let Some(client) = weak.upgrade() {
            let _ = client.send("test_fn_reply", load);
        }
    });

    client.wait_for_state(ConnectionState::Open).await?;
    assert_eq!(peer.live(), 1);

    drop(client);

    timeout(WAIT, async {
        while peer.live() > 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    assert_eq!(peer.accepted(), 1);
    Ok(())
}

#[tokio::test]
async fn test_disconnect_does_not_reconnect() -> Result<()> {
    let peer = EchoPeer::start().await;
    let policy = ReconnectPolicy::new()
        .with_base_delay(Duration::from_millis(10))
        .with_jitter(0.0);
    let (client, _reports) = recording_client(peer.url(), policy)?;

    client.wait_for_state(ConnectionState::Open).await?;
    client.disconnect()?;

    sleep(Duration::from_millis(200)).await;

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(peer.accepted(), 1);
    assert_eq!(peer.live(), 0);

    client.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_repeated_connect_replaces_socket() -> Result<()> {
    let peer = EchoPeer::start().await;
    let client = Client::builder().url(peer.url()).build()?;

    client.wait_for_state(ConnectionState::Open).await?;
    client.connect()?;
    client.connect()?;

    sleep(Duration::from_millis(300)).await;

    assert_eq!(client.state(), ConnectionState::Open);
    assert_eq!(peer.live(), 1);

    client.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_peer_close_triggers_reconnect() -> Result<()> {
    let peer = EchoPeer::start().await;
    let policy = ReconnectPolicy::new()
        .with_base_delay(Duration::from_millis(10))
        .with_jitter(0.0);
    let (client, reports) = recording_client(peer.url(), policy)?;

    client.wait_for_state(ConnectionState::Open).await?;
    let mut state = client.watch_state();
    state.borrow_and_update();

    peer.drop_connections();

    timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Reconnecting)).await??;
    timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Open)).await??;

    assert_eq!(peer.accepted(), 2);
    // Each open clears the banner; nothing else is reported.
    assert!(reports.lock().iter().all(|(_, message)| message.is_none()));

    client.shutdown();
    Ok(())
}
