mod common;

use common::{handshake_lines, Ending, FakeE4Server, ScriptedSession, DEVICE};
use e4_lsl_bridge::{
    BridgeError, ChannelKind, LineMode, MemorySink, SampleValues, SessionConfig, Supervisor,
    TcpConnector,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn config(port: u16) -> SessionConfig {
    SessionConfig {
        port,
        instance_name: "it".to_string(),
        read_timeout: Duration::from_millis(500),
        connect_timeout: Duration::from_millis(500),
        settle_delay: Duration::ZERO,
        ..SessionConfig::new(DEVICE)
    }
}

fn connector(config: &SessionConfig) -> TcpConnector {
    TcpConnector::new(
        config.address.clone(),
        config.port,
        config.connect_timeout,
        config.read_timeout,
    )
}

/// Cancel once the sink holds `count` samples
fn cancel_after(sink: &MemorySink, count: usize) -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let sink = sink.clone();
    tokio::spawn(async move {
        while sink.published().len() < count {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        token.cancel();
    });
    cancel
}

// =============================================================================
// STREAMING
// =============================================================================

#[tokio::test]
async fn test_device_loss_reconnects_and_resumes_over_tcp() {
    let server = FakeE4Server::start(vec![
        ScriptedSession::new(
            &["E4_Acc 123.0 1 2 3\nE4_Bvp 123.1 0,75\n"],
            Ending::DeviceLost,
        ),
        ScriptedSession::new(
            &["E4_Gsr 124.0 0,512\nE4_Temperature 124.1 31,5\n"],
            Ending::AwaitDisconnect,
        ),
    ]);

    let config = config(server.port);
    let sink = MemorySink::new();
    let cancel = cancel_after(&sink, 4);

    let mut supervisor = Supervisor::new(config.clone(), connector(&config), sink.clone());
    let stats = supervisor.run(cancel).await.unwrap();

    let received = server.join();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0], handshake_lines());

    let mut second = handshake_lines();
    second.push("device_disconnect".to_string());
    assert_eq!(received[1], second);

    let channels = sink.channels();
    assert_eq!(channels.len(), ChannelKind::COUNT);
    assert_eq!(channels[0].name, "acc_it");
    assert_eq!(channels[1].source_id, "BVP-e4_it");

    assert_eq!(
        sink.samples_of(ChannelKind::Acceleration)[0].values,
        SampleValues::Int(vec![1, 2, 3])
    );
    assert_eq!(
        sink.samples_of(ChannelKind::BloodVolumePulse)[0].values,
        SampleValues::Float(vec![0.75])
    );
    assert_eq!(
        sink.samples_of(ChannelKind::SkinConductance)[0].values,
        SampleValues::Float(vec![0.512])
    );
    assert_eq!(
        sink.samples_of(ChannelKind::Temperature)[0].values,
        SampleValues::Float(vec![31.5])
    );
    assert_eq!(stats.reconnects, 1);
}

#[tokio::test]
async fn test_carry_mode_joins_line_split_across_receives() {
    let server = FakeE4Server::start(vec![ScriptedSession::new(
        &["E4_Bvp 1.0 0,", "25\nE4_Bvp 1.1 0,5\n"],
        Ending::AwaitDisconnect,
    )]);

    let config = SessionConfig {
        line_mode: LineMode::CarryPartial,
        ..config(server.port)
    };
    let sink = MemorySink::new();
    let cancel = cancel_after(&sink, 2);

    let mut supervisor = Supervisor::new(config.clone(), connector(&config), sink.clone());
    supervisor.run(cancel).await.unwrap();
    server.join();

    let values: Vec<SampleValues> = sink
        .samples_of(ChannelKind::BloodVolumePulse)
        .into_iter()
        .map(|s| s.values)
        .collect();
    assert_eq!(
        values,
        vec![
            SampleValues::Float(vec![0.25]),
            SampleValues::Float(vec![0.5]),
        ]
    );
}

// =============================================================================
// FAILURES
// =============================================================================

#[tokio::test]
async fn test_unreachable_server_fails_without_channels() {
    let config = config(common::closed_port());
    let sink = MemorySink::new();

    let mut supervisor = Supervisor::new(config.clone(), connector(&config), sink.clone());
    let result = supervisor.run(CancellationToken::new()).await;

    assert!(matches!(result, Err(BridgeError::Connect(_))));
    assert!(sink.channels().is_empty());
}

#[tokio::test]
async fn test_server_gone_exhausts_reconnect_budget() {
    let server = FakeE4Server::start(vec![ScriptedSession::new(
        &["E4_Temperature 1.0 30,0\n"],
        Ending::Close,
    )]);

    let mut config = config(server.port);
    config.reconnect.max_attempts = Some(1);
    let sink = MemorySink::new();

    let mut supervisor = Supervisor::new(config.clone(), connector(&config), sink.clone());
    let result = supervisor.run(CancellationToken::new()).await;
    server.join();

    assert!(matches!(
        result,
        Err(BridgeError::ReconnectExhausted { attempts: 1 })
    ));
    assert_eq!(sink.samples_of(ChannelKind::Temperature).len(), 1);
}
