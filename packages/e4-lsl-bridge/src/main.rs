use clap::Parser;
use e4_lsl_bridge::{BridgeError, NdjsonSink, OutputSink, SessionConfig, Supervisor, TcpConnector};
use tokio_util::sync::CancellationToken;

mod cli;
mod exit_codes;

use cli::{Cli, SinkKind};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .format_timestamp_millis()
        .init();

    let config = cli.session_config();
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(exit_codes::INPUT_ERROR);
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Interrupt received, disconnecting");
                interrupt.cancel();
            }
            Err(e) => log::warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    let exit_code = match cli.sink {
        SinkKind::Ndjson => run(config, NdjsonSink::stdout(), cancel).await,
        #[cfg(feature = "lsl-support")]
        SinkKind::Lsl => run(config, e4_lsl_bridge::LslSink::new(), cancel).await,
        #[cfg(not(feature = "lsl-support"))]
        SinkKind::Lsl => {
            eprintln!("Error: built without LSL support; rebuild with --features lsl-support");
            exit_codes::INPUT_ERROR
        }
    };

    std::process::exit(exit_code);
}

async fn run<S: OutputSink>(config: SessionConfig, sink: S, cancel: CancellationToken) -> i32 {
    log::info!(
        "Bridging device {} from {}:{} (instance '{}')",
        config.device_id,
        config.address,
        config.port,
        config.instance_name
    );

    let connector = TcpConnector::new(
        config.address.clone(),
        config.port,
        config.connect_timeout,
        config.read_timeout,
    );
    let mut supervisor = Supervisor::new(config, connector, sink);

    match supervisor.run(cancel).await {
        Ok(_) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &BridgeError) -> i32 {
    match error {
        BridgeError::ReconnectExhausted { .. } => exit_codes::RECONNECT_EXHAUSTED,
        BridgeError::Sink(_) => exit_codes::SINK_ERROR,
        BridgeError::InvalidConfig(_) => exit_codes::INPUT_ERROR,
        _ => exit_codes::CONNECT_ERROR,
    }
}
