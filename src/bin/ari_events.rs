use anyhow::{Context, Result};
use ari_event_stream::bin_common::{config_path_from_args, parse_args, ConfigType, RunConfig, ShutdownSignal};
use ari_event_stream::config::EventsConfig;
use ari_event_stream::logging::init_tracing;
use eventsockets::{Payload, SharedSource, SocketEvent, WsTransportFactory};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load config first (before logging is initialized)
    let args = parse_args();
    let config_path = config_path_from_args(&args, ConfigType::Events);
    let config = EventsConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_tracing(&config.log_level);
    config.log();

    let run = RunConfig::new("ARI event stream").with_heartbeat(config.heartbeat_secs);
    let shutdown = ShutdownSignal::new();
    shutdown.spawn_signal_handler();

    let source = SharedSource::new(config.connect_params(), Arc::new(WsTransportFactory))?;
    let mut events = source.subscribe()?;

    run.print_banner();

    let mut received: u64 = 0;
    let mut heartbeat = tokio::time::interval(run.heartbeat_interval());
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,

            _ = heartbeat.tick() => {
                info!("Heartbeat: no events in the last {}s", run.heartbeat_interval_secs);
            }

            event = events.recv() => {
                let Some(event) = event else { break };
                heartbeat.reset();

                match event {
                    SocketEvent::Open => info!("Connected"),
                    SocketEvent::Reconnected => info!("Reconnected"),
                    SocketEvent::Disconnected(details) => {
                        warn!("Disconnected ({:?}), reconnecting", details.reason);
                    }
                    SocketEvent::Message(Payload::Json(value)) => {
                        received += 1;
                        let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or("unknown");
                        info!(kind, "{}", value);
                    }
                    SocketEvent::Message(other) => {
                        received += 1;
                        info!("Raw frame: {:?}", other);
                    }
                    SocketEvent::Error(err) => error!("Stream error: {}", err),
                    SocketEvent::Close => {
                        info!("Stream closed");
                        break;
                    }
                }
            }
        }
    }

    events.unsubscribe();
    run.print_shutdown(Some(&format!("Events received: {}", received)));
    Ok(())
}
