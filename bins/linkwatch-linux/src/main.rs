use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linkwatch_core::config::WifiConfig;
use linkwatch_core::{ConfigError, ConfigStorage, ConnectionState, StatusEvent, SupervisorSettings};
use linkwatch_std::{
    Command, FileConfigStorage, HostSupervisor, SimulatedRadio, SimulationPlan, SystemClock,
    TcpSocketFactory,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,linkwatch_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("linkwatch starting...");

    let storage = FileConfigStorage::from_env();
    let settings = load_settings(&storage)?;
    let credentials = settings.credentials().context("invalid WiFi credentials")?;
    let config = settings
        .supervisor_config()
        .context("invalid supervisor settings")?;

    let plan = simulation_plan_from_env()?;
    tracing::info!(
        ssid = credentials.ssid(),
        port = config.port,
        delay_ms = plan.association_delay.as_millis() as u64,
        reject_first = plan.reject_first,
        "using simulated radio"
    );

    let mut supervisor = HostSupervisor::new(
        config,
        SimulatedRadio::new(plan),
        TcpSocketFactory::any(),
        SystemClock::new(),
    );
    supervisor.start(credentials.clone());

    let mut ticker = tokio::time::interval(supervisor.poll_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    tracing::info!("{}", Command::HELP);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                supervisor.poll();
                report_events(supervisor.drain_events());
                accept_pending(&supervisor);
            }
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => match line.parse::<Command>() {
                        Ok(Command::Quit) => break,
                        Ok(command) => handle_command(&mut supervisor, command, &credentials),
                        Err(e) => tracing::warn!("{}", e),
                    },
                    None => {
                        tracing::debug!("stdin closed, commands disabled");
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    supervisor.stop();
    report_events(supervisor.drain_events());
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Settings from the config file, or defaults plus environment overrides.
fn load_settings(storage: &FileConfigStorage) -> anyhow::Result<SupervisorSettings> {
    match storage.load_settings() {
        Ok(settings) => {
            tracing::info!(path = %storage.path().display(), "loaded settings");
            Ok(settings)
        }
        Err(ConfigError::NotFound(_)) => {
            tracing::info!(
                path = %storage.path().display(),
                "no settings file, using defaults and environment"
            );
            Ok(SupervisorSettings {
                wifi: WifiConfig {
                    ssid: std::env::var("LINKWATCH_SSID").unwrap_or_else(|_| "linkwatch-sim".into()),
                    password: std::env::var("LINKWATCH_PASSWORD").unwrap_or_default(),
                },
                port: match std::env::var("LINKWATCH_PORT") {
                    Ok(port) => Some(port.parse().context("LINKWATCH_PORT")?),
                    Err(_) => None,
                },
                ..Default::default()
            })
        }
        Err(e) => Err(e).context("failed to load settings"),
    }
}

fn simulation_plan_from_env() -> anyhow::Result<SimulationPlan> {
    let mut plan = SimulationPlan::default();
    if let Ok(ms) = std::env::var("LINKWATCH_SIM_DELAY_MS") {
        plan.association_delay = Duration::from_millis(ms.parse().context("LINKWATCH_SIM_DELAY_MS")?);
    }
    if let Ok(n) = std::env::var("LINKWATCH_SIM_REJECT") {
        plan.reject_first = n.parse().context("LINKWATCH_SIM_REJECT")?;
    }
    Ok(plan)
}

fn handle_command(
    supervisor: &mut HostSupervisor,
    command: Command,
    credentials: &linkwatch_core::Credentials,
) {
    match command {
        Command::Connect => supervisor.start(credentials.clone()),
        Command::Disconnect => supervisor.stop(),
        Command::Reset => supervisor.reset(),
        Command::DropLink => supervisor.radio_mut().drop_link(),
        Command::Status => print_status(supervisor),
        Command::Help => tracing::info!("{}", Command::HELP),
        Command::Quit => {}
    }
}

fn print_status(supervisor: &HostSupervisor) {
    let status = serde_json::json!({
        "state": supervisor.status(),
        "attempts": supervisor.attempts(),
        "port": supervisor.port(),
        "listening": supervisor.socket().map(|s| s.local_addr().to_string()),
        "link": supervisor.link_info().map(|l| serde_json::json!({
            "ip": l.ip.to_string(),
            "mac": l.mac_string(),
        })),
        "lastFailure": supervisor.last_failure().map(|f| f.to_string()),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    println!("{}", status);
}

/// Log the status stream with wall-clock timestamps.
fn report_events(events: Vec<StatusEvent>) {
    for event in events {
        let now = chrono::Utc::now().to_rfc3339();
        match &event.state {
            ConnectionState::Failed(reason) => {
                tracing::error!(at = %now, monotonic_ms = event.at.as_millis() as u64, "{}", event.state);
                tracing::error!("connection failed: {}; send 'connect' to retry", reason);
            }
            state => {
                tracing::info!(at = %now, monotonic_ms = event.at.as_millis() as u64, "{}", state)
            }
        }
    }
}

/// Hand accepted connections to the request handler. No handler is wired in
/// yet, so connections are logged and closed.
fn accept_pending(supervisor: &HostSupervisor) {
    let Some(socket) = supervisor.socket() else {
        return;
    };
    loop {
        match socket.try_accept() {
            Ok(Some((_stream, peer))) => tracing::info!(%peer, "accepted connection"),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("accept failed: {}", e);
                break;
            }
        }
    }
}
