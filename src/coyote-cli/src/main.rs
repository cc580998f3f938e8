use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use coyote_core::{
    init_logging, AppDirs, Config, ConnectionConfig, ConnectionStatus, HostContext, LogLevel,
    Protocol,
};
use coyote_plugin::catalog::InputField;
use coyote_plugin::protocol::{OPTION_PRESET_ID, OPTION_SEEK_TIME};
use coyote_plugin::{
    notice_channel, Action, ActionInvocation, ActionKind, CoyotePlugin, DispatchOutcome,
    Endpoint, TokioTransportFactory, TransportError,
};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Time given to the writer task to flush a queued command before teardown.
const FLUSH_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Parser)]
#[command(name = "coyote", version, about = "Remote control for Coyote playback devices")]
struct Cli {
    /// Config file to load instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Device address override (takes precedence over config)
    #[arg(long, global = true)]
    host: Option<String>,
    /// Device port override
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Transport override: tcp or udp
    #[arg(long, global = true)]
    protocol: Option<Protocol>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send an action to the device
    Send(SendCommand),
    /// Print the wire payload for an action without sending it
    Encode(ActionArgs),
    /// List the actions the device understands
    Actions {
        /// Emit the host-facing JSON definitions
        #[arg(long)]
        json: bool,
    },
    /// List the preset buttons
    Presets {
        #[arg(long)]
        json: bool,
    },
    /// Print the connection settings form as JSON
    ConfigFields,
}

#[derive(Debug, Args, Clone)]
struct ActionArgs {
    /// Action name, e.g. play, seek_to, take_next
    action: ActionKind,
    /// Preset id (play, pause, end, seek_to, select_preset)
    #[arg(long)]
    id: Option<String>,
    /// Seek target in milliseconds (seek_to)
    #[arg(long = "seek-time", value_parser = clap::value_parser!(u64).range(1..=10_000_000))]
    seek_time: Option<u64>,
}

#[derive(Debug, Args, Clone)]
struct SendCommand {
    #[command(flatten)]
    action: ActionArgs,
    /// How long to wait for a TCP connection before giving up
    #[arg(long = "wait-ms", default_value_t = 3000)]
    wait_ms: u64,
}

impl ActionArgs {
    fn invocation(&self) -> ActionInvocation {
        let mut invocation = ActionInvocation::new(self.action);
        if let Some(id) = &self.id {
            invocation = invocation.with_option(OPTION_PRESET_ID, id.as_str());
        }
        if let Some(seek_time) = self.seek_time {
            invocation = invocation.with_option(OPTION_SEEK_TIME, seek_time);
        }
        invocation
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("no device host configured; set [connection].host in {config} or pass --host")]
    MissingHost { config: String },
    #[error("'{action}' was not delivered to {endpoint} (status: {status})")]
    NotDelivered {
        action: ActionKind,
        endpoint: Endpoint,
        status: ConnectionStatus,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Host context for a one-shot command line session.
struct CliHost {
    config: ConnectionConfig,
}

impl HostContext for CliHost {
    fn report_status(&self, status: &ConnectionStatus) {
        tracing::info!(%status, "connection status");
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!("{message}"),
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warn => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
    }

    fn read_config(&self) -> ConnectionConfig {
        self.config.clone()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_default(&dirs)?,
    };
    let _logging = init_logging(&config.logging, &dirs)?;
    let connection = apply_overrides(config.connection.clone(), &cli);

    match &cli.command {
        Command::Send(send) => {
            let config_path = cli
                .config
                .clone()
                .unwrap_or_else(|| Config::config_path(&dirs));
            let endpoint =
                Endpoint::from_config(&connection).ok_or_else(|| CliError::MissingHost {
                    config: config_path.display().to_string(),
                })?;
            send_action(connection, endpoint, send).await?;
        }
        Command::Encode(args) => {
            let action = Action::from_invocation(&args.invocation());
            if let Some(payload) = action.encode() {
                println!("{}", payload.replace("\r\n", "\\r\\n"));
            }
        }
        Command::Actions { json } => {
            let actions = coyote_plugin::catalog::actions();
            if *json {
                println!("{}", serde_json::to_string_pretty(&actions)?);
            } else {
                for def in &actions {
                    let options: Vec<_> = def.options.iter().map(InputField::id).collect();
                    println!(
                        "{:<14} {:<20} {}",
                        def.id.as_str(),
                        def.label,
                        options.join(", ")
                    );
                }
            }
        }
        Command::Presets { json } => {
            let presets = coyote_plugin::catalog::presets();
            if *json {
                println!("{}", serde_json::to_string_pretty(&presets)?);
            } else {
                for preset in &presets {
                    let action = &preset.actions[0];
                    println!(
                        "{:<9} {:<16} {} {}",
                        format!("{:?}", preset.category),
                        preset.label,
                        action.action,
                        serde_json::Value::Object(action.options.clone())
                    );
                }
            }
        }
        Command::ConfigFields => {
            let fields = coyote_plugin::catalog::config_fields();
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
    }

    Ok(())
}

fn apply_overrides(mut connection: ConnectionConfig, cli: &Cli) -> ConnectionConfig {
    if let Some(host) = &cli.host {
        connection.host = Some(host.clone());
    }
    if let Some(port) = cli.port {
        connection.port = port;
    }
    if let Some(protocol) = cli.protocol {
        connection.protocol = protocol;
    }
    connection
}

async fn send_action(
    connection: ConnectionConfig,
    endpoint: Endpoint,
    send: &SendCommand,
) -> Result<(), CliError> {
    let protocol = connection.protocol;
    let factory = TokioTransportFactory::current()?;
    let (tx, mut notices) = notice_channel();
    let mut plugin = CoyotePlugin::new(CliHost { config: connection }, factory, tx);
    plugin.init();

    if protocol.is_stream() {
        let deadline = tokio::time::sleep(Duration::from_millis(send.wait_ms));
        tokio::pin!(deadline);
        while matches!(plugin.status(), ConnectionStatus::Connecting) {
            tokio::select! {
                Some(notice) = notices.recv() => plugin.handle_notice(notice),
                _ = &mut deadline => {
                    tracing::warn!(%endpoint, wait_ms = send.wait_ms, "still connecting, giving up");
                    break;
                }
            }
        }
    }

    let outcome = plugin.action(&send.action.invocation());
    if outcome == DispatchOutcome::Sent {
        tokio::time::sleep(FLUSH_GRACE).await;
        while let Ok(notice) = notices.try_recv() {
            plugin.handle_notice(notice);
        }
    }
    let status = plugin.status().clone();
    plugin.teardown();

    match outcome {
        DispatchOutcome::Sent => {
            println!("Sent '{}' to {} over {}", send.action.action, endpoint, protocol);
            Ok(())
        }
        DispatchOutcome::Dropped | DispatchOutcome::Unknown => Err(CliError::NotDelivered {
            action: send.action.action,
            endpoint,
            status,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("coyote").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn send_parses_action_and_options() {
        let parsed = cli(&["send", "seek_to", "--id", "3", "--seek-time", "5000"]);
        let Command::Send(send) = parsed.command else {
            panic!("expected send command");
        };
        assert_eq!(send.action.action, ActionKind::SeekTo);
        assert_eq!(send.wait_ms, 3000);

        let action = Action::from_invocation(&send.action.invocation());
        assert_eq!(
            action.encode().as_deref(),
            Some("{\"CoyoteAPIVersion\":\"0.3\",\"CommandName\":\"SeekTo\",\"Data\":{\"PK\":3,\"TimeIndex\":5000}}\r\n\r\n")
        );
    }

    #[test]
    fn unknown_action_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["coyote", "send", "id_play"]);
        assert!(result.is_err());
    }

    #[test]
    fn seek_time_is_range_checked() {
        let result = Cli::try_parse_from(["coyote", "encode", "seek_to", "--seek-time", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn overrides_take_precedence_over_config() {
        let parsed = cli(&[
            "--host",
            "10.0.0.7",
            "--protocol",
            "udp",
            "--port",
            "9000",
            "actions",
        ]);
        let connection = apply_overrides(
            ConnectionConfig::new("10.0.0.1", 7000, Protocol::Tcp),
            &parsed,
        );
        assert_eq!(connection.host(), Some("10.0.0.7"));
        assert_eq!(connection.port, 9000);
        assert_eq!(connection.protocol, Protocol::Udp);
    }

    #[test]
    fn missing_overrides_keep_config() {
        let parsed = cli(&["presets"]);
        let original = ConnectionConfig::new("10.0.0.1", 7000, Protocol::Tcp);
        assert_eq!(apply_overrides(original.clone(), &parsed), original);
    }
}
