use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

use xdc_config::{default_config_dir, load_config, Config};
use xdc_dbgp::{
    BreakpointStore, DbgpClient, DbgpError, DbgpSession, ExtractOptions, InitPacket, MappingTable,
    StatusInfo,
};

use crate::commands::{UserCommand, HELP};
use crate::logging;
use crate::Args;

/// Set up config and logging, then run one debug session.
pub(crate) fn run_debugger(args: Args) -> Result<()> {
    let project_dir = std::env::current_dir().ok();
    let loaded = match default_config_dir() {
        Some(dir) => load_config(&dir, project_dir.as_deref()),
        None => Ok(Config::default()),
    };
    let (config, config_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let log_path = config
        .log
        .file
        .clone()
        .unwrap_or_else(logging::default_log_file_path);
    if !logging::init(&log_path, config.log.level) {
        eprintln!("xdc: cannot open log file {}", log_path.display());
    }
    info!("xdc starting, log level: {}", config.log.level.as_str());

    if let Some(e) = config_error {
        error!("failed to load config, using defaults: {e}");
        eprintln!("xdc: {e}; using default settings");
    }

    let store = load_breakpoints(args.breakpoints.as_deref());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let mut client = build_client(&config);
    let result = runtime.block_on(debug_session(
        &mut client,
        &store,
        &config.dbgp.ide_key,
        args.connect.as_deref(),
    ));
    client.disconnect();
    info!("xdc exiting");
    result
}

fn build_client(config: &Config) -> DbgpClient {
    let options = ExtractOptions::new(config.dbgp.max_depth, config.dbgp.max_children)
        .with_password_filter(config.dbgp.password_filter());
    let client = DbgpClient::new(DbgpSession::new(config.dbgp.port), options);

    let mappings = MappingTable::new(config.path_mappings());
    if mappings.is_empty() {
        client
    } else {
        client.with_mapper(mappings)
    }
}

/// Read the breakpoint file. Any failure yields an empty store.
fn load_breakpoints(path: Option<&Path>) -> BreakpointStore {
    let Some(path) = path else {
        return BreakpointStore::new();
    };
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            error!("cannot read breakpoints from {}: {e}", path.display());
            return BreakpointStore::new();
        }
    };
    match BreakpointStore::from_json_str(&text) {
        Ok(store) => {
            info!("loaded {} breakpoints from {}", store.len(), path.display());
            store
        }
        Err(e) => {
            error!("invalid breakpoint file {}: {e}", path.display());
            BreakpointStore::new()
        }
    }
}

/// Resolves on Ctrl-C. Never resolves when the signal cannot be watched.
async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Drive `work` to completion unless `interrupt` resolves first, in which
/// case `work` is dropped and `None` is returned.
async fn until_interrupted<T>(
    work: impl Future<Output = T>,
    interrupt: impl Future<Output = ()>,
) -> Option<T> {
    tokio::select! {
        out = work => Some(out),
        () = interrupt => None,
    }
}

/// Close the session after Ctrl-C abandoned a pending exchange.
fn abandon(client: &mut DbgpClient) {
    info!("interrupted, closing debugger session");
    println!("\ninterrupted");
    client.disconnect();
}

async fn debug_session(
    client: &mut DbgpClient,
    store: &BreakpointStore,
    ide_key: &str,
    connect: Option<&str>,
) -> Result<()> {
    match connect {
        Some(addr) => client
            .connect(addr)
            .await
            .with_context(|| format!("failed to connect to {addr}"))?,
        None => {
            println!(
                "waiting for debugger engine on port {} (Ctrl-C to cancel)",
                client.session().port()
            );
            let handle = client.listen_handle();
            let interrupt = tokio::spawn(async move {
                ctrl_c().await;
                handle.stop();
            });
            let accepted = client.listen().await;
            interrupt.abort();
            if accepted.context("failed to accept debugger engine")?.is_none() {
                println!("stopped listening");
                return Ok(());
            }
        }
    }

    let Some(init) = until_interrupted(client.accept_init(), ctrl_c()).await else {
        abandon(client);
        return Ok(());
    };
    let init = init.context("failed to read init packet")?;
    println!("{}", describe_init(&init));
    if let Some(other) = foreign_idekey(&init, ide_key) {
        warn!("engine idekey {other} differs from configured {ide_key}");
        println!("note: engine idekey {other} differs from configured {ide_key}");
    }

    if !store.is_empty() {
        let Some(sent) = until_interrupted(client.set_breakpoints(store), ctrl_c()).await else {
            abandon(client);
            return Ok(());
        };
        match sent {
            Ok(ids) => println!("{} breakpoint(s) set", ids.len()),
            Err(e) => {
                if report(client, &e) {
                    return Ok(());
                }
            }
        }
    }

    command_loop(client, store).await
}

async fn command_loop(client: &mut DbgpClient, store: &BreakpointStore) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"xdc> ").await?;
        stdout.flush().await?;

        let line = match until_interrupted(lines.next_line(), ctrl_c()).await {
            Some(line) => line.context("failed to read stdin")?,
            None => None,
        };
        let Some(line) = line else {
            println!();
            return Ok(());
        };

        let command = match UserCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        if command.needs_engine() && !client.is_connected() {
            println!("not connected");
            continue;
        }

        let Some(outcome) = until_interrupted(execute(client, store, &command), ctrl_c()).await
        else {
            abandon(client);
            return Ok(());
        };
        match outcome {
            Ok(Some(output)) => print!("{output}"),
            Ok(None) => {}
            Err(e) => {
                if report(client, &e) {
                    return Ok(());
                }
            }
        }

        match command {
            UserCommand::Quit => return Ok(()),
            UserCommand::Stop | UserCommand::Detach => {
                client.disconnect();
                return Ok(());
            }
            _ => {}
        }
    }
}

/// Run one command and return the text to print.
async fn execute(
    client: &mut DbgpClient,
    store: &BreakpointStore,
    command: &UserCommand,
) -> Result<Option<String>, DbgpError> {
    let output = match command {
        UserCommand::Run => describe_status(&client.run().await?),
        UserCommand::StepInto => describe_status(&client.step_into().await?),
        UserCommand::StepOver => describe_status(&client.step_over().await?),
        UserCommand::StepOut => describe_status(&client.step_out().await?),
        UserCommand::Status => describe_status(&client.status().await?),
        UserCommand::Stop => describe_status(&client.stop().await?),
        UserCommand::Detach => describe_status(&client.detach().await?),
        UserCommand::Stack => client.stack_values().await?,
        UserCommand::Context => client.context_values().await?,
        UserCommand::Get(name) => match client.variable_values(name) {
            Some(text) => text,
            None if client.context().is_none() => {
                "no context loaded, run `context` first\n".to_string()
            }
            None => format!("{name} not found\n"),
        },
        UserCommand::Breakpoints => client.breakpoint_values(store),
        UserCommand::Help => format!("{HELP}\n"),
        UserCommand::Quit => {
            if client.is_connected() {
                if let Err(e) = client.stop().await {
                    warn!("stop on quit failed: {e}");
                }
            }
            return Ok(None);
        }
    };
    Ok(Some(output))
}

/// Print an engine error. Returns `true` when the session is gone.
fn report(client: &mut DbgpClient, err: &DbgpError) -> bool {
    if client.handle_error(err) {
        println!("debugger engine disconnected");
        return true;
    }
    error!("{err}");
    println!("error: {err}");
    false
}

/// The engine's idekey when it is set and differs from `expected`.
fn foreign_idekey<'a>(init: &'a InitPacket, expected: &str) -> Option<&'a str> {
    init.idekey
        .as_deref()
        .filter(|key| !key.is_empty() && *key != expected)
}

fn describe_init(init: &InitPacket) -> String {
    let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "?".to_string());
    format!(
        "connected: {} session for {} (idekey {})",
        field(&init.language),
        field(&init.fileuri),
        field(&init.idekey),
    )
}

fn describe_status(info: &StatusInfo) -> String {
    let mut text = match (&info.status, &info.reason) {
        (Some(status), Some(reason)) => format!("status: {status} ({reason})\n"),
        (Some(status), None) => format!("status: {status}\n"),
        (None, _) => "status: unknown\n".to_string(),
    };
    if let Some(message) = &info.break_message {
        let file = message.filename.as_deref().unwrap_or("?");
        match message.lineno {
            Some(line) => text.push_str(&format!("at {file}:{line}\n")),
            None => text.push_str(&format!("at {file}\n")),
        }
        if let Some(exception) = &message.exception {
            let detail = message.text.as_deref().unwrap_or_default();
            text.push_str(&format!("{exception}: {detail}\n"));
        }
    }
    text
}
