//! CLI entry point for krexec.

mod cli;

use clap::Parser;
use krexec::config::load_config;
use krexec::engine::{ExecRequest, PageContext, ScriptEngine};
use krexec::materialize::ASSET_SCHEME;
use krexec::render::{EventRenderer, RenderMode};
use krexec::session::{ForceStop, ShellSession};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Exit status reported when the session was killed by a signal.
const TERMINATED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env("KREXEC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();
    let config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let mode = if args.json {
        RenderMode::Json
    } else if args.no_color {
        RenderMode::Plain
    } else {
        RenderMode::Color
    };

    let engine = ScriptEngine::from_config(&config);
    let code = match run_command(&engine, args.command, mode).await {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("error: {msg}");
            1
        }
    };
    engine.reset().await;
    std::process::exit(code);
}

async fn run_command(
    engine: &ScriptEngine,
    command: cli::Command,
    mode: RenderMode,
) -> Result<i32, String> {
    match command {
        cli::Command::Init => {
            let environment = engine.ensure_initialized().await.map_err(|e| e.to_string())?;
            if mode == RenderMode::Json {
                println!(
                    "{}",
                    json!({
                        "executor": environment.executor_path().display().to_string(),
                        "rooted": environment.rooted(),
                        "variables": environment.variables(),
                    })
                );
            } else {
                println!("{}", environment.executor_path().display());
            }
            Ok(0)
        }
        cli::Command::Eval { script } => {
            let outputs = engine
                .execute_outputs(&script, None)
                .await
                .map_err(|e| e.to_string())?;
            if mode == RenderMode::Json {
                println!("{}", serde_json::to_string(&outputs).map_err(|e| e.to_string())?);
            } else {
                println!("{}", krexec::output::joined_text(&outputs));
            }
            Ok(0)
        }
        cli::Command::Run {
            script,
            params,
            page_config,
            inline,
        } => {
            let script = resolve_script(script, inline)?;
            let mut request = ExecRequest {
                script,
                params: params.into_iter().collect(),
                page: None,
                interruptible: true,
            };
            if let Some(file) = page_config {
                request = request.page(page_context(&file));
            }
            run_session(engine, request, mode).await
        }
        cli::Command::Shell => run_interactive(engine, mode).await,
    }
}

async fn run_session(
    engine: &ScriptEngine,
    request: ExecRequest,
    mode: RenderMode,
) -> Result<i32, String> {
    let session = ShellSession::new();
    let Some(mut run) = engine
        .execute(&session, request)
        .await
        .map_err(|e| e.to_string())?
    else {
        return Err(format!("session {} already started", session.tag()));
    };
    let ctrl_c = spawn_ctrl_c_handler(run.force_stop().cloned());
    let mut renderer = EventRenderer::stdout(mode);
    let code = run.drain_into(&mut renderer).await;
    ctrl_c.abort();
    Ok(code.unwrap_or(TERMINATED_EXIT_CODE))
}

async fn run_interactive(engine: &ScriptEngine, mode: RenderMode) -> Result<i32, String> {
    let session = ShellSession::new();
    let Some(shell) = engine
        .open_interactive(&session)
        .await
        .map_err(|e| e.to_string())?
    else {
        return Err(format!("session {} already started", session.tag()));
    };
    let ctrl_c = spawn_ctrl_c_handler(Some(shell.force_stop().clone()));
    let (input, mut run) = shell.into_parts();

    let writer = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Err(err) = input.write(&line).await {
                        tracing::warn!(error = %err, "stopped forwarding stdin");
                        return;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read stdin");
                    break;
                }
            }
        }
        if let Err(err) = input.finish().await {
            tracing::debug!(error = %err, "shell already closed");
        }
    });

    let mut renderer = EventRenderer::stdout(mode);
    let code = run.drain_into(&mut renderer).await;
    writer.abort();
    ctrl_c.abort();
    Ok(code.unwrap_or(TERMINATED_EXIT_CODE))
}

fn spawn_ctrl_c_handler(stop: Option<ForceStop>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            match &stop {
                Some(stop) => stop.invoke(),
                None => tracing::warn!("session is not interruptible"),
            }
        }
    })
}

/// Script text for `run`: asset references and `--inline` text pass through,
/// anything else is read as a local file.
fn resolve_script(script: String, inline: bool) -> Result<String, String> {
    if inline || script.starts_with(ASSET_SCHEME) {
        return Ok(script);
    }
    std::fs::read_to_string(&script).map_err(|e| format!("failed to read `{script}`: {e}"))
}

/// Page context for a config file path, local or asset.
fn page_context(file: &str) -> PageContext {
    let dir = match file.rfind('/') {
        Some(0) => "/",
        Some(idx) => &file[..idx],
        None => ".",
    };
    PageContext {
        config_dir: dir.to_string(),
        config_file: file.to_string(),
    }
}
