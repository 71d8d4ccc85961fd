//! CLI argument parsing via clap.

use clap::{Parser, Subcommand};

/// Run shell scripts through a templated wrapper and stream their output.
#[derive(Debug, Parser)]
#[command(name = "krexec", version = krexec::build_info::CLI_VERSION)]
pub struct Args {
    /// Path to config file (default: ./krexec.toml or ~/.config/krexec/krexec.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Disable color output.
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Emit events as JSON lines.
    #[arg(long = "json")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Prepare the wrapper environment and print the wrapper path.
    Init,
    /// Run a script in a new session and stream its events.
    Run {
        /// Script file, asset reference (file:///android_asset/...), or
        /// script text with --inline.
        script: String,
        /// Exported parameter, repeatable.
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,
        /// Page config file whose directory is exported as PAGE_CONFIG_DIR.
        #[arg(long = "page-config", value_name = "FILE")]
        page_config: Option<String>,
        /// Treat SCRIPT as script text.
        #[arg(long = "inline")]
        inline: bool,
    },
    /// Run a script in the kept shell and print its text output.
    Eval {
        /// Script text or asset reference.
        script: String,
    },
    /// Open an interactive session fed from stdin.
    Shell,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}
