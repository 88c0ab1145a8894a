use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "gifstash",
    about = "gifstash: multi-tenant image namespaces over HTTP",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the configuration and tenant stores
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Seed rules and provision the administrator account
    Bootstrap,
    /// Insert or replace a path permission rule
    SetRule(SetRuleArgs),
    /// List stored permission rules
    Rules,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct SetRuleArgs {
    /// Regular expression matched anywhere in the request path
    pub pattern: String,
    /// Comma-separated scopes, any of which admits the request
    pub scope: String,
}
