//! Command line definition.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

/// Caching HTTP forwarding proxy
///
/// Forwards every request to ORIGIN and replays stored GET responses
/// instead of contacting the origin again.
#[derive(Parser, Debug)]
#[command(name = "caching-proxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Port for the proxy server
    #[arg(long)]
    pub port: Option<u16>,

    /// Origin URL to forward requests to (http or https)
    #[arg(long)]
    pub origin: Option<String>,

    /// Clear cached responses and exit
    #[arg(long)]
    pub clear_cache: bool,

    /// Address to bind the listener to
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Cache directory (defaults to $XDG_CACHE_HOME/caching-proxy)
    #[arg(long, env = "CACHING_PROXY_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Upstream request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Relay upstream redirects instead of following them
    #[arg(long)]
    pub no_follow_redirects: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
