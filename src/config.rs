//! Configuration types for stripefs
//!
//! This module defines:
//! - CLI argument parsing for the `master`, `peer` and `dfs` binaries (clap derive)
//! - Runtime configuration with validation
//! - Logging setup shared by the binaries

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::cluster::HealthSettings;
use crate::stripe::RecordSizes;

/// Upper bound on the cluster size
const MAX_PEERS: usize = 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cluster size must be between 1 and {max}, got {value}")]
    InvalidPeerCount { value: usize, max: usize },

    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    #[error("invalid record size entry '{entry}': {reason}")]
    InvalidRecordEntry { entry: String, reason: String },

    #[error("invalid advertise address '{address}': {reason}")]
    InvalidAdvertise { address: String, reason: String },
}

/// Striped file store master
#[derive(Parser, Debug, Clone)]
#[command(
    name = "master",
    version,
    about = "Coordinates a fixed-size cluster of storage peers and stripes file records across them",
    after_help = "EXAMPLES:\n    \
        master --peers 3\n    \
        RPC_PORT=6000 master --peers 5 --health-interval-ms 500"
)]
pub struct MasterArgs {
    /// Number of peers the cluster waits for before serving data
    #[arg(short = 'n', long, default_value = "3", value_name = "NUM")]
    pub peers: usize,

    /// Address the master listens on
    #[arg(long, default_value = "0.0.0.0:5001", value_name = "ADDR")]
    pub bind: SocketAddr,

    /// Overrides the port of --bind
    #[arg(long, env = "RPC_PORT", value_name = "PORT")]
    pub port: Option<u16>,

    /// Interval between health sweeps
    #[arg(long, default_value = "1000", value_name = "MS")]
    pub health_interval_ms: u64,

    /// Timeout for dialing a peer
    #[arg(long, default_value = "3000", value_name = "MS")]
    pub dial_timeout_ms: u64,

    /// Timeout for a single call to a peer
    #[arg(long, default_value = "5000", value_name = "MS")]
    pub call_timeout_ms: u64,

    /// Only log errors
    #[arg(short = 's', long)]
    pub silent: bool,

    /// Debug logging
    #[arg(short = 'v', long, conflicts_with = "silent")]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub target_size: usize,
    pub bind: SocketAddr,
    pub health: HealthSettings,
    pub call_timeout: Duration,
}

impl MasterConfig {
    pub fn from_args(args: &MasterArgs) -> Result<Self, ConfigError> {
        if args.peers == 0 || args.peers > MAX_PEERS {
            return Err(ConfigError::InvalidPeerCount {
                value: args.peers,
                max: MAX_PEERS,
            });
        }

        let interval = positive_millis("health interval", args.health_interval_ms)?;
        let dial_timeout = positive_millis("dial timeout", args.dial_timeout_ms)?;
        let call_timeout = positive_millis("call timeout", args.call_timeout_ms)?;

        let mut bind = args.bind;
        if let Some(port) = args.port {
            bind.set_port(port);
        }

        Ok(Self {
            target_size: args.peers,
            bind,
            health: HealthSettings {
                interval,
                dial_timeout,
                ping_timeout: call_timeout,
            },
            call_timeout,
        })
    }
}

/// Striped file store peer
#[derive(Parser, Debug, Clone)]
#[command(
    name = "peer",
    version,
    about = "Stores the records a master assigns to it in a local directory",
    after_help = "EXAMPLES:\n    \
        peer --bind 127.0.0.1:5002 --fsdir /tmp/peer-1\n    \
        peer --master 10.0.0.1:5001 --bind 0.0.0.0:5002 --advertise 10.0.0.7:5002"
)]
pub struct PeerArgs {
    /// Master to register with
    #[arg(
        short = 'm',
        long,
        env = "DFS_MASTER",
        default_value = "127.0.0.1:5001",
        value_name = "ADDR"
    )]
    pub master: String,

    /// Address the peer listens on
    #[arg(long, default_value = "127.0.0.1:5002", value_name = "ADDR")]
    pub bind: SocketAddr,

    /// Address the master should dial (defaults to the bound address)
    #[arg(long, value_name = "ADDR")]
    pub advertise: Option<String>,

    /// Directory holding this peer's record files
    #[arg(long, default_value = "peer-data", value_name = "DIR")]
    pub fsdir: PathBuf,

    /// Registration attempts while the master is unreachable
    #[arg(long, default_value = "10", value_name = "NUM")]
    pub register_attempts: usize,

    /// Only log errors
    #[arg(short = 's', long)]
    pub silent: bool,

    /// Debug logging
    #[arg(short = 'v', long, conflicts_with = "silent")]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub master: String,
    pub fsdir: PathBuf,
    pub register_attempts: usize,
}

impl PeerConfig {
    pub fn from_args(args: &PeerArgs) -> Result<Self, ConfigError> {
        Ok(Self {
            master: args.master.clone(),
            fsdir: args.fsdir.clone(),
            register_attempts: args.register_attempts.max(1),
        })
    }
}

/// Address the master should use to reach a peer bound to `bound`.
///
/// An explicit `advertise` wins; an unspecified bind address is advertised as
/// loopback.
pub fn advertise_address(
    advertise: Option<&str>,
    bound: SocketAddr,
) -> Result<String, ConfigError> {
    if let Some(address) = advertise {
        let address = address.trim();
        return match address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(address.to_string())
            }
            _ => Err(ConfigError::InvalidAdvertise {
                address: address.to_string(),
                reason: "expected host:port".to_string(),
            }),
        };
    }

    if bound.ip().is_unspecified() {
        Ok(format!("127.0.0.1:{}", bound.port()))
    } else {
        Ok(bound.to_string())
    }
}

/// Striped file store client
#[derive(Parser, Debug, Clone)]
#[command(
    name = "dfs",
    version,
    about = "Talks to a stripefs master",
    after_help = "EXAMPLES:\n    \
        dfs init-map log.dat=512 index.dat=64\n    \
        dfs create log.dat\n    \
        dfs write log.dat 0 --input chunk.bin\n    \
        dfs read log.dat 0 1024 --output out.bin\n    \
        dfs status"
)]
pub struct ClientArgs {
    /// Master address
    #[arg(
        short = 'm',
        long,
        env = "DFS_MASTER",
        default_value = "127.0.0.1:5001",
        value_name = "ADDR"
    )]
    pub master: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub timeout: u64,

    /// Debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Replace the record size mapping (NAME=SIZE pairs)
    InitMap {
        #[arg(required = true, value_name = "NAME=SIZE")]
        entries: Vec<String>,
    },

    /// Write bytes at an offset; the length must be a multiple of the record size
    Write {
        filename: String,
        offset: i32,
        /// Read the payload from this file instead of --data
        #[arg(short, long, value_name = "FILE", conflicts_with = "data")]
        input: Option<PathBuf>,
        /// Literal payload
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Read COUNT bytes at an offset
    Read {
        filename: String,
        offset: i32,
        count: i32,
        /// Write the bytes to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Create a file on every peer
    Create { filename: String },

    /// Delete a file on every peer
    Delete { filename: String },

    /// Check whether any peer holds a file
    Exists { filename: String },

    /// Show cluster membership and readiness
    Status {
        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },
}

/// Parses `NAME=SIZE` pairs into a record size mapping.
pub fn parse_record_sizes(entries: &[String]) -> Result<RecordSizes, ConfigError> {
    let mut sizes = RecordSizes::with_capacity(entries.len());

    for entry in entries {
        let invalid = |reason: &str| ConfigError::InvalidRecordEntry {
            entry: entry.clone(),
            reason: reason.to_string(),
        };

        let (name, size) = entry.split_once('=').ok_or_else(|| invalid("expected NAME=SIZE"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("empty file name"));
        }
        let size: u32 = size
            .trim()
            .parse()
            .map_err(|_| invalid("size is not a positive integer"))?;
        if size == 0 {
            return Err(invalid("size must be greater than zero"));
        }

        sizes.insert(name.to_string(), size);
    }

    Ok(sizes)
}

fn positive_millis(name: &'static str, millis: u64) -> Result<Duration, ConfigError> {
    if millis == 0 {
        return Err(ConfigError::ZeroDuration { name });
    }
    Ok(Duration::from_millis(millis))
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides the defaults.
pub fn setup_logging(silent: bool, verbose: bool) {
    let default = if silent {
        "error"
    } else if verbose {
        "stripefs=debug,warn"
    } else {
        "stripefs=info,warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master_args(extra: &[&str]) -> MasterArgs {
        let mut argv = vec!["master"];
        argv.extend_from_slice(extra);
        MasterArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_master_defaults() {
        let args = master_args(&[]);
        let config = MasterConfig::from_args(&MasterArgs { port: None, ..args }).unwrap();

        assert_eq!(config.target_size, 3);
        assert_eq!(config.bind.port(), 5001);
        assert_eq!(config.health.interval, Duration::from_millis(1000));
        assert_eq!(config.health.dial_timeout, Duration::from_secs(3));
        assert_eq!(config.call_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_port_overrides_bind() {
        let args = master_args(&["--bind", "127.0.0.1:7000", "--port", "7100"]);
        let config = MasterConfig::from_args(&args).unwrap();
        assert_eq!(config.bind, "127.0.0.1:7100".parse().unwrap());
    }

    #[test]
    fn test_master_rejects_bad_values() {
        let args = master_args(&["--peers", "0"]);
        assert!(matches!(
            MasterConfig::from_args(&args),
            Err(ConfigError::InvalidPeerCount { .. })
        ));

        let args = master_args(&["--call-timeout-ms", "0"]);
        assert!(matches!(
            MasterConfig::from_args(&args),
            Err(ConfigError::ZeroDuration { .. })
        ));
    }

    #[test]
    fn test_parse_record_sizes() {
        let entries = vec!["a.dat=5".to_string(), " b.dat = 64 ".to_string()];
        let sizes = parse_record_sizes(&entries).unwrap();
        assert_eq!(sizes.get("a.dat"), Some(&5));
        assert_eq!(sizes.get("b.dat"), Some(&64));

        for bad in ["a.dat", "=5", "a.dat=0", "a.dat=-1", "a.dat=x"] {
            assert!(
                parse_record_sizes(&[bad.to_string()]).is_err(),
                "'{}' must be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_advertise_address() {
        let bound: SocketAddr = "0.0.0.0:5002".parse().unwrap();
        assert_eq!(advertise_address(None, bound).unwrap(), "127.0.0.1:5002");

        let bound: SocketAddr = "10.1.2.3:5002".parse().unwrap();
        assert_eq!(advertise_address(None, bound).unwrap(), "10.1.2.3:5002");

        assert_eq!(
            advertise_address(Some("node7:6000"), bound).unwrap(),
            "node7:6000"
        );
        assert!(advertise_address(Some("node7"), bound).is_err());
    }

    #[test]
    fn test_client_subcommands_parse() {
        let args = ClientArgs::try_parse_from(["dfs", "read", "log.dat", "0", "10"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Read { offset: 0, count: 10, .. }
        ));

        let args = ClientArgs::try_parse_from(["dfs", "init-map", "a=1", "b=2"]).unwrap();
        match args.command {
            Command::InitMap { entries } => assert_eq!(entries.len(), 2),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_read_count_must_fit_the_wire() {
        let args = ["dfs", "read", "log.dat", "0", "4294967296"];
        assert!(ClientArgs::try_parse_from(args).is_err());

        let args = ["dfs", "read", "log.dat", "0", "2147483647"];
        assert!(ClientArgs::try_parse_from(args).is_ok());
    }
}
