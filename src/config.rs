//! Runtime configuration: the CLI surface embedding binaries parse
//! arguments with, and the socket-transport environment variables a
//! multi-host deployment reads at startup.
//!
//! Grounded in the teacher's `cli_utils::PrePSIArgs`/`KmprtArgs`
//! `clap`-derive shape (short/long flags, `default_value_t`, a
//! `ValueEnum` for picking among named variants) -- that module was
//! trimmed once its PSI-specific fields stopped applying, but the derive
//! style it used is reused here unchanged.

use crate::error::MpcError;
use crate::runtime::DEFAULT_BATCH_SIZE_LAN;
use clap::{Parser, ValueEnum};

/// Which of the five protocol variants to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProtocolKind {
    /// `P = 1`, no network, every share held by the single party.
    Plaintext,
    /// `P = 2`, dishonest-majority, Beaver-triple multiplication.
    Beaver2Pc,
    /// `P = 3`, honest-majority replicated sharing.
    Replicated3Pc,
    /// `P = 4`, replicated sharing, semi-honest-shaped multiplication.
    Fantastic4PcCustom,
    /// `P = 4`, as above plus a malicious-check transcript hash.
    Fantastic4PcDalskov,
}

/// Which channel transport to wire workers' communicators through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChannelKind {
    /// Local Unix domain sockets (single-host testing).
    Unix,
    /// TCP sockets (multi-host deployment).
    Tcp,
    /// In-process `crossbeam` channels (single-process testing, no I/O).
    Crossbeam,
}

/// Command-line arguments for a binary embedding the runtime.
#[derive(Parser, Debug)]
#[command(author, version, about = "Secure multi-party computation runtime")]
pub struct RuntimeArgs {
    /// Number of worker threads.
    #[arg(long, default_value_t = 1)]
    pub threads: usize,

    /// Number of parties in this computation (1, 2, 3, or 4).
    #[arg(long)]
    pub num_parties: usize,

    /// This process's party rank, `0..num_parties`.
    #[arg(long)]
    pub party_id: usize,

    /// Batch-size parameter: negative means "divide into this many equal
    /// chunks per thread", positive means "use this literal size".
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE_LAN)]
    pub batch_size: i64,

    /// Which protocol variant to run.
    #[arg(long, value_enum)]
    pub protocol: ProtocolKind,

    /// Which channel transport workers should use.
    #[arg(long, value_enum, default_value_t = ChannelKind::Unix)]
    pub channel: ChannelKind,
}

impl RuntimeArgs {
    /// Check the party count and protocol variant agree on how many
    /// parties the run needs (e.g. `Beaver2Pc` requires exactly two).
    pub fn validate(&self) -> Result<(), MpcError> {
        let expected = match self.protocol {
            ProtocolKind::Plaintext => 1,
            ProtocolKind::Beaver2Pc => 2,
            ProtocolKind::Replicated3Pc => 3,
            ProtocolKind::Fantastic4PcCustom | ProtocolKind::Fantastic4PcDalskov => 4,
        };
        if self.num_parties != expected {
            return Err(MpcError::InvalidConfig(format!(
                "{:?} requires exactly {expected} parties, got --num-parties {}",
                self.protocol, self.num_parties
            )));
        }
        if self.party_id >= self.num_parties {
            return Err(MpcError::InvalidConfig(format!(
                "party_id {} out of range for {} parties",
                self.party_id, self.num_parties
            )));
        }
        Ok(())
    }
}

/// Socket-transport configuration for a multi-host deployment, read from
/// the environment variables a launcher script sets per host.
#[derive(Clone, Debug)]
pub struct SocketConfig {
    /// `"local"` or `"cluster"` -- whether every party runs on this host.
    pub exec_mode: String,
    /// Total number of hosts participating.
    pub host_count: usize,
    /// This host's rank among `host_count`.
    pub host_rank: usize,
    /// Base TCP port; each party-pair connection offsets from here.
    pub base_port: u16,
    /// Comma-separated list of host addresses, index-aligned with rank.
    pub host_list: Vec<String>,
}

fn read_env(name: &str) -> Result<String, MpcError> {
    std::env::var(name).map_err(|_| MpcError::InvalidConfig(format!("missing environment variable {name}")))
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<T, MpcError> {
    read_env(name)?
        .parse()
        .map_err(|_| MpcError::InvalidConfig(format!("malformed environment variable {name}")))
}

impl SocketConfig {
    /// Read `STARTMPC_EXEC_MODE`, `STARTMPC_HOST_COUNT`,
    /// `STARTMPC_HOST_RANK`, `STARTMPC_BASE_PORT`, and
    /// `STARTMPC_HOST_LIST` (comma-separated) from the process
    /// environment. Any missing or malformed value is a fatal
    /// configuration error at initialization.
    pub fn from_env() -> Result<Self, MpcError> {
        let exec_mode = read_env("STARTMPC_EXEC_MODE")?;
        let host_count = parse_env("STARTMPC_HOST_COUNT")?;
        let host_rank = parse_env("STARTMPC_HOST_RANK")?;
        let base_port = parse_env("STARTMPC_BASE_PORT")?;
        let host_list: Vec<String> = read_env("STARTMPC_HOST_LIST")?
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();
        if host_list.len() != host_count {
            return Err(MpcError::InvalidConfig(format!(
                "STARTMPC_HOST_LIST has {} entries, expected {host_count} (STARTMPC_HOST_COUNT)",
                host_list.len()
            )));
        }
        if host_rank >= host_count {
            return Err(MpcError::InvalidConfig(format!(
                "STARTMPC_HOST_RANK {host_rank} out of range for {host_count} hosts"
            )));
        }
        Ok(SocketConfig {
            exec_mode,
            host_count,
            host_rank,
            base_port,
            host_list,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn validate_rejects_a_party_count_mismatched_with_the_protocol() {
        let args = RuntimeArgs::parse_from([
            "mpc-runtime",
            "--num-parties",
            "2",
            "--party-id",
            "0",
            "--protocol",
            "replicated3-pc",
        ]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn validate_accepts_a_matching_party_count() {
        let args = RuntimeArgs::parse_from([
            "mpc-runtime",
            "--num-parties",
            "3",
            "--party-id",
            "1",
            "--protocol",
            "replicated3-pc",
        ]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn from_env_reports_a_missing_variable_as_invalid_config() {
        for var in [
            "STARTMPC_EXEC_MODE",
            "STARTMPC_HOST_COUNT",
            "STARTMPC_HOST_RANK",
            "STARTMPC_BASE_PORT",
            "STARTMPC_HOST_LIST",
        ] {
            std::env::remove_var(var);
        }
        assert!(SocketConfig::from_env().is_err());
    }
}
