//! Command-line surface.
//!
//! Three operator entry points: `run`, `keygen`, `invite create`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "newtube-node")]
#[command(author, version, about = "Newtube channel node", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Runs the node: brings up storage and the swarm and serves until
    /// interrupted.
    Run {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Generates a fresh writer/swarm keypair and writes its seed to
    /// disk, printing the public key.
    Keygen {
        #[arg(short, long, default_value = "./data/swarm.key")]
        output: PathBuf,
    },
    /// Operator subcommands for invite management.
    Invite {
        #[command(subcommand)]
        action: InviteAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum InviteAction {
    /// Creates (or reuses) a pairing invite for a channel, printing its
    /// z32 string.
    Create {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Hex-encoded channel key.
        #[arg(long)]
        channel: String,

        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_default_config_path() {
        let cli = Cli::parse_from(["newtube-node", "run"]);
        match cli.command {
            Command::Run { config } => assert_eq!(config, PathBuf::from("config.toml")),
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn parses_invite_create_with_required_channel_flag() {
        let cli = Cli::parse_from(["newtube-node", "invite", "create", "--channel", "ab12"]);
        match cli.command {
            Command::Invite {
                action: InviteAction::Create { channel, ttl_secs, .. },
            } => {
                assert_eq!(channel, "ab12");
                assert_eq!(ttl_secs, 3600);
            }
            _ => panic!("expected Invite Create"),
        }
    }

    #[test]
    fn invite_create_without_channel_fails_to_parse() {
        let result = Cli::try_parse_from(["newtube-node", "invite", "create"]);
        assert!(result.is_err());
    }
}
