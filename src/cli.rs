//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::keys::material::DEFAULT_KEY_BITS;

/// Token authority for federated logins
#[derive(Parser, Debug)]
#[command(name = "trust-authority")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "TRUST_AUTHORITY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "TRUST_AUTHORITY_PORT", global = true)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "TRUST_AUTHORITY_HOST", global = true)]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "TRUST_AUTHORITY_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "TRUST_AUTHORITY_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the authority server (default)
    Serve,

    /// Generate a new signing key pair and print its kid
    Keygen {
        /// Write `private.pem` and `public.pem` here instead of printing
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// RSA modulus size
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
    },

    /// Print the kid of a PEM key file (public, or private to derive from)
    Kid {
        /// Path to the PEM file
        #[arg(required = true)]
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["trust-authority", "--port", "9000"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn serve_accepts_port_and_host_after_subcommand() {
        let cli = Cli::try_parse_from([
            "trust-authority",
            "serve",
            "--port",
            "9000",
            "--host",
            "0.0.0.0",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Command::Serve)));
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
    }

    #[test]
    fn keygen_takes_out_dir_and_bits() {
        let cli =
            Cli::try_parse_from(["trust-authority", "keygen", "--out", "/tmp/k", "--bits", "4096"])
                .unwrap();
        match cli.command {
            Some(Command::Keygen { out, bits }) => {
                assert_eq!(out, Some(PathBuf::from("/tmp/k")));
                assert_eq!(bits, 4096);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn kid_requires_file() {
        assert!(Cli::try_parse_from(["trust-authority", "kid"]).is_err());
    }
}
