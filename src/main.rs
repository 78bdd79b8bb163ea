//! Trust Authority - token issuance for federated logins

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use trust_authority::{
    Result,
    cli::{Cli, Command},
    config::Config,
    keys::{KeyId, KeyPair, derive_kid},
    server::AuthorityServer,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::Keygen { ref out, bits }) => run_keygen(out.as_deref(), bits),
        Some(Command::Kid { ref file }) => run_kid(file),
        Some(Command::Serve) | None => run_server(cli).await,
    }
}

/// Generate a key pair and print or write it
fn run_keygen(out: Option<&Path>, bits: usize) -> ExitCode {
    let generated = KeyPair::generate_with_bits(bits).and_then(|pair| pair.encode());
    let encoded = match generated {
        Ok(encoded) => encoded,
        Err(e) => {
            eprintln!("Key generation failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    let kid = derive_kid(&encoded.public_pem);

    match out {
        Some(dir) => match encoded.write_to(dir) {
            Ok((private_path, public_path)) => {
                println!("Private key: {}", private_path.display());
                println!("Public key:  {}", public_path.display());
                println!("kid:         {kid}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to write keys: {e}");
                ExitCode::FAILURE
            }
        },
        None => {
            println!("{}", encoded.private_pem);
            println!("{}", encoded.public_pem);
            println!("kid: {kid}");
            ExitCode::SUCCESS
        }
    }
}

/// Print the kid of a PEM file
fn run_kid(file: &Path) -> ExitCode {
    match kid_of_file(file) {
        Ok(kid) => {
            println!("{kid}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Cannot derive kid from {}: {e}", file.display());
            ExitCode::FAILURE
        }
    }
}

fn kid_of_file(file: &Path) -> Result<KeyId> {
    let text = std::fs::read_to_string(file)?;
    if text.contains("PRIVATE KEY") {
        let public_pem = KeyPair::from_pem(&text)?.public_pem()?;
        Ok(derive_kid(&public_pem))
    } else {
        Ok(derive_kid(&text))
    }
}

/// Run the authority server
async fn run_server(cli: Cli) -> ExitCode {
    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        provider = %config.oauth.provider,
        "Starting trust authority"
    );

    let server = match AuthorityServer::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create authority: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Authority error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Authority shutdown complete");
    ExitCode::SUCCESS
}
