//! e3x CLI tools: key generation, hashnames, loopback handshake.

#![forbid(unsafe_code)]

mod identity;
mod loopback;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use e3x_cipherset::Registry;
use e3x_common::IdentityFile;

use crate::identity::Identity;

#[derive(Parser, Debug)]
#[command(name = "e3x")]
#[command(about = "e3x cipher set tools")]
struct Args {
    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "E3X_LOG", default_value = "info", global = true)]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate keys for every supported cipher set
    Keygen {
        /// Write the identity here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recompute the hashname of an identity file
    Hashname {
        /// Identity file path
        #[arg(short, long, env = "E3X_IDENTITY")]
        identity: PathBuf,
    },

    /// Handshake with a throwaway peer over localhost UDP
    Loopback {
        /// Identity file path; a fresh identity is generated if omitted
        #[arg(short, long, env = "E3X_IDENTITY")]
        identity: Option<PathBuf>,

        /// Handshake timestamp
        #[arg(long, default_value_t = 1)]
        at: u32,

        /// Packet body sent by the initiator
        #[arg(long, default_value = "hello")]
        message: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let args = Args::parse();
    e3x_common::init_tracing_with_default(&args.log);

    let registry = Registry::with_defaults();

    match args.command {
        Command::Keygen { output } => {
            let file = Identity::generate(&registry)?.to_file()?;
            match output {
                Some(path) => {
                    file.save(&path)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Identity: {}", path.display());
                    println!("Hashname: {}", file.hashname);
                }
                None => println!("{}", file.to_json()?),
            }
        }
        Command::Hashname { identity } => {
            let file = load(&identity)?;
            let hashname = Identity::from_file(&registry, &file)?.hashname()?;
            if hashname.as_str() != file.hashname {
                warn!(stored = %file.hashname, computed = %hashname, "stored hashname is stale");
            }
            println!("{}", hashname);
        }
        Command::Loopback {
            identity,
            at,
            message,
        } => {
            let initiator = match identity {
                Some(path) => Identity::from_file(&registry, &load(&path)?)?,
                None => Identity::generate(&registry)?,
            };
            info!(hashname = %initiator.hashname()?, "initiator ready");

            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let options = loopback::Options { at, message };
            let report = rt.block_on(loopback::run(&registry, &initiator, &options))?;

            println!("Cipher set:      {}", report.csid);
            println!("Initiator token: {}", report.initiator_token);
            println!("Responder token: {}", report.responder_token);
            println!("Sent:            {}", report.request);
            println!("Received:        {}", report.reply);
        }
        Command::Version => {
            println!("e3x {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<IdentityFile> {
    IdentityFile::load(path).with_context(|| format!("loading {}", path.display()))
}
