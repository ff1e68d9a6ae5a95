//! Multisig Vault CLI Application
//!
//! Builds and inspects multisig policies and drafts proxy vault
//! transactions. Results are printed as JSON.

use clap::{Parser, Subcommand};
use multisig_vault::address::Network;
use multisig_vault::cli::{self, ProxyArgs, WalletBuildArgs};
use multisig_vault::proxy::DrepAction;
use multisig_vault::script::ScriptKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "multisig-vault")]
#[command(version = "0.1.0")]
#[command(about = "Native-script multisig wallets and proxy vaults", long_about = None)]
struct Cli {
    /// Target network (preprod, preview or mainnet)
    #[arg(short, long, global = true, default_value = "preprod")]
    network: Network,

    /// JSON file overriding proxy settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Multisig wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Native script operations
    Script {
        #[command(subcommand)]
        action: ScriptCommands,
    },

    /// Address operations
    Address {
        #[command(subcommand)]
        action: AddressCommands,
    },

    /// Wallet import
    Import {
        #[command(subcommand)]
        action: ImportCommands,
    },

    /// Proxy vault operations
    Proxy {
        #[command(subcommand)]
        action: ProxyCommands,
    },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Build a wallet's policy, address and record
    Build {
        /// JSON array of signer keys
        #[arg(short, long)]
        roster: PathBuf,

        /// Signatures required
        #[arg(short, long)]
        required: u32,

        /// Wallet name
        #[arg(long, default_value = "Multisig wallet")]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Policy combinator (all, any, atLeast)
        #[arg(short, long, default_value = "atLeast")]
        kind: ScriptKind,

        /// External stake credential hash (hex)
        #[arg(long)]
        stake_hash: Option<String>,
    },
}

#[derive(Subcommand)]
enum ScriptCommands {
    /// Decode a native script and summarize it
    Inspect {
        /// Script CBOR (hex)
        cbor: String,
    },
}

#[derive(Subcommand)]
enum AddressCommands {
    /// Show the key hashes in an address
    Keyhash {
        /// Bech32 address
        address: String,
    },
}

#[derive(Subcommand)]
enum ImportCommands {
    /// Validate and reconcile an import payload
    Validate {
        /// Import payload JSON
        #[arg(short, long)]
        payload: PathBuf,

        /// Ledger snapshot used for account lookups
        #[arg(short, long)]
        ledger: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct DeployedProxy {
    /// Compiled validators (plutus.json)
    #[arg(short, long, default_value = "plutus.json")]
    blueprint: PathBuf,

    /// Owner address holding the auth tokens
    #[arg(short, long)]
    owner: String,

    /// Transaction hash of the setup parameter UTxO
    #[arg(long)]
    param_tx: String,

    /// Output index of the setup parameter UTxO
    #[arg(long)]
    param_index: u32,

    /// Ledger snapshot
    #[arg(short, long)]
    ledger: PathBuf,
}

impl DeployedProxy {
    fn args(&self) -> ProxyArgs<'_> {
        ProxyArgs {
            blueprint: &self.blueprint,
            owner: &self.owner,
            param_tx: &self.param_tx,
            param_index: self.param_index,
            ledger: &self.ledger,
        }
    }
}

#[derive(Subcommand)]
enum ProxyCommands {
    /// Draft the setup transaction
    Setup {
        /// Compiled validators (plutus.json)
        #[arg(short, long, default_value = "plutus.json")]
        blueprint: PathBuf,

        /// Owner address
        #[arg(short, long)]
        owner: String,

        /// JSON array of the owner's funding UTxOs
        #[arg(short, long)]
        funding: PathBuf,
    },

    /// Draft a payment out of the proxy
    Spend {
        #[command(flatten)]
        proxy: DeployedProxy,

        /// JSON array of outputs
        #[arg(long)]
        outputs: PathBuf,
    },

    /// Draft a DRep certificate for the proxy
    Drep {
        #[command(flatten)]
        proxy: DeployedProxy,

        /// register, deregister or update
        #[arg(short, long)]
        action: DrepAction,

        #[arg(long)]
        anchor_url: Option<String>,

        #[arg(long)]
        anchor_hash: Option<String>,
    },

    /// Show the proxy's address, DRep id and balance
    Info {
        #[command(flatten)]
        proxy: DeployedProxy,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let network = cli.network;

    match cli.command {
        Commands::Wallet { action } => match action {
            WalletCommands::Build {
                roster,
                required,
                name,
                description,
                kind,
                stake_hash,
            } => {
                let args = WalletBuildArgs {
                    name: &name,
                    description: &description,
                    keys: &roster,
                    required,
                    kind,
                    stake_credential_hash: stake_hash.as_deref(),
                };
                cli::cmd_wallet_build(network, &args)?;
            }
        },

        Commands::Script { action } => match action {
            ScriptCommands::Inspect { cbor } => {
                cli::cmd_script_inspect(network, &cbor)?;
            }
        },

        Commands::Address { action } => match action {
            AddressCommands::Keyhash { address } => {
                cli::cmd_address_keyhash(&address)?;
            }
        },

        Commands::Import { action } => match action {
            ImportCommands::Validate { payload, ledger } => {
                cli::cmd_import_validate(&payload, ledger.as_deref()).await?;
            }
        },

        Commands::Proxy { action } => {
            let config = cli::load_config(cli.config.as_deref())?;
            match action {
                ProxyCommands::Setup {
                    blueprint,
                    owner,
                    funding,
                } => {
                    cli::cmd_proxy_setup(network, config, &blueprint, &owner, &funding)?;
                }
                ProxyCommands::Spend { proxy, outputs } => {
                    cli::cmd_proxy_spend(network, config, &proxy.args(), &outputs).await?;
                }
                ProxyCommands::Drep {
                    proxy,
                    action,
                    anchor_url,
                    anchor_hash,
                } => {
                    cli::cmd_proxy_drep(
                        network,
                        config,
                        &proxy.args(),
                        action,
                        anchor_url.as_deref(),
                        anchor_hash.as_deref(),
                    )
                    .await?;
                }
                ProxyCommands::Info { proxy } => {
                    cli::cmd_proxy_info(network, config, &proxy.args()).await?;
                }
            }
        }
    }

    Ok(())
}
