//! Thor driver CLI - inspect a node, send transfers and sign certificates

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ethers::types::{Address, Bytes, U256};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use thor_driver::codec::{address_hex, parse_hex, to_hex};
use thor_driver::config::Settings;
use thor_driver::tx::{Delegation, DelegationResponse};
use thor_driver::{
    BuildTxOptions, CertMessage, CertPayload, Clause, Driver, HttpNet, SignCertOptions,
    SimpleWallet, Wallet,
};

#[derive(Parser)]
#[command(name = "thor-driver")]
#[command(about = "Build, sign and submit Thor transactions", long_about = None)]
struct Cli {
    /// Configuration file; overrides THOR_DRIVER_CONFIG
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Signer address; the first configured key when omitted
    #[arg(short, long)]
    signer: Option<Address>,

    /// Print process metrics after the command completes
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print genesis, head and the configured keys
    Status,
    /// Send a single-clause transfer
    Transfer {
        #[arg(long)]
        to: Address,
        /// Amount in wei (decimal)
        #[arg(long)]
        value: String,
        /// Hex call data
        #[arg(long)]
        data: Option<String>,
        /// Explicit gas limit; estimated when omitted
        #[arg(long)]
        gas: Option<u64>,
        /// Sponsor signature over the delegator signing hash
        #[arg(long, conflicts_with = "delegation_error")]
        delegation_signature: Option<String>,
        /// Simulate a declined sponsorship
        #[arg(long)]
        delegation_error: Option<String>,
    },
    /// Sign an identification certificate
    SignCert {
        #[arg(long, default_value = "identification")]
        purpose: String,
        #[arg(long = "type", default_value = "text")]
        kind: String,
        #[arg(long)]
        content: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    init_logging(settings.logging.json);

    info!("Starting Thor driver v{}", env!("CARGO_PKG_VERSION"));

    let wallet = Arc::new(SimpleWallet::new());
    for key in settings.wallet_keys()? {
        wallet.import(&key).context("Failed to import wallet key")?;
    }

    let net = Arc::new(HttpNet::new(&settings.node.url, settings.node.timeout())?);
    let shared: Arc<dyn Wallet> = wallet.clone();
    let driver = Driver::connect(net, Some(shared)).await?;
    driver.set_tx_params(settings.tx);

    let tracker = if settings.node.head_poll_interval_ms > 0 {
        Some(driver.spawn_head_tracker(std::time::Duration::from_millis(
            settings.node.head_poll_interval_ms,
        )))
    } else {
        None
    };

    let result = run(&cli, &driver, wallet.as_ref()).await;
    if let Some(handle) = tracker {
        handle.abort();
    }
    match &result {
        Ok(()) if cli.print_metrics => print!("{}", thor_driver::metrics::gather_text()),
        Ok(()) => {}
        Err(e) => error!("Command failed: {:#}", e),
    }
    result
}

async fn run(cli: &Cli, driver: &Driver, wallet: &dyn Wallet) -> Result<()> {
    match &cli.command {
        Commands::Status => {
            let genesis = driver.genesis();
            let head = driver.head();
            let keys: Vec<String> = wallet.list().iter().map(|k| address_hex(&k.address)).collect();
            let status = serde_json::json!({
                "genesis": to_hex(genesis.id.as_bytes()),
                "chainTag": genesis.chain_tag(),
                "head": head,
                "txParams": {
                    "expiration": driver.tx_params().expiration,
                    "gasPriceCoef": driver.tx_params().gas_price_coef,
                },
                "keys": keys,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Transfer {
            to,
            value,
            data,
            gas,
            delegation_signature,
            delegation_error,
        } => {
            let value = U256::from_dec_str(value).context("Invalid --value")?;
            let data = match data {
                Some(hex) => Bytes::from(parse_hex(hex)?),
                None => Bytes::new(),
            };
            let clause = Clause {
                to: Some(*to),
                value,
                data,
            };
            let options = BuildTxOptions {
                signer: cli.signer,
                gas: *gas,
                depends_on: None,
            };

            let built = driver.build_tx(vec![clause], options).await?;
            info!(
                "Built transaction from {}, delegator signing hash {:?}",
                address_hex(&built.origin),
                built.delegator_signing_hash()
            );

            let delegation = match (delegation_signature, delegation_error) {
                (Some(signature), _) => Delegation::from(DelegationResponse::signed(signature.clone())),
                (None, Some(reason)) => Delegation::Failed(reason.clone()),
                (None, None) => Delegation::NotRequested,
            };
            let response = built.sign_with(delegation).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::SignCert {
            purpose,
            kind,
            content,
        } => {
            let message = CertMessage {
                purpose: purpose.clone(),
                payload: CertPayload {
                    kind: kind.clone(),
                    content: content.clone(),
                },
            };
            let signed = driver
                .sign_cert(message, SignCertOptions { signer: cli.signer })
                .await?;
            println!("{}", serde_json::to_string_pretty(&signed)?);
        }
    }

    Ok(())
}

fn init_logging(json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,thor_driver=debug,reqwest=warn,hyper=warn")
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
