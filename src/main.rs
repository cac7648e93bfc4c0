//! Vault rebalancer CLI
//!
//! Runs the automation executor: polls the console for pending tasks,
//! evaluates them with a strategy and submits signed executions.

use alloy::primitives::{Address, U256};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vault_rebalancer::chain::{ChainReader, RpcChainReader};
use secrecy::SecretString;
use vault_rebalancer::config::env_vars;
use vault_rebalancer::console::{
    ConsoleClient, ConsoleExecutorConfig, ExecutorListing, KernelExecutorConfig, Subscription,
    SubscriptionMetadata, TaskParams,
};
use vault_rebalancer::journal::SubmissionJournal;
use vault_rebalancer::morpho::MorphoClient;
use vault_rebalancer::registration::{register_executor, Registration, DEFAULT_EXECUTOR_NAME};
use vault_rebalancer::strategy::{RebalancingStrategy, Strategy, TransferStrategy};
use vault_rebalancer::tokens;
use vault_rebalancer::wallet::{SecureWallet, TransactionSimulator};
use vault_rebalancer::{Config, Credentials, Error, Poller, Result, TaskSubmitter};

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Keeps automation sub-accounts in the best-yield Morpho vault")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyKind {
    /// Move funds to the highest net APY vault
    Rebalance,
    /// Recurring ERC-20 transfer
    Transfer,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll for tasks until Ctrl-C
    Run {
        /// Evaluate and prepare executions without signing or submitting
        #[arg(long)]
        dry_run: bool,

        #[arg(short, long, value_enum, default_value = "rebalance")]
        strategy: StrategyKind,
    },

    /// Run a single polling cycle and print its report
    Once {
        #[arg(long)]
        dry_run: bool,

        #[arg(short, long, value_enum, default_value = "rebalance")]
        strategy: StrategyKind,
    },

    /// Evaluate a strategy for one sub-account without touching the registry
    Evaluate {
        /// Sub-account address
        #[arg(long)]
        subaccount: Address,

        /// Base token (rebalance) or transferred token (transfer)
        #[arg(long)]
        token: Address,

        /// Chain id (defaults to the RPC's chain)
        #[arg(long)]
        chain_id: Option<u64>,

        /// Restrict candidates to these vaults (repeatable)
        #[arg(long = "vault")]
        vaults: Vec<Address>,

        /// Transfer receiver
        #[arg(long)]
        receiver: Option<Address>,

        /// Transfer amount in base units
        #[arg(long)]
        amount: Option<U256>,

        /// Transfer schedule, as configured on the subscription
        #[arg(long)]
        every: Option<String>,

        #[arg(short, long, value_enum, default_value = "rebalance")]
        strategy: StrategyKind,
    },

    /// Register this executor with the console and the kernel, printing the
    /// registry id to set as EXECUTOR_REGISTRY_ID
    Register {
        /// Console client id (defaults to $EXECUTOR_CLIENT_ID)
        #[arg(long)]
        client_id: Option<String>,

        #[arg(long, default_value = DEFAULT_EXECUTOR_NAME)]
        name: String,

        #[arg(long, default_value = "")]
        logo: String,

        /// Contract executions may call, e.g. an allowed vault (repeatable)
        #[arg(long = "hop")]
        hops: Vec<Address>,

        /// Token users fund the automation with (repeatable, defaults to USDC)
        #[arg(long = "input-token")]
        input_tokens: Vec<Address>,

        /// Chain id (defaults to the RPC's chain)
        #[arg(long)]
        chain_id: Option<u64>,

        /// Default task interval
        #[arg(long, default_value = "120s")]
        every: String,

        /// How long a scheduled execution stays valid
        #[arg(long, default_value = "120s")]
        ttl: String,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    let (plain, json) = if cli.json_logs {
        (None, Some(fmt::layer().json()))
    } else {
        (Some(fmt::layer()), None)
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { dry_run, strategy } => run(config, strategy, dry_run).await,
        Commands::Once { dry_run, strategy } => once(config, strategy, dry_run).await,
        Commands::Evaluate {
            subaccount,
            token,
            chain_id,
            vaults,
            receiver,
            amount,
            every,
            strategy,
        } => {
            let metadata = SubscriptionMetadata {
                base_token: Some(token),
                token: Some(token),
                preferred_vaults: (!vaults.is_empty()).then_some(vaults),
                receiver,
                transfer_amount: amount,
                every,
                ..Default::default()
            };
            evaluate(config, strategy, subaccount, chain_id, metadata).await
        }
        Commands::Register {
            client_id,
            name,
            logo,
            hops,
            input_tokens,
            chain_id,
            every,
            ttl,
        } => {
            let client_id = match client_id {
                Some(id) => id,
                None => std::env::var(env_vars::EXECUTOR_CLIENT_ID).map_err(|_| {
                    Error::Config(format!(
                        "--client-id or {} is required",
                        env_vars::EXECUTOR_CLIENT_ID
                    ))
                })?,
            };
            let listing = ExecutorListing {
                name,
                logo,
                ..Default::default()
            };
            let kernel = KernelExecutorConfig {
                default_every: every,
                execution_ttl: ttl,
                ..Default::default()
            };
            register(config, client_id, listing, kernel, hops, input_tokens, chain_id).await
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Remote clients shared by every command
struct Clients {
    console: Arc<ConsoleClient>,
    chain: Arc<RpcChainReader>,
    vaults: Arc<MorphoClient>,
}

impl Clients {
    fn connect(config: &Config, console_api_key: SecretString) -> Result<Self> {
        Ok(Self {
            console: Arc::new(ConsoleClient::new(
                &config.endpoints.console_base_url,
                console_api_key,
            )?),
            chain: Arc::new(RpcChainReader::new(&config.endpoints.rpc_url)?),
            vaults: Arc::new(MorphoClient::new(&config.endpoints.morpho_graphql_url)?),
        })
    }

    fn strategy(&self, kind: StrategyKind, config: &Config) -> Arc<dyn Strategy> {
        match kind {
            StrategyKind::Rebalance => Arc::new(
                RebalancingStrategy::new(
                    self.vaults.clone(),
                    self.chain.clone(),
                    self.console.clone(),
                )
                .with_slippage(config.slippage_percent),
            ),
            StrategyKind::Transfer => Arc::new(TransferStrategy::new()),
        }
    }
}

async fn build_poller(config: &Config, kind: StrategyKind, dry_run: bool) -> Result<Poller> {
    config.validate()?;
    let credentials = Credentials::from_env()?;
    let wallet = Arc::new(SecureWallet::from_secret(&credentials.executor_key)?);
    let clients = Clients::connect(config, credentials.console_api_key.clone())?;

    let executor_chain_id = clients.chain.chain_id().await?;
    let journal = match &config.journal_path {
        Some(path) => SubmissionJournal::open(path)?,
        None => SubmissionJournal::in_memory(),
    };

    tracing::info!(
        executor = %wallet.address(),
        registry_id = %config.registry_id,
        chain_id = executor_chain_id,
        strategy = ?kind,
        dry_run,
        "Starting executor"
    );

    let mut submitter = TaskSubmitter::new(
        clients.console.clone(),
        wallet,
        Arc::new(journal),
        config.registry_id.clone(),
        executor_chain_id,
    )
    .with_contracts(config.contracts)
    .with_monitor_policy(config.workflow.poll_policy());
    if config.simulate_before_submit {
        submitter = submitter.with_simulator(TransactionSimulator::new(&config.endpoints.rpc_url)?);
    }

    Ok(Poller::new(
        clients.console.clone(),
        clients.strategy(kind, config),
        Arc::new(submitter),
        config.registry_id.clone(),
    )
    .with_page(config.polling.page_offset, config.polling.page_limit)
    .with_dry_run(dry_run))
}

async fn run(config: Config, kind: StrategyKind, dry_run: bool) -> Result<()> {
    let poller = Arc::new(build_poller(&config, kind, dry_run).await?);
    let handle = poller.clone().spawn(config.polling.interval());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested, finishing current cycle");
    handle.cancel();
    let cycles = handle.join().await?;
    tracing::info!(cycles, "Executor stopped");
    Ok(())
}

async fn once(config: Config, kind: StrategyKind, dry_run: bool) -> Result<()> {
    let poller = build_poller(&config, kind, dry_run).await?;
    let report = poller.run_cycle().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.fetch_failed {
        return Err(Error::Console("Task fetch failed".to_string()));
    }
    Ok(())
}

async fn evaluate(
    config: Config,
    kind: StrategyKind,
    subaccount: Address,
    chain_id: Option<u64>,
    metadata: SubscriptionMetadata,
) -> Result<()> {
    let clients = Clients::connect(&config, Credentials::console_api_key_from_env()?)?;
    let chain_id = match chain_id {
        Some(id) => id,
        None => clients.chain.chain_id().await?,
    };

    let params = TaskParams {
        sub_account_address: subaccount,
        chain_id,
        subscription: Subscription {
            id: "cli".to_string(),
            metadata,
        },
    };
    let result = clients.strategy(kind, &config).evaluate(&params).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn register(
    config: Config,
    client_id: String,
    listing: ExecutorListing,
    kernel: KernelExecutorConfig,
    hops: Vec<Address>,
    input_tokens: Vec<Address>,
    chain_id: Option<u64>,
) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let wallet = SecureWallet::from_secret(&credentials.executor_key)?;
    let clients = Clients::connect(&config, credentials.console_api_key)?;
    let chain_id = match chain_id {
        Some(id) => id,
        None => clients.chain.chain_id().await?,
    };

    let input_tokens = if input_tokens.is_empty() {
        vec![tokens::usdc(chain_id).ok_or_else(|| {
            Error::Config(format!(
                "No default input token on chain {}, pass --input-token",
                chain_id
            ))
        })?]
    } else {
        input_tokens
    };

    tracing::info!(
        executor = %wallet.address(),
        chain_id,
        client_id = %client_id,
        "Registering executor"
    );
    let registration = Registration {
        chain_id,
        console: ConsoleExecutorConfig::for_executor(
            client_id,
            wallet.address(),
            &hops,
            input_tokens,
        ),
        listing,
        kernel,
    };
    let details = register_executor(clients.console.as_ref(), &wallet, registration).await?;
    println!("{}", serde_json::to_string_pretty(&details)?);
    tracing::info!(
        registry_id = %details.id,
        "Set {} to this id to poll its tasks",
        env_vars::EXECUTOR_REGISTRY_ID
    );
    Ok(())
}
