use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oracle_account::{create_account, AccountInterface};
use oracle_config::{scenario_space, ConfigLoader, OracleConfig};
use oracle_core::{Devnet, DevnetSettings, FillReport, OracleError};
use oracle_scenario::AmountConstants;
use oracle_types::{Address, Scenario};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fill-oracle")]
#[command(about = "Fill-order test oracle", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/devnet.toml")]
	config: PathBuf,

	/// Overrides `oracle.log_level` from the configuration file
	#[arg(long, env = "ORACLE_LOG_LEVEL")]
	log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
	/// Run the configured scenarios, each on a fresh devnet
	Run {
		/// Stop after this many scenarios
		#[arg(long)]
		limit: Option<usize>,
	},
	/// Validate the configuration file
	Validate,
}

/// Tally of a run.
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
	passed: usize,
	misconfigured: usize,
	failed: usize,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
	let cli = Cli::parse();

	let config = load_config(&cli.config).await?;
	setup_tracing(cli.log_level.as_deref().unwrap_or(&config.oracle.log_level))?;

	match cli.command {
		Some(Commands::Run { limit }) => run(config, limit).await,
		None => run(config, None).await,
		Some(Commands::Validate) => validate_config(&cli.config, &config),
	}
}

async fn load_config(path: &Path) -> Result<OracleConfig> {
	ConfigLoader::new()
		.with_file(path)
		.load()
		.await
		.with_context(|| format!("Failed to load configuration from {:?}", path))
}

async fn run(config: OracleConfig, limit: Option<usize>) -> Result<ExitCode> {
	info!("Starting {}", config.oracle.name);
	let summary = run_scenarios(&config, limit).await?;

	println!(
		"{} passed, {} misconfigured, {} failed",
		summary.passed, summary.misconfigured, summary.failed
	);
	if summary.failed > 0 {
		return Ok(ExitCode::FAILURE);
	}
	Ok(ExitCode::SUCCESS)
}

async fn run_scenarios(config: &OracleConfig, limit: Option<usize>) -> Result<Summary> {
	let space = scenario_space(config).context("Failed to build scenario space")?;
	let maker: Arc<dyn AccountInterface> = Arc::from(
		create_account(&config.accounts.maker).context("Failed to load maker account")?,
	);
	let taker = create_account(&config.accounts.taker)
		.context("Failed to load taker account")?
		.address();
	let settings = devnet_settings(config)?;

	let total = limit.map_or(space.len(), |limit| limit.min(space.len()));
	info!(
		"Running {} of {} scenarios over {} varied axes",
		total,
		space.len(),
		space.varied_axes().count()
	);

	let mut summary = Summary::default();
	for (index, scenario) in space.iter().take(total).enumerate() {
		match run_one(&settings, maker.clone(), taker, &scenario).await {
			Ok(report) => {
				summary.passed += 1;
				println!("pass          #{} {} -> {:?}", index, scenario, report.outcome);
			}
			Err(OracleError::Configuration(reason)) => {
				summary.misconfigured += 1;
				warn!("Scenario {} is misconfigured: {}", index, reason);
				println!("misconfigured #{} {}: {}", index, scenario, reason);
			}
			Err(e) => {
				summary.failed += 1;
				error!("Scenario {} failed: {}", index, e);
				println!("fail          #{} {}: {}", index, scenario, e);
			}
		}
	}
	Ok(summary)
}

async fn run_one(
	settings: &DevnetSettings,
	maker: Arc<dyn AccountInterface>,
	taker: Address,
	scenario: &Scenario,
) -> Result<FillReport, OracleError> {
	let devnet = Devnet::start(settings, maker, taker).await?;
	devnet.oracle()?.run(scenario).await
}

fn devnet_settings(config: &OracleConfig) -> Result<DevnetSettings> {
	let timestamp = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.context("System clock is before the epoch")?
		.as_secs();
	Ok(DevnetSettings {
		domain: config.exchange.domain(config.oracle.chain_id),
		erc20_proxy: config.exchange.erc20_proxy,
		erc721_proxy: config.exchange.erc721_proxy,
		fee_recipient: config.accounts.fee_recipient,
		other_taker: config.accounts.other_taker,
		token_holders: config.accounts.token_holders.clone(),
		amounts: AmountConstants::from(&config.amounts),
		timestamp,
	})
}

fn validate_config(path: &Path, config: &OracleConfig) -> Result<ExitCode> {
	info!("Validating configuration file: {:?}", path);

	let space = scenario_space(config).context("Failed to build scenario space")?;
	let maker = create_account(&config.accounts.maker).context("Failed to load maker account")?;
	let taker = create_account(&config.accounts.taker).context("Failed to load taker account")?;

	info!("Configuration is valid");
	info!("Oracle name: {}", config.oracle.name);
	info!(
		"Exchange: {} v{} at {} on chain {}",
		config.exchange.name,
		config.exchange.version,
		config.exchange.verifying_contract,
		config.oracle.chain_id
	);
	info!("Maker: {}", maker.address());
	info!("Taker: {}", taker.address());
	info!("Scenarios: {}", space.len());
	for axis in space.varied_axes() {
		info!("  Varied axis: {}", axis);
	}

	Ok(ExitCode::SUCCESS)
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	const DEVNET_CONFIG: &str = include_str!("../../../config/devnet.toml");

	#[tokio::test]
	async fn test_devnet_config_runs_clean() {
		let config = ConfigLoader::new().parse(DEVNET_CONFIG).unwrap();
		let summary = run_scenarios(&config, None).await.unwrap();
		assert_eq!(summary.failed, 0, "{:?}", summary);
		assert_eq!(
			summary.passed + summary.misconfigured,
			scenario_space(&config).unwrap().len()
		);
		assert!(summary.passed > 0);
		assert!(summary.misconfigured > 0);
	}

	#[tokio::test]
	async fn test_limit_bounds_the_run() {
		let config = ConfigLoader::new().parse(DEVNET_CONFIG).unwrap();
		let summary = run_scenarios(&config, Some(3)).await.unwrap();
		assert_eq!(
			summary.passed + summary.misconfigured + summary.failed,
			3
		);
	}

	#[test]
	fn test_settings_follow_config() {
		let config = ConfigLoader::new().parse(DEVNET_CONFIG).unwrap();
		let settings = devnet_settings(&config).unwrap();
		assert_eq!(settings.domain.chain_id, 1337);
		assert_eq!(settings.token_holders.len(), 1);
		assert_eq!(settings.amounts, AmountConstants::default());
	}
}
