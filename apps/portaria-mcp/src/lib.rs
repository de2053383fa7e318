pub mod server;

use std::{io, sync::Arc};

use clap::Parser;
use color_eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

use portaria_cli::ConfigArgs;
use portaria_config::{Config, Security};
use portaria_service::PortariaService;

#[derive(Debug, Parser)]
#[command(
	version = portaria_cli::VERSION,
	rename_all = "kebab",
	styles = portaria_cli::styles(),
)]
pub struct Args {
	#[command(flatten)]
	pub config: ConfigArgs,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum McpAuthState {
	Off,
	StaticKey { bearer_token: String },
}

pub async fn run(args: Args) -> Result<()> {
	let config = portaria_config::load(&args.config.config)?;

	init_tracing(&config);

	let auth_state = build_auth_state(&config.security)?;
	let bind_addr = config.service.mcp_bind.clone();
	let service = PortariaService::new(config)?;

	server::serve_mcp(&bind_addr, auth_state, Arc::new(service)).await
}

fn init_tracing(config: &Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn build_auth_state(security: &Security) -> Result<McpAuthState> {
	match security.auth_mode.trim() {
		"off" => Ok(McpAuthState::Off),
		"static_key" => {
			let token = security
				.bearer_token
				.as_deref()
				.map(str::trim)
				.filter(|token| !token.is_empty())
				.ok_or_else(|| {
					eyre::eyre!("security.bearer_token is required when auth_mode is static_key.")
				})?;

			Ok(McpAuthState::StaticKey { bearer_token: token.to_string() })
		},
		other => Err(eyre::eyre!(
			"security.auth_mode must be one of off or static_key for portaria-mcp, got {other}."
		)),
	}
}
