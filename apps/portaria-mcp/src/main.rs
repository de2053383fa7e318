use clap::Parser;

use portaria_mcp::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	portaria_mcp::run(args).await
}
