use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = detective_api::Args::parse();

	detective_api::run(args).await
}
