use anyhow::Result;
use clap::Parser;
use orderdesk::cli::Cli;

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run().await
}
