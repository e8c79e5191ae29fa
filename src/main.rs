//! Collector entry point.

use loki_core::cli::{self, Cli};
use loki_core::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
