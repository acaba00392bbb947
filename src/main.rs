use options_harvest::app::{run, Command};
use options_harvest::config::Config;
use options_harvest::error::Result;
use options_harvest::logging::init;

#[tokio::main]
async fn main() -> Result<()> {
    init();

    let command: Command = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "snapshots".to_string())
        .parse()?;

    let config = Config::from_env()?;

    run(config, command).await
}
