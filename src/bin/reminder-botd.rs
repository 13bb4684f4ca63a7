use clap::Parser;
use reminder_bot::config::Config;
use reminder_bot::daemon;
use reminder_bot::error::Result;

#[derive(Parser, Debug)]
#[command(name = "reminder-botd")]
#[command(about = "Reminder bot daemon")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 7878)]
    port: u16,

    #[arg(long, default_value_t = reminder_bot::runtime_paths::default_db_path())]
    db: String,

    #[arg(long, default_value_t = reminder_bot::runtime_paths::default_config_path())]
    config: String,

    /// Token required by the HTTP API.
    #[arg(long, env = "REMINDER_BOT_TOKEN", default_value = "", hide_env_values = true)]
    token: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    reminder_bot::logging::init_tracing("reminder_botd");
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config, &cli.db)?;

    daemon::run_with_shutdown(config, &cli.db, &cli.host, cli.port, &cli.token, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for ctrl-c");
            futures::future::pending::<()>().await;
        }
    })
    .await
}
