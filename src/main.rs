use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use reminder_bot::error::{ReminderBotError, Result};

#[derive(Parser, Debug)]
#[command(name = "reminder-bot")]
#[command(about = "Chat with a running reminder-botd from the terminal")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:7878")]
    daemon: String,

    #[arg(long, default_value_t = 1)]
    user_id: i64,

    #[arg(long, env = "REMINDER_BOT_TOKEN", default_value = "", hide_env_values = true)]
    token: String,
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    user_id: i64,
    text: &'a str,
}

#[derive(Deserialize)]
struct MessageResponse {
    reply: String,
}

async fn send(client: &reqwest::Client, cli: &Cli, text: &str) -> Result<String> {
    let url = format!("{}/messages", cli.daemon.trim_end_matches('/'));
    let response = client
        .post(url)
        .bearer_auth(&cli.token)
        .json(&MessageRequest {
            user_id: cli.user_id,
            text,
        })
        .send()
        .await
        .map_err(|e| ReminderBotError::Http(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ReminderBotError::Http(format!("daemon returned {status}")));
    }
    let body: MessageResponse = response
        .json()
        .await
        .map_err(|e| ReminderBotError::Http(e.to_string()))?;
    Ok(body.reply)
}

#[tokio::main]
async fn main() -> Result<()> {
    reminder_bot::logging::init_tracing("reminder_bot");
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout
        .write_all(b"Connected. Try /start, or ctrl-d to quit.\n> ")
        .await
        .map_err(|e| ReminderBotError::Runtime(e.to_string()))?;
    stdout
        .flush()
        .await
        .map_err(|e| ReminderBotError::Runtime(e.to_string()))?;

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ReminderBotError::Runtime(e.to_string()))?
    {
        let text = line.trim();
        if !text.is_empty() {
            let reply = match send(&client, &cli, text).await {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::warn!(error = %err, "Message not delivered to daemon");
                    format!("(error: {err})")
                }
            };
            stdout
                .write_all(format!("{reply}\n").as_bytes())
                .await
                .map_err(|e| ReminderBotError::Runtime(e.to_string()))?;
        }
        stdout
            .write_all(b"> ")
            .await
            .map_err(|e| ReminderBotError::Runtime(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| ReminderBotError::Runtime(e.to_string()))?;
    }
    Ok(())
}
