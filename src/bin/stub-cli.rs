use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "stub-cli")]
#[command(about = "Management CLI for the API stub server", long_about = None)]
struct Cli {
    /// Base URL of the management API, prefix included.
    #[arg(short, long, default_value = "http://localhost:8080/_admin")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server status
    Status,
    /// List configured routes
    Apis,
    /// List stored responses
    List {
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        method: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show one stored response
    Show { id: u64 },
    /// Delete stored responses
    Delete {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// List the history of a response
    Histories { id: u64 },
    /// Restore a response from one of its history entries
    Restore { id: u64, sub_id: u64 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/status", base)).send().await?,
        Commands::Apis => client.get(format!("{}/apis", base)).send().await?,
        Commands::List {
            path,
            method,
            description,
        } => {
            let filter: Vec<(&str, String)> = [
                ("path", path),
                ("method", method),
                ("description", description),
            ]
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();
            client
                .get(format!("{}/responses", base))
                .query(&filter)
                .send()
                .await?
        }
        Commands::Show { id } => {
            client
                .get(format!("{}/responses/{}", base, id))
                .send()
                .await?
        }
        Commands::Delete { ids } => {
            client
                .delete(format!("{}/responses", base))
                .json(&json!({ "ids": ids }))
                .send()
                .await?
        }
        Commands::Histories { id } => {
            client
                .get(format!("{}/responses/{}/histories", base, id))
                .send()
                .await?
        }
        Commands::Restore { id, sub_id } => {
            client
                .post(format!(
                    "{}/responses/{}/histories/{}/restore",
                    base, id, sub_id
                ))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
