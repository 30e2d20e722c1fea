use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

const API_PREFIX: &str = "/terraform/v1/mgmt";

#[derive(Parser)]
#[command(name = "mgmt-cli")]
#[command(about = "Query the management API of a running gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:2022")]
    url: String,

    /// Bearer token for protected endpoints.
    #[arg(short, long, env = "MGMT_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the gateway version
    Versions,
    /// Show the latest release metadata
    Releases,
    /// Show worker lifecycle and container status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
    }

    let request = match cli.command {
        Commands::Versions => client.get(format!("{}{}/versions", base, API_PREFIX)),
        Commands::Releases => client.get(format!("{}{}/releases", base, API_PREFIX)),
        Commands::Status => client.post(format!("{}{}/status", base, API_PREFIX)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = match res.json().await {
        Ok(body) => body,
        Err(_) => {
            eprintln!("Error: management API returned status {} with a non-JSON body", status);
            std::process::exit(1);
        }
    };

    if !status.is_success() {
        let message = body["data"]["message"].as_str().unwrap_or("unknown error");
        eprintln!("Error: {} (code {}): {}", status, body["code"], message);
        std::process::exit(1);
    }

    println!("{}", serde_json::to_string_pretty(&body["data"])?);
    Ok(())
}
