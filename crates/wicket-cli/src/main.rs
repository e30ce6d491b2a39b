//! Wicket device-flow proxy CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

use wicket_proxy::ProxyConfig;

mod commands;

#[derive(Parser)]
#[command(name = "wicket")]
#[command(about = "OAuth 2.0 device authorization grant proxy", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        /// Public base URL of the proxy, used for the verification and
        /// redirect URIs
        #[arg(long, default_value = "https://localhost:8080")]
        base_url: String,
        /// Upstream OAuth2 authorization endpoint
        #[arg(long, default_value = "https://localhost:4444/oauth2/auth")]
        authorization_endpoint: String,
        /// Upstream OAuth2 token endpoint
        #[arg(long, default_value = "https://localhost:4444/oauth2/token")]
        token_endpoint: String,
        /// Minimum seconds devices should wait between token polls
        #[arg(long, default_value_t = 5)]
        poll_interval: u64,
        /// Seconds until issued device and user codes expire
        #[arg(long, default_value_t = 300)]
        expires_in: u64,
        /// Seconds between sweeps of expired flow records
        #[arg(long, default_value_t = 600)]
        purge_interval: u64,
        /// Timeout in seconds for reading a request body
        #[arg(long, default_value_t = 5)]
        read_timeout: u64,
        /// Timeout in seconds for producing and writing a response
        #[arg(long, default_value_t = 10)]
        write_timeout: u64,
        /// Seconds to drain in-flight requests on shutdown
        #[arg(long, default_value_t = 15)]
        grace_timeout: u64,
        /// Skip TLS verification on the upstream token exchange
        /// (local development only)
        #[arg(long)]
        insecure_skip_verify: bool,
    },
    /// Secret generation utilities
    #[command(subcommand)]
    Secret(SecretCommands),
}

#[derive(Subcommand)]
enum SecretCommands {
    /// Mint a sample device/user code pair
    Codes,
    /// Mint a CSRF state token
    State,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            base_url,
            authorization_endpoint,
            token_endpoint,
            poll_interval,
            expires_in,
            purge_interval,
            read_timeout,
            write_timeout,
            grace_timeout,
            insecure_skip_verify,
        } => {
            let config = ProxyConfig {
                bind_addr: bind.parse()?,
                base_url,
                authorization_endpoint,
                token_endpoint,
                poll_interval_secs: poll_interval,
                expires_in_secs: expires_in,
                purge_interval_secs: purge_interval,
                read_timeout_secs: read_timeout,
                write_timeout_secs: write_timeout,
                grace_timeout_secs: grace_timeout,
                insecure_skip_verify,
            };
            commands::serve::run(config).await
        }
        Commands::Secret(secret_cmd) => match secret_cmd {
            SecretCommands::Codes => commands::secret::generate_codes(),
            SecretCommands::State => commands::secret::generate_state(),
        },
    }
}
