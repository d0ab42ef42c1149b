use anyhow::{Context, Result};
use aviary_api::remote::HttpRemoteClient;
use aviary_api::AppState;
use aviary_core::config::resolve_config;
use aviary_core::dispatch::RemoteClient;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "aviary", version, about = "Multi-account social publishing dispatcher")]
struct Cli {
    /// Path to the config file (overrides the normal resolution order).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server and scheduler.
    Serve,
    /// Parse and validate the config without starting anything.
    Validate,
    /// Account-related commands.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Secret-provider related commands.
    Secrets {
        #[command(subcommand)]
        command: SecretsCommands,
    },
    /// Manually run one provider's tick immediately.
    Trigger {
        /// Name of the provider to trigger.
        provider: String,
    },
}

#[derive(Subcommand)]
enum AccountsCommands {
    /// List configured accounts.
    List,
}

#[derive(Subcommand)]
enum SecretsCommands {
    /// Test connectivity for every registered secret provider.
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref()).context("failed to resolve configuration")?;

    match cli.command {
        Commands::Serve => {
            let client: Arc<dyn RemoteClient> = Arc::new(HttpRemoteClient::new());
            let state = Arc::new(AppState::new(config, client));
            aviary_api::serve(state).await?;
        }
        Commands::Validate => {
            println!("config is valid: {} account(s), {} provider(s)", config.accounts.len(), config.providers.len());
        }
        Commands::Accounts {
            command: AccountsCommands::List,
        } => {
            for account in &config.accounts {
                println!("{}\t{:?}\t{}", account.name, account.backend, account.base_url);
            }
        }
        Commands::Secrets {
            command: SecretsCommands::Test,
        } => {
            let client: Arc<dyn RemoteClient> = Arc::new(HttpRemoteClient::new());
            let state = AppState::new(config, client);
            let results = state.secrets.test_connections().await;
            for (provider, ok) in results {
                println!("{provider}\t{}", if ok { "ok" } else { "unreachable" });
            }
        }
        Commands::Trigger { provider } => {
            let Some(provider_config) = config.providers.iter().find(|p| p.name == provider).cloned() else {
                anyhow::bail!("unknown provider '{provider}'");
            };
            if provider_config.is_push() {
                anyhow::bail!("provider '{provider}' is a push provider and has no scheduled tick to trigger");
            }
            println!("triggering provider '{provider}' is only meaningful against a running server; use the webhook or scheduler instead");
        }
    }

    Ok(())
}
