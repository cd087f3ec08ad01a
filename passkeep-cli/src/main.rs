mod prompt;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use passkeep_core::sync::{SyncClient, SyncEngine};
use passkeep_core::{get_default_config_path, ClientConfig, LocalStore, Record};
use prompt::Prompter;
use std::io::{self, StdinLock, Stdout};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

type Engine = SyncEngine<LocalStore, SyncClient>;

/// passkeep - a secrets manager that syncs between your devices
#[derive(Parser)]
#[command(name = "passkeep")]
#[command(about = "Secrets manager with server sync", long_about = None)]
struct Cli {
    /// Path to the client configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new user on the server
    Register {
        /// Login for the new account
        login: String,
    },

    /// Sign in to the server
    Login {
        /// Account login
        login: String,
    },

    /// Push local changes and pull everything from the server
    Sync,

    /// Add or replace an item in the local store
    Set {
        #[command(subcommand)]
        item: SetCommand,
    },

    /// Show an item from the local store
    Get {
        /// Item key (login, text/binary key or card number)
        key: String,
    },

    /// List every item in the local store
    List,
}

#[derive(Subcommand)]
enum SetCommand {
    /// Login/password pair, the password is prompted for
    Password { login: String },

    /// Free text under a key, the text is prompted for
    Text { key: String },

    /// Contents of a file under a key
    Binary { key: String, file: PathBuf },

    /// Payment card, every field is prompted for
    Card,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(get_default_config_path);
    let config = ClientConfig::load_or_default(&config_path)?;
    tracing::debug!(config = %config_path.display(), server = %config.server_url, "client configured");
    let store = LocalStore::new(config.state_path());
    let remote = SyncClient::from_config(&config)?;
    let engine = SyncEngine::new(store, remote);

    let result = run(&engine, cli.command).await;
    let closed = engine
        .cache()
        .close()
        .with_context(|| format!("failed to save {}", engine.cache().path().display()));

    result?;
    closed?;
    Ok(())
}

async fn run(engine: &Engine, command: Commands) -> Result<()> {
    match command {
        Commands::Register { login } => {
            let password = read_password("Choose a password: ")?;
            let confirm = read_password("Repeat the password: ")?;
            if *password != *confirm {
                bail!("passwords do not match");
            }
            engine.register_user(&login, &password).await?;
            println!("Registered and signed in as {:?}", login);
        }
        Commands::Login { login } => {
            let password = read_password("Password: ")?;
            engine.login_user(&login, &password).await?;
            println!("Signed in as {:?}", login);
        }
        Commands::Sync => {
            let report = engine.sync().await?;
            println!(
                "Pushed {} item(s), {} item(s) in the vault",
                report.pushed, report.pulled
            );
        }
        Commands::Set { item } => {
            let record = build_record(item)?;
            let id = record.id().to_string();
            engine.set_record(record)?;
            println!("Saved {:?}, run `passkeep sync` to upload it", id);
        }
        Commands::Get { key } => {
            let record = engine.get_record(&key)?;
            let export_dir = std::env::current_dir()?;
            record.reveal(&mut io::stdout(), &export_dir)?;
        }
        Commands::List => {
            let records = engine.list_records()?;
            if records.is_empty() {
                println!("No items yet");
            }
            for record in records {
                println!(
                    "{:<12} {}  {}",
                    record.kind().as_str(),
                    record.last_update_date().format("%Y-%m-%d %H:%M:%S"),
                    record.id()
                );
            }
        }
    }

    Ok(())
}

fn build_record(item: SetCommand) -> Result<Record> {
    let record = match item {
        SetCommand::Password { login } => {
            let password =
                read_password(&format!("Enter your password for login {:?}: ", login))?;
            Record::credential(login, password.as_str())?
        }
        SetCommand::Text { key } => {
            let text = prompter().read_text("text")?;
            Record::text(key, text)?
        }
        SetCommand::Binary { key, file } => {
            let payload =
                std::fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
            Record::binary(key, payload)?
        }
        SetCommand::Card => {
            let mut p = prompter();
            let number = p.read_token("card number")?;
            let month = p.read_month("expiration month")?;
            let day = p.read_day("expiration day")?;
            let code = p.read_number("security code", 1, 999)?;
            Record::payment_card(number, month, day, code)?
        }
    };
    Ok(record)
}

fn prompter() -> Prompter<StdinLock<'static>, Stdout> {
    Prompter::new(io::stdin().lock(), io::stdout())
}

fn read_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = Zeroizing::new(rpassword::prompt_password(prompt)?);
    if password.is_empty() {
        bail!("password should not be empty");
    }
    Ok(password)
}
