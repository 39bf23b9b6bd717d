//! `lle` binary: account, children, sessions, analytics and the voice agent.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lle_agent::AgentViewOptions;
use lle_api::ApiClient;
use lle_cli::{agent, commands, config};
use lle_store::LocalStore;
use lle_types::{ChildProfile, ChildUpdate, RegisterRequest};
use lle_voice::HandoffConnector;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "lle")]
#[command(about = "Speech-practice client: manage children and talk to the voice agent")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "LLE_CONFIG_PATH", default_value = "lle.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the credentials locally
    Login {
        username: String,
        #[arg(long, env = "LLE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create a parent account with a first child, then log in
    Register {
        username: String,
        email: String,
        #[arg(long, env = "LLE_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        child_name: String,
        #[arg(long)]
        child_age: u32,
        /// Topics or instructions for the agent
        #[arg(long)]
        prompt: Option<String>,
    },

    /// Forget the stored credentials
    Logout,

    /// Manage child profiles
    Children {
        #[command(subcommand)]
        action: ChildrenCommand,
    },

    /// Inspect sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },

    /// Show per-session analytics
    Analytics {
        /// Defaults to the selected child
        #[arg(long)]
        child: Option<Uuid>,
    },

    /// Start a voice-agent session for the selected child
    Agent {
        /// Audio only, no avatar video
        #[arg(long)]
        no_video: bool,
        #[arg(long)]
        no_audio: bool,
        /// Leave the backend session open on exit
        #[arg(long)]
        keep_session: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ChildrenCommand {
    List,
    Add {
        name: String,
        age: u32,
        #[arg(long)]
        prompt: Option<String>,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        prompt: Option<String>,
    },
    Remove {
        id: Uuid,
    },
    /// Make a child the one sessions and analytics default to
    Select {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
enum SessionsCommand {
    List {
        /// Defaults to the selected child
        #[arg(long)]
        child: Option<Uuid>,
    },
    /// End sessions left open by an earlier run
    EndStale,
}

fn profile(name: String, age: u32, prompt: Option<String>) -> ChildProfile {
    let profile = ChildProfile::new(name, age);
    match prompt {
        Some(prompt) => profile.with_prompt(prompt),
        None => profile,
    }
}

/// Waits for Ctrl+C. If the handler cannot be installed, waits forever.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

/// Forwards each line typed on stdin as a retry request.
fn spawn_retry_reader() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            if line.is_err() || tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(Some(&cli.config)).context("failed to load configuration")?;
    lle_cli::init_logging(&config.logging);
    tracing::debug!(path = %cli.config, "resolved configuration");

    let store = LocalStore::open(&config.store.path, config.store.runtime_settings())
        .with_context(|| format!("failed to open local store at {}", config.store.path))?;
    let api = ApiClient::new(&config.api.to_api_config(), store).context("invalid API settings")?;
    let mut out = std::io::stdout();

    match cli.command {
        Command::Login { username, password } => {
            commands::login(&api, &username, &password, &mut out).await?;
        }
        Command::Register {
            username,
            email,
            password,
            child_name,
            child_age,
            prompt,
        } => {
            let request = RegisterRequest {
                username,
                email,
                password,
                child_profile: profile(child_name, child_age, prompt),
            };
            commands::register(&api, &request, &mut out).await?;
        }
        Command::Logout => commands::logout(&api, &mut out)?,
        Command::Children { action } => match action {
            ChildrenCommand::List => commands::list_children(&api, &mut out).await?,
            ChildrenCommand::Add { name, age, prompt } => {
                commands::add_child(&api, &profile(name, age, prompt), &mut out).await?;
            }
            ChildrenCommand::Update {
                id,
                name,
                age,
                prompt,
            } => {
                let update = ChildUpdate {
                    name,
                    age,
                    conversation_prompt: prompt,
                    ..ChildUpdate::default()
                };
                commands::update_child(&api, id, &update, &mut out).await?;
            }
            ChildrenCommand::Remove { id } => commands::remove_child(&api, id, &mut out).await?,
            ChildrenCommand::Select { id } => commands::select_child(&api, id, &mut out).await?,
        },
        Command::Sessions { action } => match action {
            SessionsCommand::List { child } => {
                commands::list_sessions(&api, child, &mut out).await?;
            }
            SessionsCommand::EndStale => {
                commands::end_stale_sessions(&api, &mut out).await?;
            }
        },
        Command::Analytics { child } => commands::analytics(&api, child, &mut out).await?,
        Command::Agent {
            no_video,
            no_audio,
            keep_session,
        } => {
            let options = AgentViewOptions {
                audio: !no_audio,
                video: !no_video,
                end_session_on_exit: !keep_session,
            };
            agent::run_agent(
                api,
                config.media,
                HandoffConnector::stdout(),
                options,
                spawn_retry_reader(),
                ctrl_c(),
                &mut std::io::stderr(),
            )
            .await?;
        }
    }
    Ok(())
}
