//! Launchdeck CLI - manage dashboard items and tasks from the terminal.
//!
//! Uses the same stores (launchdeck-core) and server bootstrap
//! (launchdeck-server) as the HTTP backend.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use launchdeck_cli::commands;
use launchdeck_core::config::{default_db_path, Backend, FirebaseConfig, LaunchdeckConfig};

/// Launchdeck CLI - workspace launcher and task tracker
#[derive(Parser)]
#[command(name = "launchdeck", version, about = "Launchdeck CLI - workspace launcher and task tracker")]
pub struct Cli {
    /// Storage backend: memory, sqlite or firebase
    #[arg(long, env = "LAUNCHDECK_BACKEND", default_value = "sqlite", global = true)]
    backend: String,

    /// Path to the SQLite database file (default: ~/.launchdeck/launchdeck.db)
    #[arg(long, env = "LAUNCHDECK_DB_PATH", global = true)]
    db: Option<PathBuf>,

    /// Firebase Realtime Database URL
    #[arg(long, env = "LAUNCHDECK_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Firebase auth token
    #[arg(long, env = "LAUNCHDECK_AUTH_TOKEN", hide_env_values = true, global = true)]
    auth_token: Option<String>,

    /// How often the Firebase backend polls for changes
    #[arg(long, env = "LAUNCHDECK_POLL_INTERVAL_MS", default_value_t = 2000, global = true)]
    poll_interval_ms: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn launchdeck_config(&self) -> Result<LaunchdeckConfig, String> {
        let backend = match self.backend.as_str() {
            "memory" => Backend::Memory,
            "sqlite" => Backend::Sqlite {
                path: self.db.clone().unwrap_or_else(default_db_path),
            },
            "firebase" => {
                let database_url = self
                    .database_url
                    .clone()
                    .ok_or("--database-url is required for the firebase backend")?;
                Backend::Firebase(FirebaseConfig {
                    database_url,
                    auth_token: self.auth_token.clone(),
                    poll_interval: Duration::from_millis(self.poll_interval_ms),
                })
            }
            other => {
                return Err(format!(
                    "Unknown backend '{}' (expected memory, sqlite or firebase)",
                    other
                ))
            }
        };
        Ok(LaunchdeckConfig { backend })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the launchdeck HTTP backend server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3210)]
        port: u16,
    },

    /// Manage dashboard items
    Workspace {
        #[command(subcommand)]
        action: WorkspaceAction,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Send a raw JSON-RPC request
    Rpc {
        /// JSON-RPC method name (e.g. "tasks.list")
        #[arg(long)]
        method: String,
        /// JSON-RPC params as a JSON string
        #[arg(long, default_value = "{}")]
        params: String,
    },
}

#[derive(Subcommand)]
enum WorkspaceAction {
    /// List dashboard items
    List {
        /// Only items without a parent
        #[arg(long)]
        top_level: bool,
    },
    /// Create a dashboard item
    Create {
        #[arg(long)]
        title: String,
        /// external, embed or nested
        #[arg(long = "type", default_value = "external")]
        item_type: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        color: Option<String>,
        /// ID of the nested item to place this under
        #[arg(long)]
        parent: Option<String>,
    },
    /// Update fields of a dashboard item
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "type")]
        item_type: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        color: Option<String>,
        /// New parent ID, or "none" to move to the top level
        #[arg(long)]
        parent: Option<String>,
    },
    /// Delete a dashboard item
    Delete {
        id: String,
        /// What happens to children: orphan, reject or cascade
        #[arg(long, default_value = "orphan")]
        policy: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// List the children of a nested item
    Children { id: String },
    /// Print the item hierarchy
    Tree,
    /// Show where activating an item leads
    Open { id: String },
}

#[derive(Subcommand)]
enum TaskAction {
    /// List tasks
    List {
        /// all, todo, in-progress or completed
        #[arg(long)]
        status: Option<String>,
    },
    /// Create a new task
    Create {
        #[arg(long)]
        title: String,
        /// Estimated completion time (RFC 3339)
        #[arg(long)]
        due: String,
        /// low, medium or high
        #[arg(long, default_value = "medium")]
        priority: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Update task fields
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },
    /// Set task progress (0-100)
    Progress { id: String, value: u8 },
    /// Advance task progress by a step
    Advance {
        id: String,
        #[arg(long)]
        step: Option<u8>,
    },
    /// Log time spent on a task
    LogTime {
        id: String,
        #[arg(long)]
        minutes: u32,
    },
    /// Delete a task
    Delete {
        id: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Per-status counts and total time
    Summary,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "launchdeck_core=warn,launchdeck_server=info,launchdeck_cli=info".into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", console::style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = cli.launchdeck_config()?;
    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help().ok();
        println!();
        return Ok(());
    };

    match command {
        Commands::Server { host, port } => commands::server::run(host, port, config).await,

        Commands::Workspace { action } => {
            let state = commands::init_state(&config).await?;
            let result = match action {
                WorkspaceAction::List { top_level } => {
                    commands::workspace::list(&state, top_level).await
                }
                WorkspaceAction::Create {
                    title,
                    item_type,
                    url,
                    description,
                    icon,
                    color,
                    parent,
                } => {
                    let args = commands::workspace::CreateArgs {
                        title,
                        item_type,
                        url,
                        description,
                        icon,
                        color,
                        parent,
                    };
                    commands::workspace::create(&state, args).await
                }
                WorkspaceAction::Update {
                    id,
                    title,
                    item_type,
                    url,
                    description,
                    icon,
                    color,
                    parent,
                } => {
                    let args = commands::workspace::UpdateArgs {
                        title,
                        item_type,
                        url,
                        description,
                        icon,
                        color,
                        parent,
                    };
                    commands::workspace::update(&state, &id, args).await
                }
                WorkspaceAction::Delete { id, policy, yes } => {
                    commands::workspace::delete(&state, &id, &policy, yes).await
                }
                WorkspaceAction::Children { id } => {
                    commands::workspace::children(&state, &id).await
                }
                WorkspaceAction::Tree => commands::workspace::tree(&state).await,
                WorkspaceAction::Open { id } => commands::workspace::open(&state, &id).await,
            };
            state.stop();
            result.map(|_| ())
        }

        Commands::Task { action } => {
            let state = commands::init_state(&config).await?;
            let result = match action {
                TaskAction::List { status } => {
                    commands::task::list(&state, status.as_deref()).await
                }
                TaskAction::Create {
                    title,
                    due,
                    priority,
                    description,
                } => {
                    commands::task::create(&state, &title, &due, &priority, description.as_deref())
                        .await
                }
                TaskAction::Update {
                    id,
                    title,
                    description,
                    due,
                    priority,
                } => {
                    let args = commands::task::UpdateArgs {
                        title,
                        description,
                        due,
                        priority,
                    };
                    commands::task::update(&state, &id, args).await
                }
                TaskAction::Progress { id, value } => {
                    commands::task::progress(&state, &id, value).await
                }
                TaskAction::Advance { id, step } => {
                    commands::task::advance(&state, &id, step).await
                }
                TaskAction::LogTime { id, minutes } => {
                    commands::task::log_time(&state, &id, minutes).await
                }
                TaskAction::Delete { id, yes } => commands::task::delete(&state, &id, yes).await,
                TaskAction::Summary => commands::task::summary(&state).await,
            };
            state.stop();
            result.map(|_| ())
        }

        Commands::Rpc { method, params } => {
            let state = commands::init_state(&config).await?;
            let result = commands::rpc::call(&state, &method, &params).await;
            state.stop();
            result.map(|_| ())
        }
    }
}
