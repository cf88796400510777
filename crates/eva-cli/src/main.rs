//! Eva CLI — run desktop-automation workflows from the terminal.
//!
//! Reuses the same core (eva-core) and server bootstrap (eva-server) that
//! power the web frontend.

use std::time::Duration;

use clap::{Parser, Subcommand};

use eva_cli::commands;
use eva_server::ServerConfig;

/// Eva — step-by-step desktop automation driven by an external agent
#[derive(Parser)]
#[command(name = "eva", version, about = "Eva — step-by-step desktop automation")]
pub struct Cli {
    /// Path to the projects JSON file
    #[arg(long, env = "EVA_PROJECTS_FILE", default_value = "projects.json")]
    projects: String,

    /// Path to the prompt settings JSON file
    #[arg(long, env = "EVA_PROMPTS_FILE", default_value = "prompts.json")]
    prompts: String,

    /// Installation directory of the automation agent
    #[arg(long, env = "EVA_AGENT_DIR")]
    agent_dir: Option<String>,

    /// Seconds without agent output before an invocation is killed
    #[arg(long, env = "EVA_IDLE_TIMEOUT_SECS", default_value_t = 300)]
    idle_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Eva HTTP backend server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 5000)]
        port: u16,
        /// Path to static frontend directory
        #[arg(long)]
        static_dir: Option<String>,
    },

    /// Run a project's steps through the agent
    Run {
        /// Name of a project in the projects file
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        project: Option<String>,
        /// Standalone project definition (YAML or JSON)
        #[arg(long)]
        file: Option<String>,
        /// Print one JSON event per line instead of formatted output
        #[arg(long)]
        json: bool,
    },

    /// Inspect stored projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Probe or drive the automation agent directly
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// List all projects
    List,
    /// Show one project as JSON
    Show {
        /// Project name
        name: String,
    },
}

#[derive(Subcommand)]
enum AgentAction {
    /// Report whether the agent can be launched
    Status,
    /// Send a single instruction and print the raw output
    Exec {
        /// Instruction text
        instruction: String,
    },
}

#[tokio::main]
async fn main() {
    // .env.local wins over .env; neither overrides the real environment.
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eva_core=warn,eva_server=warn,eva_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = ServerConfig {
        projects_path: cli.projects,
        prompts_path: cli.prompts,
        agent_dir: cli.agent_dir,
        idle_timeout: Duration::from_secs(cli.idle_timeout_secs),
        ..ServerConfig::default()
    };

    let result = match cli.command {
        Commands::Server {
            host,
            port,
            static_dir,
        } => {
            config.host = host;
            config.port = port;
            config.static_dir = static_dir;
            commands::server::run(config).await
        }

        Commands::Run {
            project,
            file,
            json,
        } => match commands::init_state(&config).await {
            Ok(state) => {
                commands::run::run(&state, project.as_deref(), file.as_deref(), json).await
            }
            Err(e) => Err(e),
        },

        Commands::Project { action } => match commands::init_state(&config).await {
            Ok(state) => match action {
                ProjectAction::List => commands::project::list(&state).await,
                ProjectAction::Show { name } => commands::project::show(&state, &name).await,
            },
            Err(e) => Err(e),
        },

        Commands::Agent { action } => match commands::init_state(&config).await {
            Ok(state) => match action {
                AgentAction::Status => commands::agent::status(&state),
                AgentAction::Exec { instruction } => {
                    commands::agent::exec(&state, &instruction).await
                }
            },
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
