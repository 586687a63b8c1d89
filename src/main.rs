//! agent-dispatch CLI - Dispatch agent tasks to hosted LLMs

use agent_dispatch::{
    config::{Config, StorageBackend},
    models::{AgentSettings, CreateAgent, FeatureFlags},
    orchestrator::TaskRequest,
    routing::TaskCategory,
    service::Platform,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "agent-dispatch")]
#[command(about = "Dispatch agent tasks to hosted LLMs with keyword routing and bounded context")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Config file (default: the per-user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print dispatch metrics after the command
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage agents
    #[command(subcommand)]
    Agent(AgentCommands),

    /// List built-in agent templates
    Templates,

    /// Manage conversations
    #[command(subcommand)]
    Conversation(ConversationCommands),

    /// Run and inspect tasks
    #[command(subcommand)]
    Task(TaskCommands),

    /// Send one prompt to several models side by side
    Compare {
        /// Agent whose system prompt is used
        #[arg(short, long)]
        agent: String,

        /// Prompt text
        #[arg(short, long)]
        prompt: String,

        /// Model to include (repeatable)
        #[arg(short, long = "model", required = true)]
        models: Vec<String>,
    },

    /// Fetch a page and have an agent analyze it
    Scrape {
        #[arg(short, long)]
        agent: String,

        #[arg(short, long)]
        url: String,

        /// What to ask about the page
        #[arg(short, long)]
        prompt: Option<String>,
    },

    /// Upload a file for use in tasks
    Upload {
        /// File to upload
        path: PathBuf,

        /// MIME type (default: guessed from the extension)
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Show the analytics rollup
    Analytics,

    /// Check store, cache and upstream health
    Health,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum AgentCommands {
    /// Create an agent
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        system_prompt: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Model identifier, or "auto" to route by task category
        #[arg(short, long)]
        model: Option<String>,

        /// Task category the agent specializes in
        #[arg(long)]
        specialization: Option<TaskCategory>,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Create an agent from a built-in template
    FromTemplate {
        /// Template key, e.g. "contentwriter"
        template: String,

        /// Name for the new agent (default: the template name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List agents, newest first
    List,

    /// Show one agent
    Show { id: String },

    /// Delete an agent with its tasks and conversations
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConversationCommands {
    /// Start a conversation with an agent
    Create { agent: String },

    /// Show a conversation with its messages
    Show { id: String },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Run a task against an agent
    Run {
        #[arg(short, long)]
        agent: String,

        #[arg(short, long)]
        prompt: String,

        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Scrape URLs found in the prompt
        #[arg(long)]
        web: bool,

        /// Ask for step-by-step reasoning on an escalated model
        #[arg(long)]
        reasoning: bool,

        /// Send the recent history verbatim, without the context budget
        #[arg(long)]
        no_context_optimization: bool,

        /// Suggest charts when the response carries data
        #[arg(long)]
        visualize: bool,

        /// Uploaded file id to describe in the prompt (repeatable)
        #[arg(short, long = "file")]
        files: Vec<String>,
    },

    /// List recent tasks, optionally for one agent
    List {
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Show one task
    Show { id: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Show {
        /// Show only one section (upstream, routing, context, augmentation, cache, breaker, storage)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    if let Commands::Config(cmd) = cli.command {
        return run_config_command(cmd, config_path);
    }

    let config = Config::load_from(config_path.clone())
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.validate()?;
    if config.storage.backend == StorageBackend::Sqlite {
        info!("Using document store at {}", config.storage.database_url);
    }

    let platform = Platform::from_config(config).await?;
    run_command(&platform, cli.command).await?;

    if cli.metrics {
        println!("\n{}", platform.metrics());
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_command(platform: &Platform, command: Commands) -> Result<()> {
    match command {
        Commands::Agent(cmd) => run_agent_command(platform, cmd).await?,
        Commands::Templates => print_json(&platform.list_templates().await)?,
        Commands::Conversation(ConversationCommands::Create { agent }) => {
            print_json(&platform.create_conversation(&agent).await?)?
        }
        Commands::Conversation(ConversationCommands::Show { id }) => {
            print_json(&platform.get_conversation(&id).await?)?
        }
        Commands::Task(cmd) => run_task_command(platform, cmd).await?,
        Commands::Compare {
            agent,
            prompt,
            models,
        } => print_json(&platform.compare_models(&agent, &prompt, &models).await?)?,
        Commands::Scrape { agent, url, prompt } => print_json(
            &platform
                .scrape_and_analyze(&agent, &url, prompt.as_deref())
                .await?,
        )?,
        Commands::Upload { path, content_type } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let content_type = content_type.unwrap_or_else(|| guess_content_type(&path).to_string());
            print_json(&platform.upload_file(&filename, &content_type, &bytes).await?)?
        }
        Commands::Analytics => print_json(&platform.analytics().await?)?,
        Commands::Health => print_json(&platform.health().await)?,
        Commands::Config(_) => {}
    }
    Ok(())
}

async fn run_agent_command(platform: &Platform, cmd: AgentCommands) -> Result<()> {
    match cmd {
        AgentCommands::Create {
            name,
            system_prompt,
            description,
            model,
            specialization,
            temperature,
            max_tokens,
        } => {
            let agent = platform
                .create_agent(CreateAgent {
                    name,
                    description,
                    system_prompt,
                    model,
                    specialization,
                    settings: AgentSettings {
                        temperature,
                        max_tokens,
                        ..Default::default()
                    },
                })
                .await?;
            print_json(&agent)?;
        }
        AgentCommands::FromTemplate { template, name } => {
            print_json(&platform.create_agent_from_template(&template, name).await?)?;
        }
        AgentCommands::List => print_json(&platform.list_agents().await?)?,
        AgentCommands::Show { id } => print_json(&platform.get_agent(&id).await?)?,
        AgentCommands::Delete { id } => {
            platform.delete_agent(&id).await?;
            println!("Deleted agent {id}");
        }
    }
    Ok(())
}

async fn run_task_command(platform: &Platform, cmd: TaskCommands) -> Result<()> {
    match cmd {
        TaskCommands::Run {
            agent,
            prompt,
            conversation,
            web,
            reasoning,
            no_context_optimization,
            visualize,
            files,
        } => {
            let mut request = TaskRequest::new(agent, prompt)
                .with_features(FeatureFlags {
                    web_augmentation: web,
                    reasoning_mode: reasoning,
                    context_optimization: !no_context_optimization,
                    visualization: visualize,
                })
                .with_files(files);
            if let Some(id) = conversation {
                request = request.in_conversation(id);
            }
            print_json(&platform.execute_task(request).await?)?;
        }
        TaskCommands::List { agent: Some(agent) } => {
            print_json(&platform.list_agent_tasks(&agent).await?)?
        }
        TaskCommands::List { agent: None } => print_json(&platform.list_recent_tasks().await?)?,
        TaskCommands::Show { id } => print_json(&platform.get_task(&id).await?)?,
    }
    Ok(())
}

fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn run_config_command(cmd: ConfigCommands, path: PathBuf) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => config_init(force, path)?,
        ConfigCommands::Show { section } => config_show(section, path)?,
        ConfigCommands::Path => config_path(&path),
        ConfigCommands::Validate => config_validate(path)?,
    }
    Ok(())
}

fn config_init(force: bool, path: PathBuf) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists at: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    Config::default().save_to(path.clone())?;

    println!("Configuration file created at: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file to add your API key, or");
    println!("  2. Set environment variables:");
    println!("     export GROQ_API_KEY=your_groq_key");
    println!("     export AGENT_DISPATCH_STORAGE=memory   # skip the SQLite file");

    Ok(())
}

fn config_show(section: Option<String>, path: PathBuf) -> Result<()> {
    let mut config = Config::load_from(path)?;
    if config.upstream.api_key.is_some() {
        config.upstream.api_key = Some("***".to_string());
    }

    let display = if let Some(sec) = section {
        match sec.to_lowercase().as_str() {
            "upstream" => toml::to_string_pretty(&config.upstream)?,
            "routing" => toml::to_string_pretty(&config.routing)?,
            "context" => toml::to_string_pretty(&config.context)?,
            "augmentation" => toml::to_string_pretty(&config.augmentation)?,
            "cache" => toml::to_string_pretty(&config.cache)?,
            "breaker" => toml::to_string_pretty(&config.breaker)?,
            "storage" => toml::to_string_pretty(&config.storage)?,
            _ => {
                println!("Unknown section: {}", sec);
                println!("Available: upstream, routing, context, augmentation, cache, breaker, storage");
                return Ok(());
            }
        }
    } else {
        toml::to_string_pretty(&config)?
    };

    println!("{}", display);

    println!("\n--- Environment Variables ---");
    for var in ["GROQ_API_KEY", "GROQ_BASE_URL", "AGENT_DISPATCH_DATABASE_URL", "AGENT_DISPATCH_STORAGE", "AGENT_DISPATCH_UPLOAD_DIR"] {
        let state = if std::env::var(var).is_ok() { "set" } else { "not set" };
        println!("{var}: {state}");
    }

    Ok(())
}

fn config_path(path: &Path) {
    println!("{}", path.display());

    if path.exists() {
        println!("(file exists)");
    } else {
        println!("(file does not exist - run 'config init' to create)");
    }
}

fn config_validate(path: PathBuf) -> Result<()> {
    let config = Config::load_from(path)?;
    config.validate()?;

    println!("Configuration is valid");
    if config.upstream.api_key.is_none() {
        println!("Warning: no API key set; upstream calls will fail until GROQ_API_KEY is provided");
    }
    println!("Storage: {:?} ({})", config.storage.backend, config.storage.database_url);

    Ok(())
}
