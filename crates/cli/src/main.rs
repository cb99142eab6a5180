mod config;
mod error;

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use mcp::LaunchPlan;
use runtime::{Error as RuntimeError, McpToolHost, OllamaBackend, Session, ToolHost};

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "courier.toml";

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Chat with a local model that can call MCP server tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the tool server entry point (.py or .js)
    server: PathBuf,

    /// Launch the server with 'uv run' (for servers with their own dependencies)
    #[arg(long)]
    uv: bool,

    /// Config file (defaults to ./courier.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model override
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let model = cli.model.unwrap_or(config.backend.model);
    let backend = OllamaBackend::builder(&model)
        .base_url(&config.backend.base_url)
        .build();

    let plan = launch_plan(&cli.server, cli.uv)?;
    println!(
        "Starting tool server: {} {}",
        plan.command,
        plan.args.join(" ")
    );

    // Connection-time failures abort startup entirely.
    let host = McpToolHost::connect(&plan).await?;
    let names: Vec<&str> = host.catalog().names().collect();
    println!(
        "Connected with {} tool(s): {}",
        names.len(),
        names.join(", ")
    );

    let mut session =
        Session::new(backend, host).with_max_tool_rounds(config.session.max_tool_rounds);
    if let Some(system) = config.session.system_prompt {
        session = session.with_system(system);
    }

    println!("Model: {model}");
    println!("Type a query, or 'quit' to exit.\n");

    chat_loop(&mut session).await?;

    session.close().await;
    println!("\nSession ended.");
    Ok(())
}

/// Read queries until the sentinel or EOF. A failed turn is reported and the
/// loop continues; only the user ends the loop.
async fn chat_loop(session: &mut Session<OllamaBackend, McpToolHost>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        match session.process_query(input).await {
            Ok(answer) => {
                println!("\n{answer}\n");
            }
            Err(e @ RuntimeError::TransportBroken(_)) => {
                eprintln!("Error: {e}");
                eprintln!("The tool server is gone; restart courier to reconnect.\n");
            }
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    Ok(())
}

fn launch_plan(server: &Path, uv: bool) -> Result<LaunchPlan> {
    if uv {
        // Alternate launch strategy: the server manages its own dependencies.
        let args = vec!["run".to_string(), server.display().to_string()];
        return Ok(LaunchPlan::resolve(
            server,
            Some("uv"),
            Some(&args),
            HashMap::new(),
        )?);
    }
    Ok(LaunchPlan::resolve(server, None, None, HashMap::new())?)
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path).map_err(Error::Config)?),
        None => {
            if Path::new(CONFIG_FILE).exists() {
                Ok(Config::load(CONFIG_FILE).map_err(Error::Config)?)
            } else {
                Ok(Config::default())
            }
        }
    }
}
