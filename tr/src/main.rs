//! TagReader - CLI entry point

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use tagreader::cli::{Cli, Command, OutputFormat, get_log_path};
use tagreader::config::Config;
use tagreader::coordinator::{Coordinator, ReadOptions};
use tagreader::executor::ToolExecutor;
use tagreader::parser::parse_output;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Read {
            tool,
            device,
            power,
            read_timeout,
            timeout,
            format,
        } => {
            cmd_read(
                config,
                tool,
                device,
                ReadOptions {
                    power,
                    read_timeout_ms: read_timeout,
                    timeout_ms: timeout,
                },
                format,
            )
            .await
        }
        Command::Config { format } => cmd_config(&config, format),
        Command::Parse { file, exit_status } => cmd_parse(&file, exit_status),
    }
}

async fn cmd_read(
    mut config: Config,
    tool: Option<PathBuf>,
    device: Option<String>,
    options: ReadOptions,
    format: OutputFormat,
) -> Result<()> {
    if let Some(tool) = tool {
        config.reader.tool_path = tool;
    }
    if let Some(device) = device {
        config.reader.device_url = device;
    }
    config.validate()?;

    info!(device_url = %config.reader.device_url, ?options, "cmd_read: starting");
    let handle = Coordinator::spawn(config.coordinator, config.reader, Arc::new(ToolExecutor::new()));

    let result = handle.read(options).await;
    handle.shutdown().await?;

    let tags = match result {
        Ok(tags) => tags,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e.to_string().red());
            return Err(e).context("Read failed");
        }
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "tags": tags }))?);
        }
        OutputFormat::Text => {
            for tag in &tags {
                println!("{}", tag);
            }
            eprintln!("{} {} tag(s) read", "✓".green(), tags.len().to_string().cyan());
        }
    }
    Ok(())
}

fn cmd_config(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => print!("{}", serde_yaml::to_string(config)?),
    }
    Ok(())
}

fn cmd_parse(file: &Path, exit_status: i32) -> Result<()> {
    let output = fs::read_to_string(file).context(format!("Failed to read {}", file.display()))?;

    match parse_output(&output, exit_status) {
        Ok(tags) => {
            for tag in &tags {
                println!("{}", tag);
            }
            eprintln!("{} {} tag(s)", "✓".green(), tags.len().to_string().cyan());
        }
        Err(message) => {
            println!("{} {}", "error:".red(), message);
        }
    }
    Ok(())
}
