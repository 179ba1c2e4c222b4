//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// TagReader - serialized, full-duration tag reads through an external scan tool
#[derive(Parser)]
#[command(
    name = "tr",
    author,
    version,
    about = "Read tags through an external scan tool, one full-length read at a time",
    after_help = "Logs are written to: ~/.local/share/tagreader/logs/tagreader.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Perform one read and print the tag ids
    Read {
        /// Scan tool executable (overrides reader.tool-path)
        #[arg(long)]
        tool: Option<PathBuf>,

        /// Device URL (overrides reader.device-url)
        #[arg(long)]
        device: Option<String>,

        /// Read power
        #[arg(short, long)]
        power: Option<u32>,

        /// Scan duration passed to the tool, in milliseconds
        #[arg(short, long = "read-timeout")]
        read_timeout: Option<u64>,

        /// Overall read duration, in milliseconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the effective configuration
    Config {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Parse captured tool output without touching the device
    Parse {
        /// File holding the tool's output
        file: PathBuf,

        /// Exit status the tool reported
        #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
        exit_status: i32,
    },
}

/// Get the path to the log file
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tagreader")
        .join("logs")
        .join("tagreader.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_parse_read_command() {
        let cli = Cli::try_parse_from([
            "tr",
            "read",
            "--device",
            "tmr:///dev/ttyUSB0",
            "-p",
            "2000",
            "-r",
            "1500",
            "-t",
            "3000",
            "--format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Command::Read {
                device,
                power,
                read_timeout,
                timeout,
                format,
                tool,
            } => {
                assert_eq!(device.as_deref(), Some("tmr:///dev/ttyUSB0"));
                assert_eq!(power, Some(2000));
                assert_eq!(read_timeout, Some(1500));
                assert_eq!(timeout, Some(3000));
                assert_eq!(format, OutputFormat::Json);
                assert!(tool.is_none());
            }
            other => panic!("Wrong command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_command_negative_exit_status() {
        let cli = Cli::try_parse_from(["tr", "parse", "out.txt", "--exit-status", "-1"]).unwrap();
        match cli.command {
            Command::Parse { file, exit_status } => {
                assert_eq!(file, PathBuf::from("out.txt"));
                assert_eq!(exit_status, -1);
            }
            other => panic!("Wrong command: {:?}", other),
        }
    }
}
