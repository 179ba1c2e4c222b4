//! Scan output parsing
//!
//! Turns the raw text and exit status of one tool run into tag ids or an
//! error message.

use tracing::debug;

use crate::executor::RawResult;

/// Number of banner lines the tool prints before any tag line
pub const BANNER_LINES: usize = 5;

/// Outcome of parsing one scan: tag ids in output order, or the failure reason
pub type ParsedResult = Result<Vec<String>, String>;

/// Parse a raw tool result
pub fn parse_result(raw: &RawResult) -> ParsedResult {
    parse_output(&raw.output, raw.exit_status)
}

/// Parse tool output given its exit status
///
/// Exit status 0 skips the banner and takes everything before the first space
/// of each remaining non-empty line. Any other status yields the first output
/// line as the error message.
pub fn parse_output(output: &str, exit_status: i32) -> ParsedResult {
    debug!(output_len = %output.len(), %exit_status, "parse_output: called");
    let trimmed = output.trim_end();

    if exit_status != 0 {
        let message = trimmed.lines().next().unwrap_or_default().to_string();
        debug!(%message, "parse_output: non-zero exit");
        return Err(message);
    }

    let tags: Vec<String> = trimmed
        .lines()
        .skip(BANNER_LINES)
        .filter(|line| !line.is_empty())
        .map(|line| line.split(' ').next().unwrap_or(line).to_string())
        .collect();

    debug!(tag_count = %tags.len(), "parse_output: parsed tags");
    Ok(tags)
}
