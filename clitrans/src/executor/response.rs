//! Response type for command execution results.

use std::time::Duration;

use crate::channel::ErrorMatch;

/// Response from one command batch.
#[derive(Debug, Clone)]
pub struct Response {
    /// The command text that was sent.
    pub command: String,

    /// The command output (normalized - command echo and trailing prompt removed).
    pub result: String,

    /// The full device transcript for the batch.
    pub raw_result: String,

    /// The prompt that was matched at the end.
    pub prompt: String,

    /// Time taken to execute the command.
    pub elapsed: Duration,

    /// Device error pattern found in the transcript, if any.
    pub failure: Option<ErrorMatch>,
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.result)
    }
}

/// Strip the echo of `first_command` and the trailing prompt line.
pub(crate) fn normalize_output(raw: &str, first_command: Option<&str>) -> String {
    let mut output = raw;

    if let Some(command) = first_command {
        let first_line_end = output.find('\n').unwrap_or(output.len());
        if let Some(pos) = output[..first_line_end].find(command) {
            output = &output[pos + command.len()..];
        }
    }
    let output = output.trim_start_matches(['\r', '\n']);

    // The last line is always the prompt
    match output.rfind('\n') {
        Some(pos) => output[..pos].trim_end_matches(['\r', '\n']).to_string(),
        None => String::new(),
    }
}
