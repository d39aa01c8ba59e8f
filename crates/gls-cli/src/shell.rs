//! Line tokenizer for the command shell
//!
//! A line is a command name followed by up to [`MAX_PARAMETERS`]
//! whitespace-separated parameters. Each parameter keeps its text and, when
//! it parses as one, its unsigned value (decimal or `0x` hex).

use crate::error::{CliError, Result};

pub const MAX_PARAMETERS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub text: String,
    pub value: Option<u32>,
}

impl Parameter {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            value: parse_unsigned(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Upper-cased command name
    pub name: String,
    pub params: Vec<Parameter>,
}

/// Split a line into a command and its parameters.
///
/// Returns `None` for blank lines.
pub fn tokenize(line: &str) -> Result<Option<CommandLine>> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };

    let params: Vec<Parameter> = words.map(Parameter::new).collect();
    if params.len() > MAX_PARAMETERS {
        return Err(CliError::Usage(format!(
            "at most {} parameters are allowed, got {}",
            MAX_PARAMETERS,
            params.len()
        )));
    }

    Ok(Some(CommandLine {
        name: name.to_ascii_uppercase(),
        params,
    }))
}

fn parse_unsigned(text: &str) -> Option<u32> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_upper_cases_command() {
        let line = tokenize("  discover 00:11:22:33:44:55 gls ").unwrap().unwrap();
        assert_eq!(line.name, "DISCOVER");
        assert_eq!(line.params.len(), 2);
        assert_eq!(line.params[1].text, "gls");
        assert_eq!(line.params[1].value, None);
    }

    #[test]
    fn test_numeric_parameters() {
        let line = tokenize("SETFEATURES 0x0403 17").unwrap().unwrap();
        assert_eq!(line.params[0].value, Some(0x0403));
        assert_eq!(line.params[1].value, Some(17));
    }

    #[test]
    fn test_blank_line() {
        assert!(tokenize("   ").unwrap().is_none());
    }

    #[test]
    fn test_parameter_limit() {
        let ok = format!("CMD{}", " 1".repeat(MAX_PARAMETERS));
        assert!(tokenize(&ok).is_ok());
        let too_many = format!("CMD{}", " 1".repeat(MAX_PARAMETERS + 1));
        assert!(matches!(tokenize(&too_many), Err(CliError::Usage(_))));
    }
}
