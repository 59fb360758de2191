//! Optimizer magnitude notation
//!
//! The tabular plan rendering abbreviates large row and cost figures with a
//! trailing `K`, `M` or `G` (`1.2K`, `3M`). This module turns those tokens
//! back into integer counts.

use thiserror::Error;

/// Errors that can occur when parsing a magnitude token
#[derive(Debug, Error, PartialEq)]
pub enum NotationError {
    #[error("Invalid magnitude '{0}': expected a number before the unit suffix")]
    InvalidMagnitude(String),

    #[error("Invalid integer '{0}'")]
    InvalidInteger(String),
}

/// Result type for notation parsing
pub type Result<T> = std::result::Result<T, NotationError>;

/// Parses a magnitude token into an integer count
///
/// Suffixed values are rounded to the nearest integer.
///
/// # Examples
///
/// ```
/// use planscope_analyzer::explain::notation::parse_notation;
///
/// assert_eq!(parse_notation("1.2K").unwrap(), 1_200);
/// assert_eq!(parse_notation("3m").unwrap(), 3_000_000);
/// assert_eq!(parse_notation("  42 ").unwrap(), 42);
/// assert_eq!(parse_notation("").unwrap(), 0);
/// assert!(parse_notation("abcK").is_err());
/// ```
pub fn parse_notation(text: &str) -> Result<u64> {
    let token = text.trim().to_ascii_uppercase();
    if token.is_empty() {
        return Ok(0);
    }

    let (number, multiplier) = match token.as_bytes()[token.len() - 1] {
        b'K' => (&token[..token.len() - 1], 1e3),
        b'M' => (&token[..token.len() - 1], 1e6),
        b'G' => (&token[..token.len() - 1], 1e9),
        _ => {
            return token
                .parse::<u64>()
                .map_err(|_| NotationError::InvalidInteger(text.trim().to_string()));
        }
    };

    let value = number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| NotationError::InvalidMagnitude(text.trim().to_string()))?;

    Ok((value * multiplier).round() as u64)
}

/// Parses a magnitude token, degrading malformed input to zero
pub fn parse_or_zero(text: &str) -> u64 {
    parse_notation(text).unwrap_or_else(|err| {
        tracing::trace!(token = text, error = %err, "unparsable magnitude, using 0");
        0
    })
}
