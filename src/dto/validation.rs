//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest guess accepted over the WebSocket, in characters.
pub const MAX_GUESS_LENGTH: usize = 200;

/// Validates that a guess has visible content and a bounded length.
///
/// # Examples
///
/// ```ignore
/// validate_guess("Bohemian Rhapsody") // Ok
/// validate_guess("   ")              // Err - blank
/// ```
pub fn validate_guess(guess: &str) -> Result<(), ValidationError> {
    if guess.trim().is_empty() {
        let mut err = ValidationError::new("guess_blank");
        err.message = Some("Guess must not be empty".into());
        return Err(err);
    }

    let length = guess.chars().count();
    if length > MAX_GUESS_LENGTH {
        let mut err = ValidationError::new("guess_length");
        err.message = Some(
            format!("Guess must be at most {MAX_GUESS_LENGTH} characters (got {length})").into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_guess_valid() {
        assert!(validate_guess("Africa").is_ok());
        assert!(validate_guess("  Don't Stop Me Now ").is_ok());
        assert!(validate_guess(&"é".repeat(MAX_GUESS_LENGTH)).is_ok());
    }

    #[test]
    fn test_validate_guess_invalid() {
        assert!(validate_guess("").is_err());
        assert!(validate_guess(" \t ").is_err());
        assert!(validate_guess(&"a".repeat(MAX_GUESS_LENGTH + 1)).is_err());
    }
}
