use thiserror::Error;

/// Prefix the site prepends before every token in its own links.
pub const DEFAULT_PREFIX: &str = "595948";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unsupported character {0:?} in identifier")]
pub struct EncodeError(pub char);

/// Token for a single id-card character, symbols first, then digits.
fn token(ch: char) -> Option<&'static str> {
    match ch {
        'D' => Some("2b"),
        'R' => Some("3d"),
        'C' => Some("2c"),
        'A' => Some("2e"),
        'B' => Some("2d"),
        '0' => Some("5f"),
        '1' => Some("5e"),
        '2' => Some("5d"),
        '3' => Some("5c"),
        '4' => Some("5b"),
        '5' => Some("5a"),
        '6' => Some("59"),
        '7' => Some("58"),
        '8' => Some("57"),
        '9' => Some("56"),
        _ => None,
    }
}

/// Obfuscate an id-card number for embedding in a result-page URL.
///
/// Every character maps to a fixed 2-hex-digit token and the output is
/// `prefix + token` per character, in input order, with no delimiter.
/// An identifier containing any unmapped character fails as a whole;
/// no partial encoding is ever returned.
pub fn encode(identifier: &str, prefix: &str) -> Result<String, EncodeError> {
    let mut out = String::with_capacity(identifier.len() * (prefix.len() + 2));
    for ch in identifier.chars() {
        let tok = token(ch).ok_or(EncodeError(ch))?;
        out.push_str(prefix);
        out.push_str(tok);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_digit_uses_digit_table() {
        assert_eq!(encode("5", DEFAULT_PREFIX).unwrap(), "5959485a");
        assert_eq!(encode("5", "p").unwrap(), "p5a");
    }

    #[test]
    fn full_idcard_concatenates_in_order() {
        // D R C A B 5 A 0 0 1
        assert_eq!(
            encode("DRCAB5A001", "").unwrap(),
            "2b3d2c2e2d5a2e5f5f5e"
        );
    }

    #[test]
    fn deterministic() {
        let a = encode("DRCAB5A186", DEFAULT_PREFIX).unwrap();
        let b = encode("DRCAB5A186", DEFAULT_PREFIX).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_input_is_empty_success() {
        assert_eq!(encode("", DEFAULT_PREFIX).unwrap(), "");
    }

    #[test]
    fn unsupported_character_fails_whole_input() {
        assert_eq!(encode("DRX", DEFAULT_PREFIX), Err(EncodeError('X')));
        // lower case is not in the table either
        assert_eq!(encode("d", DEFAULT_PREFIX), Err(EncodeError('d')));
        // failure is distinguishable from the empty-string success
        assert!(encode("", DEFAULT_PREFIX).is_ok());
    }
}
