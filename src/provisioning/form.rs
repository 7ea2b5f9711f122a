//! `application/x-www-form-urlencoded` body parsing.

use std::fmt;

/// Form field names. Browsers submit these, so they are part of the
/// external contract.
pub const SSID_FIELD: &str = "ssid";
pub const PASSWORD_FIELD: &str = "password";

/// The two fields of a submitted provisioning form.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FormFields {
    pub ssid: Option<String>,
    pub password: Option<String>,
}

/// Parse a urlencoded body. Unknown keys are ignored; for repeated keys the
/// last value wins.
pub fn parse_form(body: &str) -> Result<FormFields, FormError> {
    let mut fields = FormFields::default();

    for pair in body.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key)?;
        match key.as_str() {
            SSID_FIELD => fields.ssid = Some(decode_component(value)?),
            PASSWORD_FIELD => fields.password = Some(decode_component(value)?),
            _ => {}
        }
    }

    Ok(fields)
}

/// Decode one urlencoded component: `+` is a space, `%XX` a byte.
fn decode_component(s: &str) -> Result<String, FormError> {
    let input = s.as_bytes();
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        match input[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hi = input.get(i + 1).and_then(|b| hex_value(*b));
                let lo = input.get(i + 2).and_then(|b| hex_value(*b));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
                    _ => return Err(FormError::BadEscape(i)),
                }
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| FormError::InvalidUtf8)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Malformed form body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    /// `%` not followed by two hex digits, at the given byte offset.
    BadEscape(usize),
    /// Decoded bytes are not UTF-8.
    InvalidUtf8,
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadEscape(at) => write!(f, "bad percent escape at offset {}", at),
            Self::InvalidUtf8 => write!(f, "form data is not valid UTF-8"),
        }
    }
}

impl std::error::Error for FormError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_form() {
        let fields = parse_form("ssid=HomeNet&password=secret123").unwrap();
        assert_eq!(fields.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(fields.password.as_deref(), Some("secret123"));
    }

    #[test]
    fn test_encoded_values() {
        let fields = parse_form("ssid=My+Home%20Net&password=p%26ss%3Dw%25rd").unwrap();
        assert_eq!(fields.ssid.as_deref(), Some("My Home Net"));
        assert_eq!(fields.password.as_deref(), Some("p&ss=w%rd"));
    }

    #[test]
    fn test_utf8_values() {
        let fields = parse_form("ssid=Caf%C3%A9&password=x").unwrap();
        assert_eq!(fields.ssid.as_deref(), Some("Café"));
    }

    #[test]
    fn test_empty_and_missing_fields() {
        let fields = parse_form("ssid=&submit=Submit").unwrap();
        assert_eq!(fields.ssid.as_deref(), Some(""));
        assert_eq!(fields.password, None);

        assert_eq!(parse_form("").unwrap(), FormFields::default());
        assert_eq!(parse_form("password").unwrap().password.as_deref(), Some(""));
    }

    #[test]
    fn test_last_value_wins() {
        let fields = parse_form("ssid=a&ssid=b&password=x").unwrap();
        assert_eq!(fields.ssid.as_deref(), Some("b"));
    }

    #[test]
    fn test_bad_escape() {
        assert_eq!(parse_form("ssid=100%"), Err(FormError::BadEscape(3)));
        assert_eq!(parse_form("ssid=%zz"), Err(FormError::BadEscape(0)));
    }

    #[test]
    fn test_invalid_utf8() {
        assert_eq!(parse_form("ssid=%FF%FE"), Err(FormError::InvalidUtf8));
    }
}
