use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// Reads a string and runs it through `parser`. Lets enums with their own
/// case-insensitive `parse` deserialize from JSON and YAML alike.
pub fn parse_via_string<'de, D, T, F>(deserializer: D, kind: &str, parser: F) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    F: FnOnce(&str) -> Result<T, String>,
{
    let raw = String::deserialize(deserializer)?;
    parser(&raw).map_err(|reason| D::Error::custom(format!("{kind} `{raw}` rejected: {reason}")))
}
