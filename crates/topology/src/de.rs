//! Lenient decoders for fields the membership API encodes inconsistently.

use serde::Deserialize;
use serde::de::{Deserializer, Error};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(usize),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagOrText {
    Flag(bool),
    Text(String),
}

/// Accepts `3` as well as `"3"`.
pub fn number_or_string<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s
            .trim()
            .parse()
            .map_err(|e| D::Error::custom(format!("invalid number '{s}': {e}"))),
    }
}

/// Accepts `true` as well as `"true"`; anything else is `false`.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match FlagOrText::deserialize(deserializer)? {
        FlagOrText::Flag(b) => b,
        FlagOrText::Text(s) => s.trim().eq_ignore_ascii_case("true"),
    })
}
