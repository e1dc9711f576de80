//! Utility functions

use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::path::PathBuf;

/// Expand tilde (~) to home directory in path strings
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Forge ids are numbers, but hand-edited configs sometimes quote them
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(u64),
    Text(String),
}

fn parse_id<E: de::Error>(repr: IdRepr) -> Result<u64, E> {
    match repr {
        IdRepr::Number(id) => Ok(id),
        IdRepr::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("invalid id '{}'", text))),
    }
}

pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    parse_id(IdRepr::deserialize(deserializer)?)
}

pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<IdRepr>::deserialize(deserializer)?
        .map(parse_id)
        .transpose()
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}
