//! Serde structs for each client-facing wire protocol
//!
//! Only used at the handler boundary; see [`crate::convert`] for the mapping to
//! the internal types.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod responses;

use serde::{Deserialize, Serialize};

/// A stop field that clients send either as one string or a list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

impl From<StopSequences> for Vec<String> {
    fn from(stop: StopSequences) -> Self {
        match stop {
            StopSequences::One(s) => vec![s],
            StopSequences::Many(v) => v,
        }
    }
}
