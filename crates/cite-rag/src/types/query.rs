//! Question types

use serde::{Deserialize, Serialize};

/// One independent part of a (possibly compound) question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuestion {
    /// Question text, trimmed and marker-free
    pub text: String,
    /// Position in the original question
    pub index: usize,
}

impl SubQuestion {
    pub fn new(text: impl Into<String>, index: usize) -> Self {
        Self {
            text: text.into(),
            index,
        }
    }
}
