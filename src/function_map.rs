//! Normalization of functional assignments into stable function IDs
//!
//! Two function strings map to the same ID when they agree after removing
//! comments, EC and TC numbers, case, and punctuation. IDs are built from the
//! leading letters of the first words plus a counter to keep them unique, and
//! are never reassigned for the life of the map.

use crate::genome::peg_function;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FunctionMap {
    /// Normalized key to function ID
    by_key: HashMap<String, String>,
    /// Function ID to the first name seen for it
    names: HashMap<String, String>,
    /// Next suffix number for each ID prefix
    counters: HashMap<String, usize>,
}

impl FunctionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the ID for a function, creating one on first sight
    pub fn find_or_insert(&mut self, function: &str) -> String {
        let key = normalize(function);
        if let Some(id) = self.by_key.get(&key) {
            return id.clone();
        }
        let prefix = id_prefix(&key);
        let counter = self.counters.entry(prefix.clone()).or_insert(0);
        *counter += 1;
        let id = format!("{prefix}{counter}");
        self.by_key.insert(key, id.clone());
        self.names
            .insert(id.clone(), peg_function(function).to_string());
        id
    }

    /// Return the ID for a function without creating one
    pub fn get_by_name(&self, function: &str) -> Option<&str> {
        self.by_key.get(&normalize(function)).map(String::as_str)
    }

    /// Display name for a function ID
    pub fn name(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Canonical comparison key for a function string
pub fn normalize(function: &str) -> String {
    let text = peg_function(function).to_lowercase();
    // Drop parenthesized EC and TC numbers.
    let mut cleaned = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(start) = rest.find('(') {
        let inner = &rest[start + 1..];
        match inner.find(')') {
            Some(end) if inner.starts_with("ec ") || inner.starts_with("tc ") => {
                cleaned.push_str(&rest[..start]);
                rest = &inner[end + 1..];
            }
            _ => {
                cleaned.push_str(&rest[..=start]);
                rest = inner;
            }
        }
    }
    cleaned.push_str(rest);
    cleaned
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn id_prefix(key: &str) -> String {
    let prefix: String = key
        .split(' ')
        .take(4)
        .filter_map(|w| {
            let mut chars = w.chars();
            chars.next().map(|c| {
                let mut part = c.to_ascii_uppercase().to_string();
                part.extend(chars.take(2));
                part
            })
        })
        .collect();
    if prefix.is_empty() {
        "Fun".to_string()
    } else {
        prefix
    }
}
