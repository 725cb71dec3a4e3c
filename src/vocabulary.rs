//! Controlled vocabulary of canonical problem labels.
//!
//! Position is authoritative: label `i` in file order gets id `i + 1`.
//! Visually identical labels on two lines are two distinct ids.

use crate::ProblabelError;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    labels: Vec<String>,
}

impl Vocabulary {
    /// Build from an ordered list. Entries are trimmed; blank entries are dropped.
    pub fn new<I, S>(labels: I) -> Result<Self, ProblabelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels: Vec<String> = labels
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if labels.is_empty() {
            return Err(ProblabelError::Config(
                "problems list is empty; provide one label per line".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for (i, label) in labels.iter().enumerate() {
            if !seen.insert(label.as_str()) {
                log::warn!("vocabulary label {} duplicates an earlier entry: {label}", i + 1);
            }
        }

        Ok(Self { labels })
    }

    pub fn parse(text: &str) -> Result<Self, ProblabelError> {
        Self::new(text.lines())
    }

    pub fn load(path: &Path) -> Result<Self, ProblabelError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ProblabelError::Config(format!("{}: {e}", path.display())))?;
        // Editors on Windows like to leave a BOM at the front.
        Self::parse(text.trim_start_matches('\u{feff}'))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Resolve a 1-based id. Ids outside `1..=len` resolve to None.
    pub fn label(&self, id: usize) -> Option<&str> {
        id.checked_sub(1)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }

    pub fn contains_id(&self, id: usize) -> bool {
        (1..=self.labels.len()).contains(&id)
    }

    /// Render `1. label` lines, the numbering the oracle answers with.
    pub fn numbered(&self) -> String {
        numbered_lines(self.labels.iter().map(String::as_str))
    }
}

pub(crate) fn numbered_lines<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items
        .enumerate()
        .map(|(i, s)| format!("{}. {s}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
