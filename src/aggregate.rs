//! Group labeled messages by merged category for the themed report.

use crate::dataset::{Columns, Dataset};
use crate::normalize::SynonymTable;
use crate::ProblabelError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const MAX_LINKS: usize = 3;

/// Messages that fold into one category.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ThemeGroup {
    pub category: String,
    pub count: usize,
    /// First non-blank secondary label within the group.
    pub problem_ru: Option<String>,
    pub messages: Vec<String>,
    pub links: Vec<String>,
    /// `problem_<lang>` column suffix -> first non-blank value in the group.
    pub labels_by_lang: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
pub struct GroupLimits {
    pub max_messages: usize,
    pub max_chars: usize,
}

impl Default for GroupLimits {
    fn default() -> Self {
        Self {
            max_messages: 30,
            max_chars: 2000,
        }
    }
}

/// Merged category of every row, top to bottom.
pub fn merged_labels(
    dataset: &Dataset,
    columns: &Columns,
    table: &SynonymTable,
) -> Result<Vec<String>, ProblabelError> {
    let problem_col = columns
        .problem
        .as_deref()
        .ok_or_else(|| ProblabelError::Config("no problem label column to aggregate".into()))?;
    let raw = dataset
        .column(problem_col)
        .ok_or_else(|| ProblabelError::Config(format!("no column named {problem_col}")))?;
    let secondary = columns.problem_ru.as_deref().and_then(|c| dataset.column(c));

    Ok(raw
        .iter()
        .enumerate()
        .map(|(i, r)| table.merge(r, secondary.as_ref().map(|s| s[i])))
        .collect())
}

/// (category, row count), most frequent first, ties by name, sentinel excluded.
pub fn distribution(merged: &[String], sentinel: &str) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in merged {
        *counts.entry(label.as_str()).or_insert(0) += 1;
    }
    let mut rows: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(label, _)| *label != sentinel)
        .map(|(label, n)| (label.to_string(), n))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

/// Truncate to `max_chars` characters, marking the cut with `...`.
fn clip(message: &str, max_chars: usize) -> Option<String> {
    let s = message.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().count() > max_chars {
        let mut clipped: String = s.chars().take(max_chars).collect();
        clipped.push_str("...");
        return Some(clipped);
    }
    Some(s.to_string())
}

/// Build one group per category, in distribution order. Categories whose
/// rows carry no message text are left out.
pub fn group_messages(
    dataset: &Dataset,
    columns: &Columns,
    table: &SynonymTable,
    sentinel: &str,
    limits: GroupLimits,
) -> Result<Vec<ThemeGroup>, ProblabelError> {
    let merged = merged_labels(dataset, columns, table)?;
    let message_idx = dataset
        .column_index(&columns.message)
        .ok_or_else(|| ProblabelError::Config(format!("no column named {}", columns.message)))?;
    let ru_idx = columns.problem_ru.as_deref().and_then(|c| dataset.column_index(c));
    let link_idx = columns.link.as_deref().and_then(|c| dataset.column_index(c));
    let lang_cols: Vec<(String, usize)> = dataset
        .headers()
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let suffix = h.strip_prefix("problem_")?;
            (!suffix.ends_with("_candidates")).then(|| (suffix.to_string(), i))
        })
        .collect();

    let mut groups = Vec::new();
    for (category, count) in distribution(&merged, sentinel) {
        let rows: Vec<usize> = (0..dataset.len()).filter(|&r| merged[r] == category).collect();

        let messages: Vec<String> = rows
            .iter()
            .filter_map(|&r| clip(dataset.cell(r, message_idx), limits.max_chars))
            .take(limits.max_messages)
            .collect();
        if messages.is_empty() {
            continue;
        }

        let first_non_blank = |col: usize| {
            rows.iter()
                .map(|&r| dataset.cell(r, col).trim())
                .find(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mut links: Vec<String> = Vec::new();
        if let Some(idx) = link_idx {
            for &r in &rows {
                let link = dataset.cell(r, idx).trim();
                if !link.is_empty() && !links.iter().any(|l| l == link) {
                    links.push(link.to_string());
                    if links.len() == MAX_LINKS {
                        break;
                    }
                }
            }
        }

        let labels_by_lang = lang_cols
            .iter()
            .filter_map(|(lang, idx)| first_non_blank(*idx).map(|v| (lang.clone(), v)))
            .collect();

        groups.push(ThemeGroup {
            problem_ru: ru_idx.and_then(first_non_blank),
            category,
            count,
            messages,
            links,
            labels_by_lang,
        });
    }
    Ok(groups)
}
