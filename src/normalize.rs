//! Collapse raw problem labels into a smaller set of umbrella categories.
//!
//! The synonym groups are data. [`SynonymTable::merge`] is the only matching
//! logic, so new groups can be added through config without touching it.

use serde::Deserialize;
use std::collections::HashSet;

/// One umbrella category and the raw labels that fold into it.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SynonymGroup {
    pub category: String,
    pub synonyms: Vec<String>,
}

impl SynonymGroup {
    pub fn new(category: &str, synonyms: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A group with its synonyms pre-folded for matching.
#[derive(Debug, Clone)]
struct CompiledGroup {
    category: String,
    synonyms: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct SynonymTable {
    groups: Vec<CompiledGroup>,
}

/// Case-fold and trim, the normalization applied to both sides of a match.
pub fn fold(label: &str) -> String {
    label.trim().to_lowercase()
}

impl SynonymTable {
    pub fn empty() -> Self {
        Self { groups: Vec::new() }
    }

    pub fn new(groups: impl IntoIterator<Item = SynonymGroup>) -> Self {
        let mut table = Self::empty();
        for group in groups {
            table.push(group);
        }
        table
    }

    /// Append a group. Earlier groups win when a label appears in several.
    pub fn push(&mut self, group: SynonymGroup) {
        let synonyms = group
            .synonyms
            .iter()
            .map(|s| fold(s))
            .filter(|s| !s.is_empty())
            .collect();
        self.groups.push(CompiledGroup {
            category: group.category,
            synonyms,
        });
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn lookup(&self, folded: &str) -> Option<&str> {
        if folded.is_empty() {
            return None;
        }
        self.groups
            .iter()
            .find(|g| g.synonyms.contains(folded))
            .map(|g| g.category.as_str())
    }

    /// Map a row's raw label (and optional secondary label) to its category.
    ///
    /// The secondary label is tried against every group before the raw label.
    /// When neither matches, the raw label is returned verbatim.
    pub fn merge(&self, raw: &str, secondary: Option<&str>) -> String {
        if let Some(category) = secondary.and_then(|s| self.lookup(&fold(s))) {
            return category.to_string();
        }
        match self.lookup(&fold(raw)) {
            Some(category) => category.to_string(),
            None => raw.to_string(),
        }
    }
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self::new(default_groups())
    }
}

/// Built-in groups: ecology, electricity, housing, inflation.
pub fn default_groups() -> Vec<SynonymGroup> {
    vec![
        SynonymGroup::new(
            "Экология, климат и загрязнение",
            &[
                "экологические проблемы",
                "экология",
                "загрязнение воздуха и воды",
                "загрязнение воздуха",
                "загрязнение воды",
                "изменение климата",
                "климатические изменения",
                "засуха",
                "засухи",
            ],
        ),
        SynonymGroup::new(
            "Электроэнергия: сбои и высокая стоимость",
            &[
                "сбои электроснабжения",
                "перебои с электричеством",
                "стоимость электроэнергии",
                "проблемы с электроэнергией (сбои, высокая стоимость, дефицит)",
                "электроэнергия",
            ],
        ),
        SynonymGroup::new(
            "Жильё: условия и высокая стоимость",
            &[
                "жилищные условия",
                "высокие цены на жильё и аренду",
                "плохие жилищные условия и высокая стоимость жилья",
            ],
        ),
        SynonymGroup::new(
            "Инфляция и рост цен (продукты, топливо)",
            &[
                "инфляция",
                "инфляция и рост цен",
                "высокие цены на продукты",
                "высокие цены на топливо",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_label_falls_back_verbatim() {
        let table = SynonymTable::default();
        assert_eq!(table.merge("  Безработица ", None), "  Безработица ");
    }

    #[test]
    fn raw_label_matches_case_insensitively() {
        let table = SynonymTable::default();
        assert_eq!(table.merge(" ЗАСУХА ", None), "Экология, климат и загрязнение");
        assert_eq!(table.merge("Инфляция", None), "Инфляция и рост цен (продукты, топливо)");
    }

    #[test]
    fn secondary_match_wins_when_raw_unknown() {
        let table = SynonymTable::default();
        assert_eq!(
            table.merge("power cuts", Some("Перебои с электричеством")),
            "Электроэнергия: сбои и высокая стоимость"
        );
    }

    #[test]
    fn secondary_checked_before_raw() {
        let table = SynonymTable::default();
        // raw says ecology, secondary says housing: secondary wins.
        assert_eq!(
            table.merge("засуха", Some("жилищные условия")),
            "Жильё: условия и высокая стоимость"
        );
    }

    #[test]
    fn unmatched_secondary_falls_through_to_raw() {
        let table = SynonymTable::default();
        assert_eq!(table.merge("экология", Some("something else")), "Экология, климат и загрязнение");
        assert_eq!(table.merge("roads", Some("something else")), "roads");
    }

    #[test]
    fn blank_secondary_ignored() {
        let table = SynonymTable::default();
        assert_eq!(table.merge("roads", Some("   ")), "roads");
    }

    #[test]
    fn first_group_wins_on_overlap() {
        let table = SynonymTable::new([
            SynonymGroup::new("A", &["shared"]),
            SynonymGroup::new("B", &["shared", "only b"]),
        ]);
        assert_eq!(table.merge("shared", None), "A");
        assert_eq!(table.merge("only b", None), "B");
    }

    #[test]
    fn sentinel_is_not_special_here() {
        let table = SynonymTable::default();
        assert_eq!(table.merge("нет", None), "нет");
    }
}
