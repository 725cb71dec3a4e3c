//! One-hot ("wide") label columns for spreadsheet pivoting.

use crate::dataset::{self, Dataset};
use crate::vocabulary::Vocabulary;
use crate::ProblabelError;
use std::collections::BTreeSet;

fn flag(present: bool) -> String {
    if present { "True" } else { "False" }.to_string()
}

fn split_candidates(cell: &str) -> Vec<&str> {
    cell.split('|').filter(|s| !s.is_empty()).collect()
}

/// Add `ru_<label>` per vocabulary label and `<lang>_<label>` per translated
/// label seen in that language's candidate column.
pub fn add_wide_columns(
    dataset: &mut Dataset,
    vocabulary: &Vocabulary,
    langs: &[String],
) -> Result<(), ProblabelError> {
    let base: Vec<Vec<String>> = candidate_cells(dataset, dataset::BASE_CANDIDATES_COLUMN)?;
    let mut seen_base = BTreeSet::new();
    for label in vocabulary.labels() {
        // Duplicate vocabulary entries would produce the same column twice.
        if !seen_base.insert(label.as_str()) {
            continue;
        }
        let values = base.iter().map(|row| flag(row.iter().any(|c| c == label))).collect();
        dataset.set_column(&format!("ru_{label}"), values)?;
    }

    for lang in langs {
        let cells = candidate_cells(dataset, &dataset::lang_candidates_column(lang))?;
        let labels: BTreeSet<String> = cells.iter().flatten().cloned().collect();
        for label in &labels {
            let values = cells.iter().map(|row| flag(row.contains(label))).collect();
            dataset.set_column(&format!("{lang}_{label}"), values)?;
        }
    }
    Ok(())
}

fn candidate_cells(dataset: &Dataset, column: &str) -> Result<Vec<Vec<String>>, ProblabelError> {
    let cells = dataset
        .column(column)
        .ok_or_else(|| ProblabelError::Config(format!("wide columns need {column}; classify first")))?;
    Ok(cells
        .into_iter()
        .map(|cell| split_candidates(cell).into_iter().map(str::to_string).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified() -> Dataset {
        Dataset::new(
            vec!["text".into(), "problem_russ_candidates".into(), "problem_en_candidates".into()],
            vec![
                vec!["a".into(), "инфляция|засуха".into(), "inflation|drought".into()],
                vec!["b".into(), "".into(), "".into()],
                vec!["c".into(), "засуха".into(), "drought".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn base_columns_follow_vocabulary() {
        let mut ds = classified();
        let v = Vocabulary::new(["засуха", "инфляция", "жилищные условия"]).unwrap();
        add_wide_columns(&mut ds, &v, &[]).unwrap();
        assert_eq!(ds.column("ru_засуха").unwrap(), vec!["True", "False", "True"]);
        assert_eq!(ds.column("ru_инфляция").unwrap(), vec!["True", "False", "False"]);
        assert_eq!(ds.column("ru_жилищные условия").unwrap(), vec!["False", "False", "False"]);
    }

    #[test]
    fn language_columns_from_seen_labels_sorted() {
        let mut ds = classified();
        let v = Vocabulary::new(["засуха", "инфляция"]).unwrap();
        add_wide_columns(&mut ds, &v, &["en".to_string()]).unwrap();
        let en: Vec<&String> = ds.headers().iter().filter(|h| h.starts_with("en_")).collect();
        assert_eq!(en, vec!["en_drought", "en_inflation"]);
        assert_eq!(ds.column("en_inflation").unwrap(), vec!["True", "False", "False"]);
    }

    #[test]
    fn unclassified_dataset_rejected() {
        let mut ds = Dataset::new(vec!["text".into()], vec![]).unwrap();
        let v = Vocabulary::new(["a"]).unwrap();
        assert!(add_wide_columns(&mut ds, &v, &[]).is_err());
    }
}
