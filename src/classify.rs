//! Single-text classification against the numbered vocabulary.
//!
//! The oracle must answer `{"problem_ids": [..]}`. Anything else decodes to
//! [`ClassifyOutcome::Malformed`]; the caller treats that as zero labels.

use crate::oracle::{Oracle, RequestLimits, Usage, strip_fences};
use crate::translate::TranslationMap;
use crate::vocabulary::{Vocabulary, numbered_lines};
use crate::ProblabelError;
use serde::Deserialize;

const SYSTEM_PROMPT: &str = "Ты опытный аналитик. Твоя задача — присвоить тексту одну или несколько проблем из заданного списка. Выбирать можно ТОЛЬКО из списка (по номерам). Не выдумывай новых меток. Верни только валидный JSON.";

const USER_PROMPT_TEMPLATE: &str = r#"Текст:
{TEXT}

Справочник проблем (RU):
{PROBLEMS}
{TRANSLATIONS}
Требования:
- Верни до {MAX_LABELS} меток (может быть 0) из списка, по убыванию релевантности.
- Строго JSON без комментариев, формат:
{
  "problem_ids": [1, 3, 5]
}"#;

/// Decoded oracle answer for one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyOutcome {
    /// In-range ids, relevance order, at most `max_labels` long.
    Labels(Vec<usize>),
    Malformed(String),
}

#[derive(Deserialize)]
struct ClassifyResponse {
    problem_ids: Vec<serde_json::Value>,
}

/// Per-language renderings of the vocabulary to include in the prompt.
pub struct PromptTranslations<'a> {
    pub map: &'a TranslationMap,
    pub langs: &'a [String],
}

pub fn build_prompt(
    text: &str,
    vocabulary: &Vocabulary,
    translations: Option<&PromptTranslations<'_>>,
    max_labels: usize,
) -> String {
    let mut translations_block = String::new();
    if let Some(t) = translations {
        for lang in t.langs {
            let column = t.map.column(vocabulary, lang);
            translations_block.push_str(&format!("\n[{lang}]\n"));
            translations_block.push_str(&numbered_lines(column.into_iter()));
            translations_block.push('\n');
        }
    }

    // Text goes in last so placeholders inside a message are left alone.
    USER_PROMPT_TEMPLATE
        .replace("{PROBLEMS}", &vocabulary.numbered())
        .replace("{TRANSLATIONS}", &translations_block)
        .replace("{MAX_LABELS}", &max_labels.to_string())
        .replace("{TEXT}", text)
}

/// Decode `content` into ids. Non-integer and out-of-range ids are dropped;
/// the survivors are truncated to `max_labels`.
///
/// Filtering runs before truncation, so `[0, 2, 1]` with `max_labels = 2`
/// yields `[2, 1]`, not `[2]`. The result is exactly `max_labels` long
/// whenever the response held at least that many valid ids, and shorter only
/// when it did not.
pub fn parse_response(content: &str, vocabulary: &Vocabulary, max_labels: usize) -> ClassifyOutcome {
    let response: ClassifyResponse = match serde_json::from_str(strip_fences(content)) {
        Ok(r) => r,
        Err(e) => return ClassifyOutcome::Malformed(e.to_string()),
    };

    let ids = response
        .problem_ids
        .iter()
        .filter_map(serde_json::Value::as_u64)
        .filter_map(|id| usize::try_from(id).ok())
        .filter(|&id| vocabulary.contains_id(id))
        .take(max_labels)
        .collect();
    ClassifyOutcome::Labels(ids)
}

/// Ask the oracle for the labels of one text.
///
/// Transport failures come back as `Err`; a response that does not decode is
/// `Ok(Malformed)` along with the usage it cost.
pub fn classify_one(
    oracle: &dyn Oracle,
    text: &str,
    vocabulary: &Vocabulary,
    translations: Option<&PromptTranslations<'_>>,
    max_labels: usize,
    limits: RequestLimits,
) -> Result<(ClassifyOutcome, Usage), ProblabelError> {
    let prompt = build_prompt(text, vocabulary, translations, max_labels);
    let completion = oracle.request(SYSTEM_PROMPT, &prompt, limits)?;
    Ok((parse_response(&completion.content, vocabulary, max_labels), completion.usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::new(["power outages", "housing cost", "inflation"]).unwrap()
    }

    #[test]
    fn parses_plain_ids() {
        let out = parse_response(r#"{"problem_ids": [2, 1]}"#, &vocab(), 3);
        assert_eq!(out, ClassifyOutcome::Labels(vec![2, 1]));
    }

    #[test]
    fn fenced_response_parses_like_plain() {
        let plain = parse_response(r#"{"problem_ids": [3]}"#, &vocab(), 3);
        let fenced = parse_response("```json\n{\"problem_ids\": [3]}\n```", &vocab(), 3);
        assert_eq!(plain, fenced);
    }

    #[test]
    fn out_of_range_ids_dropped() {
        let out = parse_response(r#"{"problem_ids": [0, 2, 4, -1]}"#, &vocab(), 3);
        assert_eq!(out, ClassifyOutcome::Labels(vec![2]));
    }

    #[test]
    fn invalid_ids_do_not_use_up_label_slots() {
        let out = parse_response(r#"{"problem_ids": [0, 2, 1, 3]}"#, &vocab(), 2);
        assert_eq!(out, ClassifyOutcome::Labels(vec![2, 1]));
    }

    #[test]
    fn non_integer_ids_dropped() {
        let out = parse_response(r#"{"problem_ids": ["1", 1.5, null, 3]}"#, &vocab(), 3);
        assert_eq!(out, ClassifyOutcome::Labels(vec![3]));
    }

    #[test]
    fn truncated_to_max_labels_in_order() {
        let out = parse_response(r#"{"problem_ids": [3, 1, 2]}"#, &vocab(), 2);
        assert_eq!(out, ClassifyOutcome::Labels(vec![3, 1]));
    }

    #[test]
    fn empty_list_is_zero_labels() {
        let out = parse_response(r#"{"problem_ids": []}"#, &vocab(), 3);
        assert_eq!(out, ClassifyOutcome::Labels(vec![]));
    }

    #[test]
    fn missing_field_is_malformed() {
        let out = parse_response(r#"{"labels": [1]}"#, &vocab(), 3);
        assert!(matches!(out, ClassifyOutcome::Malformed(_)));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_response("I think it is about power.", &vocab(), 3),
            ClassifyOutcome::Malformed(_)
        ));
        assert!(matches!(
            parse_response(r#"{"problem_ids": 2}"#, &vocab(), 3),
            ClassifyOutcome::Malformed(_)
        ));
    }

    #[test]
    fn prompt_includes_text_vocabulary_and_translations() {
        let mut map = TranslationMap::new();
        map.insert("power outages", "sw", "kukatika kwa umeme");
        let langs = vec!["sw".to_string()];
        let t = PromptTranslations { map: &map, langs: &langs };
        let prompt = build_prompt("no electricity for 3 days", &vocab(), Some(&t), 2);
        assert!(prompt.contains("no electricity for 3 days"));
        assert!(prompt.contains("2. housing cost"));
        assert!(prompt.contains("[sw]\n1. kukatika kwa umeme\n2. \n3. "));
        assert!(prompt.contains("до 2 меток"));
    }

    #[test]
    fn prompt_without_translations() {
        let prompt = build_prompt("text", &vocab(), None, 3);
        assert!(!prompt.contains("\n["));
        assert!(!prompt.contains("{TRANSLATIONS}"));
    }
}
