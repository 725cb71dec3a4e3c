//! Translate the vocabulary into the target languages in a single oracle call.
//!
//! A short list for a language leaves the tail untranslated (empty string).
//! A response that does not decode at all aborts the run.

use crate::oracle::{Oracle, RequestLimits, Usage, strip_fences};
use crate::vocabulary::Vocabulary;
use crate::ProblabelError;
use serde::Deserialize;
use std::collections::HashMap;

const SYSTEM_PROMPT: &str = "Ты профессиональный переводчик. Переводи краткие словосочетания проблем строго по смыслу, без добавления новых слов. Верни только валидный JSON без комментариев.";

const USER_PROMPT_TEMPLATE: &str = r#"Исходные формулировки (RU), по одной на строку, с номерами:
{NUMBERED}

Языки перевода (ISO 639-1): {LANGS}

Требования:
- Для каждого языка верни список переводов в том же порядке, что и входной список.
- Формат ответа (JSON):
{
  "translations": {
    "<lang1>": ["...", "..."],
    "<lang2>": ["...", "..."]
  }
}"#;

/// base label -> language code -> translated label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationMap {
    entries: HashMap<String, HashMap<String, String>>,
}

impl TranslationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, base: &str, lang: &str, translated: &str) {
        self.entries
            .entry(base.to_string())
            .or_default()
            .insert(lang.to_string(), translated.to_string());
    }

    /// Translation of `base` into `lang`, or "" when missing.
    pub fn get(&self, base: &str, lang: &str) -> &str {
        self.entries
            .get(base)
            .and_then(|m| m.get(lang))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The vocabulary rendered in one language, position for position.
    pub fn column<'a>(&'a self, vocabulary: &'a Vocabulary, lang: &str) -> Vec<&'a str> {
        vocabulary.labels().iter().map(|l| self.get(l, lang)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|m| m.is_empty())
    }
}

#[derive(Deserialize)]
struct TranslationResponse {
    #[serde(default)]
    translations: serde_json::Map<String, serde_json::Value>,
}

pub fn build_prompt(vocabulary: &Vocabulary, langs: &[String]) -> String {
    USER_PROMPT_TEMPLATE
        .replace("{NUMBERED}", &vocabulary.numbered())
        .replace("{LANGS}", &langs.join(", "))
}

/// Decode a translation response into a map. Fails only when the response is
/// not JSON, or is not an object whose `translations` (if present) is an object.
pub fn parse_translations(
    content: &str,
    vocabulary: &Vocabulary,
    langs: &[String],
) -> Result<TranslationMap, ProblabelError> {
    let response: TranslationResponse = serde_json::from_str(strip_fences(content))
        .map_err(|e| ProblabelError::Translation(format!("malformed response: {e}")))?;

    let mut map = TranslationMap::new();
    for lang in langs {
        // Only requested languages are looked at; anything else under
        // `translations` is ignored whatever its shape.
        let items = match response.translations.get(lang) {
            Some(serde_json::Value::Array(items)) => items,
            Some(other) => {
                log::warn!("translation: {lang} is not a list ({other}), left empty");
                continue;
            }
            None => {
                log::warn!("translation: no entries for language {lang}");
                continue;
            }
        };
        if items.len() < vocabulary.len() {
            log::warn!(
                "translation: {lang} has {} of {} entries, rest left empty",
                items.len(),
                vocabulary.len()
            );
        }
        for (label, item) in vocabulary.labels().iter().zip(items) {
            let text = match item {
                serde_json::Value::String(s) => s.trim().to_string(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            map.insert(label, lang, &text);
        }
    }
    Ok(map)
}

/// Translate every vocabulary label into each of `langs`.
pub fn translate_vocabulary(
    oracle: &dyn Oracle,
    vocabulary: &Vocabulary,
    langs: &[String],
    limits: RequestLimits,
) -> Result<(TranslationMap, Usage), ProblabelError> {
    let prompt = build_prompt(vocabulary, langs);
    let completion = oracle
        .request(SYSTEM_PROMPT, &prompt, limits)
        .map_err(|e| ProblabelError::Translation(e.to_string()))?;
    let map = parse_translations(&completion.content, vocabulary, langs)?;
    Ok((map, completion.usage))
}
