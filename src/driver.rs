//! Classification driver: cache lookup, oracle call on miss, per-language
//! label columns, usage accounting.
//!
//! Rows are independent. With `concurrency > 1` a bounded rayon pool resolves
//! rows in parallel and returns one `Resolved` per row; the calling thread is
//! the only one that writes to the cache or sums usage.

use crate::cache::FingerprintCache;
use crate::classify::{ClassifyOutcome, PromptTranslations, classify_one};
use crate::dataset::{self, Dataset};
use crate::fingerprint::Fingerprint;
use crate::oracle::{Oracle, RequestLimits, Usage};
use crate::translate::TranslationMap;
use crate::vocabulary::Vocabulary;
use crate::ProblabelError;
use rayon::prelude::*;

/// Labels for one language: all candidates in relevance order, plus the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelColumns {
    pub primary: String,
    pub candidates: Vec<String>,
}

impl LabelColumns {
    /// Empty strings are positions with no label and are dropped here.
    fn from_positions<'a>(positions: impl Iterator<Item = &'a str>) -> Self {
        let candidates: Vec<String> = positions
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let primary = candidates.first().cloned().unwrap_or_default();
        Self { primary, candidates }
    }

    /// `|`-joined candidates, the spreadsheet representation.
    pub fn joined(&self) -> String {
        self.candidates.join("|")
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Label assignment for one row. `langs[i]` lines up with the driver's languages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowLabels {
    pub base: LabelColumns,
    pub langs: Vec<LabelColumns>,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassifyParams {
    pub max_labels: usize,
    pub concurrency: usize,
    pub limits: RequestLimits,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default)]
pub struct ClassifyReport {
    pub rows: Vec<RowLabels>,
    pub usage: Usage,
    pub oracle_calls: usize,
    pub cache_hits: usize,
    pub blank_rows: usize,
    /// Rows whose oracle call failed or returned something undecodable.
    pub failed_rows: usize,
}

/// How one row's ids were obtained.
enum Resolved {
    Blank,
    Hit(Vec<usize>),
    Fresh {
        fingerprint: Fingerprint,
        ids: Vec<usize>,
        usage: Usage,
    },
    Failed {
        usage: Usage,
    },
}

pub struct Classifier<'a> {
    oracle: &'a dyn Oracle,
    vocabulary: &'a Vocabulary,
    translations: &'a TranslationMap,
    langs: &'a [String],
    params: ClassifyParams,
}

impl<'a> Classifier<'a> {
    pub fn new(
        oracle: &'a dyn Oracle,
        vocabulary: &'a Vocabulary,
        translations: &'a TranslationMap,
        langs: &'a [String],
        params: ClassifyParams,
    ) -> Self {
        Self {
            oracle,
            vocabulary,
            translations,
            langs,
            params,
        }
    }

    /// Classify every text. `None` and blank texts get empty labels without
    /// touching the cache or the oracle.
    pub fn classify_texts<S: AsRef<str> + Sync>(
        &self,
        texts: &[Option<S>],
        cache: &FingerprintCache,
    ) -> ClassifyReport {
        let mut report = ClassifyReport {
            rows: vec![self.label_row(&[]); texts.len()],
            ..Default::default()
        };

        let workers = self.params.concurrency.max(1).min(texts.len());
        if workers <= 1 {
            self.classify_in_order(texts, cache, &mut report);
            return report;
        }

        let pool = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool,
            Err(e) => {
                log::warn!("cannot start {workers} workers ({e}), classifying sequentially");
                self.classify_in_order(texts, cache, &mut report);
                return report;
            }
        };

        log::debug!("classifying {} rows with {workers} workers", texts.len());
        let resolved: Vec<Resolved> = pool.install(|| {
            texts
                .par_iter()
                .map(|text| self.resolve(text.as_ref().map(AsRef::as_ref), cache))
                .collect()
        });
        for (i, r) in resolved.into_iter().enumerate() {
            self.absorb(&mut report, i, r, cache);
        }
        report
    }

    /// One row at a time; a repeated text later in the run hits the cache.
    fn classify_in_order<S: AsRef<str>>(
        &self,
        texts: &[Option<S>],
        cache: &FingerprintCache,
        report: &mut ClassifyReport,
    ) {
        for (i, text) in texts.iter().enumerate() {
            let resolved = self.resolve(text.as_ref().map(AsRef::as_ref), cache);
            self.absorb(report, i, resolved, cache);
        }
    }

    /// Classify `text_column` of `dataset` and append the label columns.
    pub fn classify_dataset(
        &self,
        dataset: &mut Dataset,
        text_column: &str,
        cache: &FingerprintCache,
    ) -> Result<ClassifyReport, ProblabelError> {
        let texts: Vec<Option<String>> = dataset
            .column(text_column)
            .ok_or_else(|| ProblabelError::Config(format!("no column named {text_column}")))?
            .into_iter()
            .map(|s| Some(s.to_string()))
            .collect();

        let report = self.classify_texts(&texts, cache);
        self.write_columns(dataset, &report.rows)?;
        Ok(report)
    }

    fn write_columns(&self, dataset: &mut Dataset, rows: &[RowLabels]) -> Result<(), ProblabelError> {
        dataset.set_column(
            dataset::BASE_CANDIDATES_COLUMN,
            rows.iter().map(|r| r.base.joined()).collect(),
        )?;
        dataset.set_column(
            dataset::BASE_PRIMARY_COLUMN,
            rows.iter().map(|r| r.base.primary.clone()).collect(),
        )?;
        for (l, lang) in self.langs.iter().enumerate() {
            dataset.set_column(
                &dataset::lang_candidates_column(lang),
                rows.iter().map(|r| r.langs[l].joined()).collect(),
            )?;
            dataset.set_column(
                &dataset::lang_primary_column(lang),
                rows.iter().map(|r| r.langs[l].primary.clone()).collect(),
            )?;
        }
        Ok(())
    }

    /// Runs on worker threads: reads the cache, never writes it.
    fn resolve(&self, text: Option<&str>, cache: &FingerprintCache) -> Resolved {
        let text = match text.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Resolved::Blank,
        };

        let fingerprint = Fingerprint::compute(text, self.vocabulary);
        if let Some(ids) = cache.lookup(&fingerprint) {
            return Resolved::Hit(ids);
        }

        let prompt_translations = PromptTranslations {
            map: self.translations,
            langs: self.langs,
        };
        let translations = (!self.langs.is_empty() && !self.translations.is_empty())
            .then_some(&prompt_translations);

        match classify_one(
            self.oracle,
            text,
            self.vocabulary,
            translations,
            self.params.max_labels,
            self.params.limits,
        ) {
            Ok((ClassifyOutcome::Labels(mut ids), usage)) => {
                ids.truncate(self.params.max_labels);
                Resolved::Fresh {
                    fingerprint,
                    ids,
                    usage,
                }
            }
            Ok((ClassifyOutcome::Malformed(reason), usage)) => {
                log::warn!("row {fingerprint}: malformed classification response ({reason})");
                Resolved::Failed { usage }
            }
            Err(e) => {
                log::warn!("row {fingerprint}: classification failed ({e})");
                Resolved::Failed {
                    usage: Usage::default(),
                }
            }
        }
    }

    /// The single merge point for results, cache writes, and usage.
    fn absorb(&self, report: &mut ClassifyReport, row: usize, resolved: Resolved, cache: &FingerprintCache) {
        match resolved {
            Resolved::Blank => report.blank_rows += 1,
            Resolved::Hit(ids) => {
                report.cache_hits += 1;
                report.rows[row] = self.label_row(&ids);
            }
            Resolved::Fresh {
                fingerprint,
                ids,
                usage,
            } => {
                report.oracle_calls += 1;
                report.usage += usage;
                report.rows[row] = self.label_row(&ids);
                cache.store(fingerprint, ids);
            }
            Resolved::Failed { usage } => {
                report.oracle_calls += 1;
                report.failed_rows += 1;
                report.usage += usage;
            }
        }
    }

    /// Map ids to base labels (dropping unknown ids) and then to each language.
    pub fn label_row(&self, ids: &[usize]) -> RowLabels {
        let base_labels: Vec<&str> = ids.iter().filter_map(|&id| self.vocabulary.label(id)).collect();
        let langs = self
            .langs
            .iter()
            .map(|lang| {
                LabelColumns::from_positions(base_labels.iter().map(|l| self.translations.get(l, lang)))
            })
            .collect();
        RowLabels {
            base: LabelColumns::from_positions(base_labels.iter().copied()),
            langs,
        }
    }
}
