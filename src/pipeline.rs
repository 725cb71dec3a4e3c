//! Command handlers: classify a spreadsheet end to end, print category
//! distributions, merge a single label.

use crate::aggregate::{self, GroupLimits};
use crate::cache::FingerprintCache;
use crate::cli::{ClassifyArgs, DistributionArgs, MergeArgs};
use crate::config::{ProblabelConfig, resolve_api_key, validate_config};
use crate::dataset::{self, Dataset, detect_columns};
use crate::driver::{ClassifyParams, Classifier};
use crate::oracle::{ChatOracle, Oracle, RequestLimits, Usage};
use crate::translate::translate_vocabulary;
use crate::vocabulary::Vocabulary;
use crate::wide::add_wide_columns;
use crate::ProblabelError;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Instant;

static LANG_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]{2,3}$").unwrap());

/// Parse `--langs`: 1 or 2 distinct lowercase ISO codes.
pub fn parse_langs(raw: &str) -> Result<Vec<String>, ProblabelError> {
    let langs: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if langs.is_empty() || langs.len() > 2 {
        return Err(ProblabelError::Config(
            "--langs must name 1 or 2 ISO codes, e.g. --langs en,sw".into(),
        ));
    }
    if let Some(bad) = langs.iter().find(|l| !LANG_CODE.is_match(l)) {
        return Err(ProblabelError::Config(format!("invalid language code: {bad}")));
    }
    if langs.len() == 2 && langs[0] == langs[1] {
        return Err(ProblabelError::Config(format!("language {} given twice", langs[0])));
    }
    Ok(langs)
}

/// What a classify run produced.
#[derive(Debug, Clone)]
pub struct ClassifySummary {
    pub output: PathBuf,
    pub rows: usize,
    pub oracle_calls: usize,
    pub cache_hits: usize,
    pub failed_rows: usize,
    pub translate_usage: Usage,
    pub classify_usage: Usage,
}

impl ClassifySummary {
    pub fn total_usage(&self) -> Usage {
        self.translate_usage + self.classify_usage
    }
}

/// Apply CLI overrides on top of the loaded config.
fn effective_config(args: &ClassifyArgs, config: &ProblabelConfig) -> Result<ProblabelConfig, ProblabelError> {
    let mut classify = config.classify.clone();
    if let Some(n) = args.max_labels {
        classify.max_labels = n;
    }
    if let Some(n) = args.concurrency {
        classify.concurrency = n;
    }
    if let Some(p) = &args.cache {
        classify.cache_path = p.clone();
    }
    let effective = ProblabelConfig {
        oracle: config.oracle.clone(),
        classify,
        merge: config.merge.clone(),
    };
    validate_config(&effective)?;
    Ok(effective)
}

pub fn handle_classify(args: &ClassifyArgs, config: &ProblabelConfig) -> Result<ClassifySummary, ProblabelError> {
    let api_key = resolve_api_key(&config.oracle, args.api_key.as_deref())?;
    let oracle = ChatOracle::new(&config.oracle, api_key);
    run_classify(args, config, &oracle)
}

/// Translate, classify, optionally widen, save. Every configuration check
/// happens before the first oracle call.
pub fn run_classify(
    args: &ClassifyArgs,
    config: &ProblabelConfig,
    oracle: &dyn Oracle,
) -> Result<ClassifySummary, ProblabelError> {
    let config = effective_config(args, config)?;
    let langs = parse_langs(&args.langs)?;
    let vocabulary = Vocabulary::load(&args.problems_file)?;
    let mut data = Dataset::load(&args.input)?;
    let columns = detect_columns(&data, false)?;
    log::info!(
        "loaded {} rows, {} problems; text column {}",
        data.len(),
        vocabulary.len(),
        columns.message
    );

    log::info!("[1/4] translating problems list into {}", langs.join(", "));
    let t0 = Instant::now();
    let translate_limits = RequestLimits {
        temperature: config.oracle.temperature,
        max_tokens: config.oracle.translate_max_tokens,
    };
    let (translations, translate_usage) = translate_vocabulary(oracle, &vocabulary, &langs, translate_limits)?;
    log::info!("[1/4] done in {:.2}s | tokens: {translate_usage}", t0.elapsed().as_secs_f64());

    log::info!("[2/4] classifying texts");
    let t1 = Instant::now();
    let cache = FingerprintCache::open(&config.classify.cache_path);
    let params = ClassifyParams {
        max_labels: config.classify.max_labels,
        concurrency: config.classify.concurrency,
        limits: RequestLimits {
            temperature: config.oracle.temperature,
            max_tokens: config.oracle.classify_max_tokens,
        },
    };
    let classifier = Classifier::new(oracle, &vocabulary, &translations, &langs, params);
    let report = classifier.classify_dataset(&mut data, &columns.message, &cache)?;
    cache.flush();
    log::info!(
        "[2/4] done in {:.2}s | {} oracle calls, {} cache hits, {} failed | tokens: {}",
        t1.elapsed().as_secs_f64(),
        report.oracle_calls,
        report.cache_hits,
        report.failed_rows,
        report.usage
    );

    if args.wide {
        log::info!("[3/4] adding wide columns");
        add_wide_columns(&mut data, &vocabulary, &langs)?;
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| dataset::default_output_path(&args.input));
    log::info!("[4/4] saving {}", output.display());
    data.save(&output)?;

    let summary = ClassifySummary {
        output,
        rows: data.len(),
        oracle_calls: report.oracle_calls,
        cache_hits: report.cache_hits,
        failed_rows: report.failed_rows,
        translate_usage,
        classify_usage: report.usage,
    };
    log::info!("total tokens: {}", summary.total_usage());
    Ok(summary)
}

pub fn handle_distribution(args: &DistributionArgs, config: &ProblabelConfig) -> Result<(), ProblabelError> {
    let data = Dataset::load(&args.input)?;
    let columns = detect_columns(&data, true)?;
    let table = config.merge.synonym_table();

    if args.json {
        let limits = GroupLimits {
            max_messages: args.max_messages,
            max_chars: args.max_chars,
        };
        let groups = aggregate::group_messages(&data, &columns, &table, &config.merge.sentinel, limits)?;
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    let merged = aggregate::merged_labels(&data, &columns, &table)?;
    for (category, count) in aggregate::distribution(&merged, &config.merge.sentinel) {
        println!("{count}\t{category}");
    }
    Ok(())
}

pub fn handle_merge(args: &MergeArgs, config: &ProblabelConfig) {
    let table = config.merge.synonym_table();
    println!("{}", table.merge(&args.raw, args.secondary.as_deref()));
}
