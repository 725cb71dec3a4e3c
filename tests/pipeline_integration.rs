use problabel::ProblabelError;
use problabel::cli::ClassifyArgs;
use problabel::config::ProblabelConfig;
use problabel::dataset::Dataset;
use problabel::oracle::{Completion, Oracle, RequestLimits, Usage};
use problabel::pipeline::run_classify;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Answers translation prompts with a fixed table and classification
/// prompts by keyword in the message text.
struct Routed {
    translate_calls: AtomicUsize,
    classify_calls: AtomicUsize,
}

impl Routed {
    fn new() -> Self {
        Self {
            translate_calls: AtomicUsize::new(0),
            classify_calls: AtomicUsize::new(0),
        }
    }
}

impl Oracle for Routed {
    fn request(&self, _system: &str, user: &str, _: RequestLimits) -> Result<Completion, ProblabelError> {
        let usage = Usage {
            prompt_tokens: 10,
            completion_tokens: 2,
            total_tokens: 12,
        };
        let content = if user.contains("\"translations\"") {
            self.translate_calls.fetch_add(1, Ordering::SeqCst);
            r#"{"translations": {"en": ["power outages", "housing cost"]}}"#
        } else if user.contains("Аренда") {
            self.classify_calls.fetch_add(1, Ordering::SeqCst);
            r#"{"problem_ids": [2, 1]}"#
        } else {
            self.classify_calls.fetch_add(1, Ordering::SeqCst);
            r#"{"problem_ids": [1]}"#
        };
        Ok(Completion {
            content: content.to_string(),
            usage,
        })
    }
}

fn setup(dir: &Path) -> ClassifyArgs {
    let input = dir.join("messages.csv");
    std::fs::write(
        &input,
        "Заголовок;Сообщение;Ссылка\n\
         a;Свет отключили на три дня;https://t.me/1\n\
         b;Аренда выросла, а свет дают по графику;https://t.me/2\n\
         a;Свет отключили на три дня;https://t.me/1\n\
         c;;https://t.me/3\n",
    )
    .unwrap();
    let problems = dir.join("problems.txt");
    std::fs::write(&problems, "перебои с электричеством\nстоимость жилья\n").unwrap();

    ClassifyArgs {
        input,
        problems_file: problems,
        langs: "en".into(),
        output: None,
        wide: false,
        max_labels: None,
        concurrency: None,
        cache: Some(dir.join("cache").join("classify_cache.json")),
        api_key: None,
    }
}

#[test]
fn classify_writes_label_columns() {
    let dir = TempDir::new().unwrap();
    let args = setup(dir.path());
    let oracle = Routed::new();

    let summary = run_classify(&args, &ProblabelConfig::default(), &oracle).unwrap();
    assert_eq!(summary.output, dir.path().join("messages_classified.csv"));
    // Duplicate headline dropped on load.
    assert_eq!(summary.rows, 3);
    assert_eq!(oracle.translate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(summary.oracle_calls, 2);
    assert_eq!(summary.total_usage().total_tokens, 36);

    let out = Dataset::load(&summary.output).unwrap();
    assert_eq!(
        out.column("problem_russ").unwrap(),
        vec!["перебои с электричеством", "стоимость жилья", ""]
    );
    assert_eq!(
        out.column("problem_russ_candidates").unwrap(),
        vec![
            "перебои с электричеством",
            "стоимость жилья|перебои с электричеством",
            ""
        ]
    );
    assert_eq!(
        out.column("problem_en").unwrap(),
        vec!["power outages", "housing cost", ""]
    );
    assert_eq!(
        out.column("problem_en_candidates").unwrap(),
        vec!["power outages", "housing cost|power outages", ""]
    );
}

#[test]
fn second_run_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let args = setup(dir.path());

    let first = Routed::new();
    run_classify(&args, &ProblabelConfig::default(), &first).unwrap();
    assert!(args.cache.as_ref().unwrap().exists());

    let second = Routed::new();
    let summary = run_classify(&args, &ProblabelConfig::default(), &second).unwrap();
    assert_eq!(second.classify_calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.oracle_calls, 0);
    assert_eq!(summary.cache_hits, 2);
    // Translation is never cached.
    assert_eq!(second.translate_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn wide_columns_and_custom_output() {
    let dir = TempDir::new().unwrap();
    let mut args = setup(dir.path());
    args.wide = true;
    args.concurrency = Some(3);
    args.output = Some(dir.path().join("out").join("wide.csv"));
    std::fs::create_dir_all(dir.path().join("out")).unwrap();

    let summary = run_classify(&args, &ProblabelConfig::default(), &Routed::new()).unwrap();
    let out = Dataset::load(&summary.output).unwrap();
    assert_eq!(
        out.column("ru_перебои с электричеством").unwrap(),
        vec!["True", "True", "False"]
    );
    assert_eq!(out.column("ru_стоимость жилья").unwrap(), vec!["False", "True", "False"]);
    assert_eq!(out.column("en_power outages").unwrap(), vec!["True", "True", "False"]);
}

#[test]
fn bad_langs_rejected_before_any_call() {
    let dir = TempDir::new().unwrap();
    let mut args = setup(dir.path());
    args.langs = "en,sw,fr".into();
    let oracle = Routed::new();

    let err = run_classify(&args, &ProblabelConfig::default(), &oracle).unwrap_err();
    assert!(matches!(err, ProblabelError::Config(_)));
    assert_eq!(oracle.translate_calls.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("messages_classified.csv").exists());
}

#[test]
fn empty_problems_file_rejected() {
    let dir = TempDir::new().unwrap();
    let args = setup(dir.path());
    std::fs::write(&args.problems_file, "\n  \n").unwrap();
    let oracle = Routed::new();

    let err = run_classify(&args, &ProblabelConfig::default(), &oracle).unwrap_err();
    assert!(matches!(err, ProblabelError::Config(_)));
    assert_eq!(oracle.translate_calls.load(Ordering::SeqCst), 0);
}

/// Returns prose for the translation prompt; counts classification calls.
struct UnreadableTranslation {
    classify_calls: AtomicUsize,
}

impl Oracle for UnreadableTranslation {
    fn request(&self, _system: &str, user: &str, _: RequestLimits) -> Result<Completion, ProblabelError> {
        let content = if user.contains("\"translations\"") {
            "Here are your translations: power outages, housing cost."
        } else {
            self.classify_calls.fetch_add(1, Ordering::SeqCst);
            r#"{"problem_ids": [1]}"#
        };
        Ok(Completion {
            content: content.to_string(),
            usage: Usage::default(),
        })
    }
}

#[test]
fn unreadable_translation_aborts_run() {
    let dir = TempDir::new().unwrap();
    let args = setup(dir.path());
    let oracle = UnreadableTranslation {
        classify_calls: AtomicUsize::new(0),
    };

    let err = run_classify(&args, &ProblabelConfig::default(), &oracle).unwrap_err();
    assert!(matches!(err, ProblabelError::Translation(_)));
    assert_eq!(oracle.classify_calls.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("messages_classified.csv").exists());
    assert!(!args.cache.as_ref().unwrap().exists());
}
