pub mod aggregate;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod driver;
pub mod fingerprint;
pub mod normalize;
pub mod oracle;
pub mod pipeline;
pub mod translate;
pub mod vocabulary;
pub mod wide;

#[derive(Debug)]
pub enum ProblabelError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    Config(String),
    Oracle(String),
    Translation(String),
}

impl std::fmt::Display for ProblabelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProblabelError::Io(e) => write!(f, "io: {e}"),
            ProblabelError::Json(e) => write!(f, "json: {e}"),
            ProblabelError::Csv(e) => write!(f, "csv: {e}"),
            ProblabelError::Config(msg) => write!(f, "config: {msg}"),
            ProblabelError::Oracle(msg) => write!(f, "oracle: {msg}"),
            ProblabelError::Translation(msg) => write!(f, "translation: {msg}"),
        }
    }
}

impl std::error::Error for ProblabelError {}

impl From<std::io::Error> for ProblabelError {
    fn from(e: std::io::Error) -> Self {
        ProblabelError::Io(e)
    }
}

impl From<serde_json::Error> for ProblabelError {
    fn from(e: serde_json::Error) -> Self {
        ProblabelError::Json(e)
    }
}

impl From<csv::Error> for ProblabelError {
    fn from(e: csv::Error) -> Self {
        ProblabelError::Csv(e)
    }
}
