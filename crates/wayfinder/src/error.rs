use thiserror::Error;

#[derive(Error, Debug)]
pub enum WayfinderError {
    #[error("Query error: {0}")]
    Query(#[from] crate::query::QueryError),
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] crate::token::TokenizerError),
    #[error("Index error: {0}")]
    Index(#[from] crate::index::IndexError),
    #[error("Resolve error: {0}")]
    Resolve(#[from] crate::resolve::ResolveError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Init Logging error: {0}")]
    InitLogging(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WayfinderError>;
