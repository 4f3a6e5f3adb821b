use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("array filter overflow: {count} identifiers requested, at most 26 available")]
    ArrayFilterOverflow { count: usize },

    #[error("invalid watcher name: {0:?}")]
    InvalidWatcherName(String),

    #[error("watcher construction failed: {0}")]
    WatcherConstruction(String),

    #[error("watcher state error: {0}")]
    WatcherState(String),

    #[error("invalid watch options: {0}")]
    InvalidWatchOptions(String),

    #[error("update has no operations")]
    EmptyUpdate,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
