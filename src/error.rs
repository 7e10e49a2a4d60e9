use thiserror::Error;

/// Exit status reported when the user interrupts a flow.
pub const INTERRUPTED_EXIT: i32 = 130;

#[derive(Debug, Error)]
pub enum TermiError {
    #[error("interrupted")]
    Interrupted,

    #[error("history store: {0}")]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] toml::ser::Error),
}

impl TermiError {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, TermiError::Interrupted)
    }
}

pub type Result<T> = std::result::Result<T, TermiError>;
