use thiserror::Error;

pub mod catalog;
pub mod email_log;
pub mod quote;

pub use catalog::SqlCatalogRepository;
pub use email_log::{EmailLogEntry, SqlEmailLogRepository};
pub use quote::{
    MonthlyVolume, ProjectTypeVolume, QuoteListFilter, QuoteStatistics, SqlQuoteRepository,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("could not allocate a unique quote number after {attempts} attempts")]
    NumberExhausted { attempts: u32 },
}
