mod open;
mod models;
mod insert;
mod query;
mod schema;

pub use open::Db;
pub use models::*;
pub use insert::*;
pub use query::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The named program does not exist at write time. Reported once per
    /// batch; the batch is skipped and nothing is written.
    #[error("program not found: {0}")]
    UnknownProgram(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
