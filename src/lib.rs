pub mod data;
pub mod export;
pub mod index;
pub mod loader;
pub mod session;
pub mod telemetry;
#[cfg(feature = "web")]
pub mod web;

pub use data::{LexiconRecord, NOT_AVAILABLE};
pub use index::{KeywordIndex, format_keyword};
pub use loader::{DEFAULT_SOURCE, DatasetCache, LoadError, Table, load_cached};
pub use session::{SelectionPhase, SelectionState};
