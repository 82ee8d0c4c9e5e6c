// Module Sentinel: multi-language source indexing core

pub mod config;
pub mod error;
pub mod index;
pub mod indexer;

pub use error::{PoolError, Result, SentinelError};
pub use index::{Language, ParseResult, Relationship, Symbol};
pub use indexer::{Indexer, ParseOptions, ParsePipeline};
