//! Query primitives: secondary index definitions, filters and statements.

mod filter;
pub use filter::*;

mod statement;
pub use statement::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bad filter operation :: {0}")]
    Op(#[from] OpError),
}

/// Kind of values a secondary index covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    Numeric,
    String,
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::String => write!(f, "string"),
        }
    }
}
