//! Data model of the store as seen by the client: values, keys, bins and records.

mod key;
pub use key::*;

mod record;
pub use record::*;

mod timestamp;
pub use timestamp::*;

mod value;
pub use value::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("namespace cannot be empty")]
    EmptyNamespace,
    #[error("bin name cannot be empty")]
    EmptyBinName,
    #[error("bin name `{0}` exceeds the maximum bin name length")]
    BinNameTooLong(String),
    #[error("unsupported user key type `{0}`")]
    UnsupportedUserKey(&'static str),
}
