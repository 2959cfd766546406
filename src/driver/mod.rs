//! # Driver Module
//!
//! The [`Driver`] trait is the only seam between the demos and the store.
//! Each method maps onto one call of the store client API: single record
//! reads and writes, batch reads, multi-operation transactions on a record,
//! secondary index management and queries.
//!
//! Two implementations are provided:
//!
//! * [`MemoryDriver`]: an in-process store honoring the same contract, used by
//!   default and by the tests.
//! * `AerospikeDriver` (cargo feature `aerospike`): delegates to the official
//!   client crate.

use async_trait::async_trait;
use futures::stream::BoxStream;
use log::info;
use std::sync::Arc;

use crate::{
    params::{Backend, Configurables},
    query::{IndexType, Statement},
    types::{Bin, BinMap, Key, Record, Value},
};

mod error;
pub use error::*;

mod memory;
pub use memory::*;

#[cfg(feature = "aerospike")]
mod aerospike;
#[cfg(feature = "aerospike")]
pub use self::aerospike::*;

/// Stream of query results. Each item is a record or the error the store
/// reported for it.
pub type RecordStream = BoxStream<'static, Result<Record, DriverError>>;

pub type DriverRef = Arc<dyn Driver>;

/// A single step of an [`Driver::operate`] transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Writes a bin.
    Put(Bin),
    /// Reads a bin back into the result record.
    Get(String),
    /// Appends an item to a list bin, creating the list when the bin is
    /// absent. Returns the list size.
    ListAppend { bin: String, value: Value },
}

impl Operation {
    pub fn list_append(bin: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ListAppend {
            bin: bin.into(),
            value: value.into(),
        }
    }

    pub fn bin_name(&self) -> &str {
        match self {
            Self::Put(bin) => bin.name(),
            Self::Get(name) => name,
            Self::ListAppend { bin, .. } => bin,
        }
    }
}

/// Describes a secondary index over a bin of a set.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub namespace: String,
    pub set: String,
    pub name: String,
    pub bin: String,
    pub index_type: IndexType,
}

impl IndexDefinition {
    pub fn new(
        namespace: impl Into<String>,
        set: impl Into<String>,
        name: impl Into<String>,
        bin: impl Into<String>,
        index_type: IndexType,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
            name: name.into(),
            bin: bin.into(),
            index_type,
        }
    }
}

/// Handle on an asynchronous index build running on the store.
#[async_trait]
pub trait IndexTask: Send + Sync {
    /// Returns `true` once the index is fully built.
    async fn is_done(&self) -> Result<bool, DriverError>;
}

#[async_trait]
pub trait Driver: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Creates or updates a record. Bins not named in `bins` are left
    /// untouched, bins set to [`Value::Nil`] are removed.
    async fn put(&self, key: &Key, bins: &BinMap) -> Result<(), DriverError>;

    /// Reads all bins of a record.
    async fn get(&self, key: &Key) -> Result<Record, DriverError>;

    /// Reads several records at once. The result holds one entry per key,
    /// in the same order, [`None`] for missing records.
    async fn batch_get(&self, keys: &[Key]) -> Result<Vec<Option<Record>>, DriverError>;

    /// Applies `ops` to a single record atomically.
    async fn operate(&self, key: &Key, ops: &[Operation]) -> Result<Record, DriverError>;

    /// Removes a record, returns whether it existed.
    async fn delete(&self, key: &Key) -> Result<bool, DriverError>;

    async fn create_index(
        &self,
        index: &IndexDefinition,
    ) -> Result<Box<dyn IndexTask>, DriverError>;

    async fn drop_index(&self, namespace: &str, set: &str, name: &str)
    -> Result<(), DriverError>;

    /// Runs a query. A filtered statement requires a secondary index on the
    /// filter bin.
    async fn query(&self, statement: Statement) -> Result<RecordStream, DriverError>;

    /// Returns every record of a set.
    async fn scan(&self, namespace: &str, set: &str) -> Result<RecordStream, DriverError> {
        self.query(Statement::new(namespace, set)).await
    }

    async fn close(&self) -> Result<(), DriverError>;
}

/// Opens the backend selected in `params`.
pub async fn connect(params: &Configurables) -> Result<DriverRef, DriverError> {
    info!("connecting to {} backend ({})", params.backend, params.address());

    match params.backend {
        Backend::Memory => Ok(Arc::new(MemoryDriver::new([params.namespace.as_str()]))),
        #[cfg(feature = "aerospike")]
        Backend::Aerospike => Ok(Arc::new(AerospikeDriver::connect(params).await?)),
        #[cfg(not(feature = "aerospike"))]
        Backend::Aerospike => Err(DriverError::BackendUnavailable(params.backend.to_string())),
    }
}
