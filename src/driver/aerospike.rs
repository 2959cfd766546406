//! [`Driver`] backed by the official Aerospike client.
//!
//! The client API is blocking, every call runs on the blocking thread pool
//! of the tokio runtime.

use ::aerospike as asp;
use ::aerospike::Task;
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, trace};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{Driver, DriverError, IndexDefinition, IndexTask, Operation, RecordStream};
use crate::{
    params::Configurables,
    query::{self, IndexType, Statement},
    types::{BinMap, Key, Record, UserKey, Value},
};

pub struct AerospikeDriver {
    client: Arc<asp::Client>,
}

impl AerospikeDriver {
    pub async fn connect(params: &Configurables) -> Result<Self, DriverError> {
        let mut policy = asp::ClientPolicy::default();
        policy.timeout = Some(params.timeout);

        let address = params.address();
        let client = {
            let address = address.clone();
            tokio::task::spawn_blocking(move || asp::Client::new(&policy, &address))
                .await
                .map_err(|e| DriverError::Server(e.to_string()))?
        }
        .map_err(|e| DriverError::Connection {
            address: address.clone(),
            msg: e.to_string(),
        })?;

        info!("connected to aerospike cluster at {}", address);

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Runs a blocking client call off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T, DriverError>
    where
        F: FnOnce(&asp::Client) -> Result<T, DriverError> + Send + 'static,
        T: Send + 'static,
    {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || f(&client))
            .await
            .map_err(|e| DriverError::Server(e.to_string()))?
    }
}

fn map_error(err: asp::Error, key: Option<&Key>) -> DriverError {
    match err.kind() {
        asp::ErrorKind::ServerError(asp::ResultCode::KeyNotFoundError) => {
            DriverError::NotFound(key.map(ToString::to_string).unwrap_or_default())
        }
        asp::ErrorKind::ServerError(asp::ResultCode::Timeout) => DriverError::Timeout,
        _ => DriverError::Server(err.to_string()),
    }
}

fn to_asp_key(key: &Key) -> Result<asp::Key, DriverError> {
    let user_key = match key.user_key() {
        UserKey::Integer(v) => asp::Value::from(*v),
        UserKey::Text(v) => asp::Value::from(v.clone()),
    };
    asp::Key::new(key.namespace(), key.set(), user_key).map_err(|e| map_error(e, Some(key)))
}

fn to_asp_value(value: &Value) -> asp::Value {
    match value {
        Value::Nil => asp::Value::Nil,
        Value::Integer(v) => asp::Value::from(*v),
        Value::Float(v) => asp::Value::from(*v),
        Value::Text(v) => asp::Value::from(v.clone()),
        Value::Boolean(v) => asp::Value::from(*v),
        Value::Blob(v) => asp::Value::from(v.clone()),
        Value::List(items) => asp::Value::List(items.iter().map(to_asp_value).collect()),
        Value::Map(entries) => asp::Value::HashMap(
            entries
                .iter()
                .map(|(k, v)| (asp::Value::from(k.clone()), to_asp_value(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

fn from_asp_value(value: asp::Value) -> Value {
    match value {
        asp::Value::Nil => Value::Nil,
        asp::Value::Int(v) => Value::Integer(v),
        asp::Value::UInt(v) => Value::Integer(v as i64),
        asp::Value::Float(v) => Value::Float(f64::from(v)),
        asp::Value::String(v) => Value::Text(v),
        asp::Value::Bool(v) => Value::Boolean(v),
        asp::Value::Blob(v) => Value::Blob(v),
        asp::Value::List(items) => Value::List(items.into_iter().map(from_asp_value).collect()),
        asp::Value::HashMap(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), from_asp_value(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
        other => Value::Text(other.to_string()),
    }
}

fn from_asp_record(key: &Key, record: asp::Record) -> Record {
    let mut bins = BinMap::new();
    for (name, value) in record.bins {
        bins.insert_unchecked(name, from_asp_value(value));
    }
    Record::new(key.clone(), bins, record.generation)
}

/// Rebuilds our key from the one returned by a query. The store only sends
/// the user key back when it was stored with the record, the digest is
/// rendered otherwise.
fn key_from_asp(namespace: &str, set: &str, key: Option<&asp::Key>) -> Result<Key, DriverError> {
    let user_key = match key.and_then(|k| k.user_key.clone()) {
        Some(asp::Value::Int(v)) => UserKey::Integer(v),
        Some(asp::Value::String(v)) => UserKey::Text(v),
        _ => UserKey::Text(
            key.map(|k| format!("{:?}", k.digest))
                .unwrap_or_default(),
        ),
    };
    Ok(Key::try_new(namespace, set, user_key)?)
}

#[async_trait]
impl Driver for AerospikeDriver {
    fn name(&self) -> &'static str {
        "aerospike"
    }

    async fn put(&self, key: &Key, bins: &BinMap) -> Result<(), DriverError> {
        let key = key.clone();
        let values: Vec<(String, asp::Value)> = bins
            .iter()
            .map(|(name, value)| (name.clone(), to_asp_value(value)))
            .collect();

        self.blocking(move |client| {
            let asp_key = to_asp_key(&key)?;
            let bins: Vec<asp::Bin> = values
                .iter()
                .map(|(name, value)| asp::Bin::new(name, value.clone()))
                .collect();
            trace!("put {}", key);
            client
                .put(&asp::WritePolicy::default(), &asp_key, &bins)
                .map_err(|e| map_error(e, Some(&key)))
        })
        .await
    }

    async fn get(&self, key: &Key) -> Result<Record, DriverError> {
        let key = key.clone();
        self.blocking(move |client| {
            let asp_key = to_asp_key(&key)?;
            let record = client
                .get(&asp::ReadPolicy::default(), &asp_key, asp::Bins::All)
                .map_err(|e| map_error(e, Some(&key)))?;
            Ok(from_asp_record(&key, record))
        })
        .await
    }

    async fn batch_get(&self, keys: &[Key]) -> Result<Vec<Option<Record>>, DriverError> {
        let keys = keys.to_vec();
        self.blocking(move |client| {
            let reads = keys
                .iter()
                .map(|k| Ok(asp::BatchRead::new(to_asp_key(k)?, asp::Bins::All)))
                .collect::<Result<Vec<_>, DriverError>>()?;

            let results = client
                .batch_get(&asp::BatchPolicy::default(), reads)
                .map_err(|e| map_error(e, None))?;

            Ok(keys
                .iter()
                .zip(results)
                .map(|(key, read)| read.record.map(|r| from_asp_record(key, r)))
                .collect())
        })
        .await
    }

    async fn operate(&self, key: &Key, ops: &[Operation]) -> Result<Record, DriverError> {
        let key = key.clone();
        let ops = ops.to_vec();

        self.blocking(move |client| {
            let asp_key = to_asp_key(&key)?;
            let list_policy = asp::operations::lists::ListPolicy::default();

            // Operations borrow their bin names and values
            let values: Vec<(String, asp::Value)> = ops
                .iter()
                .map(|op| match op {
                    Operation::Put(bin) => (bin.name().to_owned(), to_asp_value(bin.value())),
                    Operation::Get(name) => (name.clone(), asp::Value::Nil),
                    Operation::ListAppend { bin, value } => (bin.clone(), to_asp_value(value)),
                })
                .collect();
            let bins: Vec<asp::Bin> = values
                .iter()
                .map(|(name, value)| asp::Bin::new(name, value.clone()))
                .collect();

            let asp_ops: Vec<asp::operations::Operation> = ops
                .iter()
                .zip(values.iter().zip(bins.iter()))
                .map(|(op, ((name, value), bin))| match op {
                    Operation::Put(_) => asp::operations::put(bin),
                    Operation::Get(_) => asp::operations::get_bin(name),
                    Operation::ListAppend { .. } => {
                        asp::operations::lists::append(&list_policy, name, value)
                    }
                })
                .collect();

            let record = client
                .operate(&asp::WritePolicy::default(), &asp_key, &asp_ops)
                .map_err(|e| map_error(e, Some(&key)))?;
            Ok(from_asp_record(&key, record))
        })
        .await
    }

    async fn delete(&self, key: &Key) -> Result<bool, DriverError> {
        let key = key.clone();
        self.blocking(move |client| {
            let asp_key = to_asp_key(&key)?;
            client
                .delete(&asp::WritePolicy::default(), &asp_key)
                .map_err(|e| map_error(e, Some(&key)))
        })
        .await
    }

    async fn create_index(
        &self,
        index: &IndexDefinition,
    ) -> Result<Box<dyn IndexTask>, DriverError> {
        let index = index.clone();
        self.blocking(move |client| {
            let index_type = match index.index_type {
                IndexType::Numeric => asp::IndexType::Numeric,
                IndexType::String => asp::IndexType::String,
            };

            let task = client
                .create_index(
                    &asp::WritePolicy::default(),
                    &index.namespace,
                    &index.set,
                    &index.bin,
                    &index.name,
                    index_type,
                )
                .map_err(|e| match e.kind() {
                    asp::ErrorKind::ServerError(asp::ResultCode::IndexFound) => {
                        DriverError::IndexAlreadyExists(index.name.clone())
                    }
                    _ => map_error(e, None),
                })?;

            debug!("index `{}` build started", index.name);
            Ok(Box::new(AerospikeIndexTask {
                task: Arc::new(task),
            }) as Box<dyn IndexTask>)
        })
        .await
    }

    async fn drop_index(
        &self,
        namespace: &str,
        set: &str,
        name: &str,
    ) -> Result<(), DriverError> {
        let (namespace, set, name) = (namespace.to_owned(), set.to_owned(), name.to_owned());
        self.blocking(move |client| {
            client
                .drop_index(&asp::WritePolicy::default(), &namespace, &set, &name)
                .map_err(|e| map_error(e, None))
        })
        .await
    }

    async fn query(&self, statement: Statement) -> Result<RecordStream, DriverError> {
        let results = self
            .blocking(move |client| {
                let bins = match &statement.bins {
                    Some(names) => asp::Bins::Some(names.clone()),
                    None => asp::Bins::All,
                };
                let mut stmt = asp::Statement::new(&statement.namespace, &statement.set, bins);

                if let Some(filter) = &statement.filter {
                    let asp_filter = match (filter.op(), filter.bounds()) {
                        (query::Op::Eq(Value::Text(v)), _) => {
                            asp::as_eq!(filter.bin(), v.clone())
                        }
                        (_, Some((begin, end))) => asp::as_range!(filter.bin(), begin, end),
                        // No integer satisfies the filter
                        _ => return Ok(Vec::new()),
                    };
                    stmt.add_filter(asp_filter);
                }

                let recordset = client
                    .query(&asp::QueryPolicy::default(), stmt)
                    .map_err(|e| map_error(e, None))?;

                let mut results = Vec::new();
                for item in &*recordset {
                    let item = item.map_err(|e| map_error(e, None)).and_then(|record| {
                        let key =
                            key_from_asp(&statement.namespace, &statement.set, record.key.as_ref())?;
                        Ok(from_asp_record(&key, record))
                    });
                    results.push(item);
                }
                Ok(results)
            })
            .await?;

        Ok(futures::stream::iter(results).boxed())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.blocking(|client| client.close().map_err(|e| map_error(e, None)))
            .await
    }
}

pub struct AerospikeIndexTask {
    task: Arc<asp::IndexTask>,
}

#[async_trait]
impl IndexTask for AerospikeIndexTask {
    /// Asks the server for the build status once.
    async fn is_done(&self) -> Result<bool, DriverError> {
        let task = self.task.clone();
        tokio::task::spawn_blocking(move || task.query_status())
            .await
            .map_err(|e| DriverError::Server(e.to_string()))?
            .map(build_complete)
            .map_err(|e| map_error(e, None))
    }
}

/// An index not yet visible on every node is still being built.
fn build_complete(status: asp::task::Status) -> bool {
    matches!(status, asp::task::Status::Complete)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_build_status() {
        assert!(build_complete(asp::task::Status::Complete));
        assert!(!build_complete(asp::task::Status::InProgress));
        assert!(!build_complete(asp::task::Status::NotFound));
    }
}
