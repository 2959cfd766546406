//! In-process implementation of [`Driver`].
//!
//! Records live in one ordered map per namespace. Secondary indexes are kept
//! up to date on every write, so filtered queries are served from the index
//! the same way the server does it, not by scanning the set.

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

use super::{Driver, DriverError, IndexDefinition, IndexTask, Operation, RecordStream};
use crate::{
    query::{self, Filter, IndexType, Statement},
    types::{BinMap, Key, Record, Value},
};

#[derive(Debug, Clone)]
struct StoredRecord {
    bins: BinMap,
    generation: u32,
}

/// Index content, bin value to the keys of the records holding it.
#[derive(Debug)]
enum IndexEntries {
    Numeric(BTreeMap<i64, BTreeSet<Key>>),
    String(BTreeMap<String, BTreeSet<Key>>),
}

impl IndexEntries {
    fn new(index_type: IndexType) -> Self {
        match index_type {
            IndexType::Numeric => Self::Numeric(BTreeMap::new()),
            IndexType::String => Self::String(BTreeMap::new()),
        }
    }

    fn insert(&mut self, value: &Value, key: &Key) {
        match (self, value) {
            (Self::Numeric(map), Value::Integer(v)) => {
                map.entry(*v).or_default().insert(key.clone());
            }
            (Self::String(map), Value::Text(v)) => {
                map.entry(v.clone()).or_default().insert(key.clone());
            }
            _ => {}
        }
    }

    fn remove(&mut self, value: &Value, key: &Key) {
        match (self, value) {
            (Self::Numeric(map), Value::Integer(v)) => {
                if let Some(keys) = map.get_mut(v) {
                    keys.remove(key);
                    if keys.is_empty() {
                        map.remove(v);
                    }
                }
            }
            (Self::String(map), Value::Text(v)) => {
                if let Some(keys) = map.get_mut(v) {
                    keys.remove(key);
                    if keys.is_empty() {
                        map.remove(v);
                    }
                }
            }
            _ => {}
        }
    }

    fn lookup(&self, filter: &Filter) -> Vec<Key> {
        match (self, filter.op()) {
            (Self::String(map), query::Op::Eq(Value::Text(v))) => map
                .get(v)
                .map(|keys| keys.iter().cloned().collect())
                .unwrap_or_default(),
            (Self::Numeric(map), _) => match filter.bounds() {
                Some((min, max)) if min <= max => map
                    .range(min..=max)
                    .flat_map(|(_, keys)| keys.iter().cloned())
                    .collect(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

#[derive(Debug)]
struct SecondaryIndex {
    def: IndexDefinition,
    entries: IndexEntries,
}

impl SecondaryIndex {
    fn covers(&self, key: &Key) -> bool {
        self.def.set == key.set()
    }
}

#[derive(Debug, Default)]
struct Namespace {
    records: BTreeMap<Key, StoredRecord>,
    indexes: HashMap<String, SecondaryIndex>,
}

impl Namespace {
    /// Replaces the stored content of `key`, keeping indexes in sync.
    /// An empty bin map removes the record.
    fn store(&mut self, key: &Key, bins: BinMap, generation: u32) {
        let old = self.records.remove(key);

        for index in self.indexes.values_mut().filter(|i| i.covers(key)) {
            if let Some(v) = old.as_ref().and_then(|r| r.bins.get(&index.def.bin)) {
                index.entries.remove(v, key);
            }
            if let Some(v) = bins.get(&index.def.bin) {
                index.entries.insert(v, key);
            }
        }

        if !bins.is_empty() {
            self.records
                .insert(key.clone(), StoredRecord { bins, generation });
        }
    }

    fn find_index(&self, statement: &Statement, filter: &Filter) -> Option<&SecondaryIndex> {
        self.indexes.values().find(|i| {
            i.def.set == statement.set
                && i.def.bin == filter.bin()
                && i.def.index_type == filter.index_type()
        })
    }
}

#[derive(Debug, Default)]
struct State {
    namespaces: HashMap<String, Namespace>,
    closed: bool,
}

impl State {
    fn namespace(&self, name: &str) -> Result<&Namespace, DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.namespaces
            .get(name)
            .ok_or_else(|| DriverError::InvalidNamespace(name.to_owned()))
    }

    fn namespace_mut(&mut self, name: &str) -> Result<&mut Namespace, DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.namespaces
            .get_mut(name)
            .ok_or_else(|| DriverError::InvalidNamespace(name.to_owned()))
    }
}

/// Store living entirely in the current process.
///
/// Only the namespaces given at construction exist, operations on any other
/// namespace fail with [`DriverError::InvalidNamespace`].
#[derive(Debug)]
pub struct MemoryDriver {
    state: RwLock<State>,
    index_build_polls: u32,
}

impl MemoryDriver {
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let namespaces = namespaces
            .into_iter()
            .map(|ns| (ns.into(), Namespace::default()))
            .collect();

        Self {
            state: RwLock::new(State {
                namespaces,
                closed: false,
            }),
            index_build_polls: 0,
        }
    }

    /// Number of status checks an index build reports as in progress before
    /// completing.
    pub fn with_index_build_polls(mut self, polls: u32) -> Self {
        self.index_build_polls = polls;
        self
    }

    /// Number of records stored in a set.
    pub async fn set_len(&self, namespace: &str, set: &str) -> Result<usize, DriverError> {
        let state = self.state.read().await;
        let ns = state.namespace(namespace)?;
        Ok(ns.records.keys().filter(|k| k.set() == set).count())
    }
}

fn to_record(key: &Key, stored: &StoredRecord) -> Record {
    Record::new(key.clone(), stored.bins.clone(), stored.generation)
}

fn project(mut record: Record, bins: Option<&[String]>) -> Record {
    if let Some(selected) = bins {
        let mut projected = BinMap::new();
        for (name, value) in record.bins {
            if selected.contains(&name) {
                projected.insert_unchecked(name, value);
            }
        }
        record.bins = projected;
    }
    record
}

fn apply_ops(
    bins: &mut BinMap,
    ops: &[Operation],
    result: &mut BinMap,
) -> Result<(), DriverError> {
    for op in ops {
        match op {
            Operation::Put(bin) => {
                if bin.value().is_nil() {
                    bins.remove(bin.name());
                } else {
                    bins.insert_unchecked(bin.name().to_owned(), bin.value().clone());
                }
            }
            Operation::Get(name) => {
                let value = bins.get(name).cloned().unwrap_or(Value::Nil);
                result.insert_unchecked(name.clone(), value);
            }
            Operation::ListAppend { bin, value } => {
                let size = match bins.get_mut(bin) {
                    Some(Value::List(items)) => {
                        items.push(value.clone());
                        items.len()
                    }
                    Some(other) => {
                        return Err(DriverError::BinTypeMismatch {
                            bin: bin.clone(),
                            expected: "list",
                            found: other.type_name(),
                        });
                    }
                    None => {
                        bins.insert_unchecked(bin.clone(), Value::List(vec![value.clone()]));
                        1
                    }
                };
                result.insert_unchecked(bin.clone(), Value::Integer(size as i64));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, key: &Key, bins: &BinMap) -> Result<(), DriverError> {
        let mut state = self.state.write().await;
        let ns = state.namespace_mut(key.namespace())?;

        let (mut merged, generation) = match ns.records.get(key) {
            Some(stored) => (stored.bins.clone(), stored.generation + 1),
            None => (BinMap::new(), 1),
        };

        for (name, value) in bins.iter() {
            if value.is_nil() {
                merged.remove(name);
            } else {
                merged.insert_unchecked(name.clone(), value.clone());
            }
        }

        trace!("put {} (generation {})", key, generation);
        ns.store(key, merged, generation);
        Ok(())
    }

    async fn get(&self, key: &Key) -> Result<Record, DriverError> {
        let state = self.state.read().await;
        let ns = state.namespace(key.namespace())?;

        ns.records
            .get(key)
            .map(|stored| to_record(key, stored))
            .ok_or_else(|| DriverError::NotFound(key.to_string()))
    }

    async fn batch_get(&self, keys: &[Key]) -> Result<Vec<Option<Record>>, DriverError> {
        let state = self.state.read().await;

        keys.iter()
            .map(|key| {
                let ns = state.namespace(key.namespace())?;
                Ok(ns.records.get(key).map(|stored| to_record(key, stored)))
            })
            .collect()
    }

    async fn operate(&self, key: &Key, ops: &[Operation]) -> Result<Record, DriverError> {
        let mut state = self.state.write().await;
        let ns = state.namespace_mut(key.namespace())?;

        let (mut bins, generation) = match ns.records.get(key) {
            Some(stored) => (stored.bins.clone(), stored.generation),
            None => (BinMap::new(), 0),
        };

        let mut result = BinMap::new();
        apply_ops(&mut bins, ops, &mut result)?;

        let modifies = ops.iter().any(|op| !matches!(op, Operation::Get(_)));
        let generation = if modifies { generation + 1 } else { generation };

        if modifies {
            ns.store(key, bins, generation);
        } else if generation == 0 {
            return Err(DriverError::NotFound(key.to_string()));
        }

        Ok(Record::new(key.clone(), result, generation))
    }

    async fn delete(&self, key: &Key) -> Result<bool, DriverError> {
        let mut state = self.state.write().await;
        let ns = state.namespace_mut(key.namespace())?;

        let existed = ns.records.contains_key(key);
        ns.store(key, BinMap::new(), 0);
        Ok(existed)
    }

    async fn create_index(
        &self,
        index: &IndexDefinition,
    ) -> Result<Box<dyn IndexTask>, DriverError> {
        let mut state = self.state.write().await;
        let ns = state.namespace_mut(&index.namespace)?;

        if ns.indexes.contains_key(&index.name) {
            return Err(DriverError::IndexAlreadyExists(index.name.clone()));
        }

        let mut entries = IndexEntries::new(index.index_type);
        for (key, stored) in ns.records.iter().filter(|(k, _)| k.set() == index.set) {
            if let Some(v) = stored.bins.get(&index.bin) {
                entries.insert(v, key);
            }
        }

        debug!(
            "created {} index `{}` on {}.{} bin `{}`",
            index.index_type, index.name, index.namespace, index.set, index.bin
        );

        ns.indexes.insert(
            index.name.clone(),
            SecondaryIndex {
                def: index.clone(),
                entries,
            },
        );

        Ok(Box::new(MemoryIndexTask {
            pending_polls: Arc::new(AtomicU32::new(self.index_build_polls)),
        }))
    }

    async fn drop_index(
        &self,
        namespace: &str,
        _set: &str,
        name: &str,
    ) -> Result<(), DriverError> {
        let mut state = self.state.write().await;
        let ns = state.namespace_mut(namespace)?;
        ns.indexes.remove(name);
        Ok(())
    }

    async fn query(&self, statement: Statement) -> Result<RecordStream, DriverError> {
        let state = self.state.read().await;
        let ns = state.namespace(&statement.namespace)?;

        let records: Vec<Record> = match &statement.filter {
            Some(filter) => {
                let index = ns.find_index(&statement, filter).ok_or_else(|| {
                    DriverError::IndexNotFound {
                        namespace: statement.namespace.clone(),
                        set: statement.set.clone(),
                        bin: filter.bin().to_owned(),
                    }
                })?;
                trace!("query {} served by index `{}`", statement, index.def.name);

                index
                    .entries
                    .lookup(filter)
                    .iter()
                    .filter_map(|key| ns.records.get(key).map(|s| to_record(key, s)))
                    .collect()
            }
            None => ns
                .records
                .iter()
                .filter(|(k, _)| k.set() == statement.set)
                .map(|(k, s)| to_record(k, s))
                .collect(),
        };

        let bins = statement.bins.clone();
        let results: Vec<Result<Record, DriverError>> = records
            .into_iter()
            .map(|r| Ok(project(r, bins.as_deref())))
            .collect();

        Ok(futures::stream::iter(results).boxed())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut state = self.state.write().await;
        state.closed = true;
        Ok(())
    }
}

/// Build status of an index of a [`MemoryDriver`].
pub struct MemoryIndexTask {
    /// Status checks left before the build is reported as complete.
    pending_polls: Arc<AtomicU32>,
}

#[async_trait]
impl IndexTask for MemoryIndexTask {
    async fn is_done(&self) -> Result<bool, DriverError> {
        let previous = self
            .pending_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        Ok(previous.is_err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn key(user_key: impl Into<crate::types::UserKey>) -> Key {
        Key::try_new("test", "demo", user_key).unwrap()
    }

    #[tokio::test]
    async fn put_merges_bins() {
        let driver = MemoryDriver::new(["test"]);
        let k = key("a");

        driver
            .put(&k, &BinMap::new().with("x", 1).unwrap().with("y", 2).unwrap())
            .await
            .unwrap();
        driver
            .put(&k, &BinMap::new().with("y", 3).unwrap().with("x", Value::Nil).unwrap())
            .await
            .unwrap();

        let record = driver.get(&k).await.unwrap();
        assert_eq!(record.bins.len(), 1);
        assert_eq!(record.bin("y"), Some(&Value::Integer(3)));
        assert_eq!(record.generation, 2);
    }

    #[tokio::test]
    async fn get_missing_record() {
        let driver = MemoryDriver::new(["test"]);
        let err = driver.get(&key("missing")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn unknown_namespace() {
        let driver = MemoryDriver::new(["test"]);
        let k = Key::try_new("bar", "demo", 1).unwrap();
        assert!(matches!(
            driver.get(&k).await,
            Err(DriverError::InvalidNamespace(ns)) if ns == "bar"
        ));
    }

    #[tokio::test]
    async fn batch_get_keeps_order_and_gaps() {
        let driver = MemoryDriver::new(["test"]);
        driver
            .put(&key(0), &BinMap::new().with("id", 0).unwrap())
            .await
            .unwrap();
        driver
            .put(&key(2), &BinMap::new().with("id", 2).unwrap())
            .await
            .unwrap();

        let records = driver
            .batch_get(&[key(2), key(1), key(0)])
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].as_ref().unwrap().bin("id"), Some(&Value::Integer(2)));
        assert!(records[1].is_none());
        assert_eq!(records[2].as_ref().unwrap().bin("id"), Some(&Value::Integer(0)));
    }

    #[tokio::test]
    async fn list_append() {
        let driver = MemoryDriver::new(["test"]);
        let k = key("list-demo");
        driver
            .put(&k, &BinMap::new().with("numbers", vec![1, 2, 3]).unwrap())
            .await
            .unwrap();

        let result = driver
            .operate(&k, &[Operation::list_append("numbers", 4)])
            .await
            .unwrap();
        assert_eq!(result.bin("numbers"), Some(&Value::Integer(4)));

        let record = driver.get(&k).await.unwrap();
        assert_eq!(record.bin("numbers"), Some(&Value::from(vec![1, 2, 3, 4])));
    }

    #[tokio::test]
    async fn list_append_creates_record_and_rejects_scalars() {
        let driver = MemoryDriver::new(["test"]);
        let k = key("fresh");

        driver
            .operate(&k, &[Operation::list_append("items", "a")])
            .await
            .unwrap();
        assert_eq!(
            driver.get(&k).await.unwrap().bin("items"),
            Some(&Value::from(vec!["a"]))
        );

        driver
            .put(&k, &BinMap::new().with("scalar", 1).unwrap())
            .await
            .unwrap();
        let err = driver
            .operate(&k, &[Operation::list_append("scalar", 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::BinTypeMismatch { found: "integer", .. }));
    }

    #[tokio::test]
    async fn operate_get_on_missing_record() {
        let driver = MemoryDriver::new(["test"]);
        let err = driver
            .operate(&key("nope"), &[Operation::Get("x".into())])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn index_query_range() {
        let driver = MemoryDriver::new(["test"]);
        for age in 20..30 {
            driver
                .put(&key(age), &BinMap::new().with("age", age).unwrap())
                .await
                .unwrap();
        }
        // Not covered by a numeric index
        driver
            .put(&key("str"), &BinMap::new().with("age", "27").unwrap())
            .await
            .unwrap();

        let index = IndexDefinition::new("test", "demo", "age_index", "age", IndexType::Numeric);
        let task = driver.create_index(&index).await.unwrap();
        assert!(task.is_done().await.unwrap());

        // Written after the index exists
        driver
            .put(&key(99), &BinMap::new().with("age", 99).unwrap())
            .await
            .unwrap();

        let stmt = Statement::new("test", "demo").with_filter(Filter::range("age", 25, 100).unwrap());
        let records: Vec<Record> = driver.query(stmt).await.unwrap().try_collect().await.unwrap();

        let mut ages: Vec<i64> = records
            .iter()
            .filter_map(|r| r.bin("age").and_then(Value::as_integer))
            .collect();
        ages.sort();
        assert_eq!(ages, vec![25, 26, 27, 28, 29, 99]);
        assert!(records.iter().all(|r| r.bins.len() == 1));
    }

    #[tokio::test]
    async fn index_follows_updates_and_deletes() {
        let driver = MemoryDriver::new(["test"]);
        let index = IndexDefinition::new("test", "demo", "age_index", "age", IndexType::Numeric);
        driver.create_index(&index).await.unwrap();

        let k = key("u");
        driver
            .put(&k, &BinMap::new().with("age", 30).unwrap())
            .await
            .unwrap();
        driver
            .put(&k, &BinMap::new().with("age", 10).unwrap())
            .await
            .unwrap();

        let stmt = Statement::new("test", "demo").with_filter(Filter::range("age", 25, 100).unwrap());
        let count = driver.query(stmt.clone()).await.unwrap().count().await;
        assert_eq!(count, 0);

        driver
            .put(&k, &BinMap::new().with("age", 50).unwrap())
            .await
            .unwrap();
        assert_eq!(driver.query(stmt.clone()).await.unwrap().count().await, 1);

        assert!(driver.delete(&k).await.unwrap());
        assert!(!driver.delete(&k).await.unwrap());
        assert_eq!(driver.query(stmt).await.unwrap().count().await, 0);
    }

    #[tokio::test]
    async fn index_query_past_integer_limits_is_empty() {
        let driver = MemoryDriver::new(["test"]);
        let index = IndexDefinition::new("test", "demo", "age_index", "age", IndexType::Numeric);
        driver.create_index(&index).await.unwrap();

        for age in [i64::MIN, 0, i64::MAX] {
            driver
                .put(&key(age), &BinMap::new().with("age", age).unwrap())
                .await
                .unwrap();
        }

        let lt = Filter::try_new("age", query::Op::Lt(Value::Integer(i64::MIN))).unwrap();
        let gt = Filter::try_new("age", query::Op::Gt(Value::Integer(i64::MAX))).unwrap();
        for filter in [lt, gt] {
            let stmt = Statement::new("test", "demo").with_filter(filter);
            assert_eq!(driver.query(stmt).await.unwrap().count().await, 0);
        }

        let geq = Filter::try_new("age", query::Op::Geq(Value::Integer(0))).unwrap();
        let stmt = Statement::new("test", "demo").with_filter(geq);
        assert_eq!(driver.query(stmt).await.unwrap().count().await, 2);
    }

    #[tokio::test]
    async fn query_requires_index() {
        let driver = MemoryDriver::new(["test"]);
        let stmt = Statement::new("test", "demo").with_filter(Filter::equal("name", "x").unwrap());
        assert!(matches!(
            driver.query(stmt).await,
            Err(DriverError::IndexNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn string_index_and_projection() {
        let driver = MemoryDriver::new(["test"]);
        let index = IndexDefinition::new("test", "demo", "name_index", "name", IndexType::String);
        driver.create_index(&index).await.unwrap();

        for (i, name) in ["ann", "bob", "ann"].iter().enumerate() {
            let bins = BinMap::new()
                .with("name", *name)
                .unwrap()
                .with("n", i as i64)
                .unwrap();
            driver.put(&key(i as i64), &bins).await.unwrap();
        }

        let filter = Filter::equal("name", "ann").unwrap();
        let stmt = Statement::new("test", "demo")
            .with_filter(filter.clone())
            .with_bins(["n"]);
        let records: Vec<Record> = driver.query(stmt).await.unwrap().try_collect().await.unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.bin("name").is_none()));

        let all: Vec<Record> = driver.scan("test", "demo").await.unwrap().try_collect().await.unwrap();
        let matching = all.iter().filter(|r| r.bin("name").is_some_and(|v| filter.matches(v))).count();
        assert_eq!(matching, 2);
    }

    #[tokio::test]
    async fn duplicate_index() {
        let driver = MemoryDriver::new(["test"]);
        let index = IndexDefinition::new("test", "demo", "age_index", "age", IndexType::Numeric);
        driver.create_index(&index).await.unwrap();
        assert!(matches!(
            driver.create_index(&index).await,
            Err(DriverError::IndexAlreadyExists(name)) if name == "age_index"
        ));

        driver.drop_index("test", "demo", "age_index").await.unwrap();
        assert!(driver.create_index(&index).await.is_ok());
    }

    #[tokio::test]
    async fn index_build_polls() {
        let driver = MemoryDriver::new(["test"]).with_index_build_polls(2);
        let index = IndexDefinition::new("test", "demo", "age_index", "age", IndexType::Numeric);
        let task = driver.create_index(&index).await.unwrap();

        assert!(!task.is_done().await.unwrap());
        assert!(!task.is_done().await.unwrap());
        assert!(task.is_done().await.unwrap());
        assert!(task.is_done().await.unwrap());
    }

    #[tokio::test]
    async fn closed_driver() {
        let driver = MemoryDriver::new(["test"]);
        driver.close().await.unwrap();
        assert!(matches!(driver.get(&key(1)).await, Err(DriverError::Closed)));
        assert_eq!(driver.set_len("test", "demo").await.ok(), None);
    }
}
