//! # Property Graph on Records
//!
//! A small property graph stored as plain records:
//!
//! * a vertex is a record of the `vertex` set holding its `type`, its
//!   `properties` map and one adjacency list per edge type and direction
//!   (`out_KNOWS`, `in_KNOWS`, ...);
//! * an edge is a record of the `edge` set keyed by `{from}-{type}-{to}`.
//!
//! Adding an edge appends the endpoint ids to the adjacency lists with
//! list-append operations, neighbour lookups read those lists back.

use log::{debug, info};
use std::collections::BTreeMap;

use crate::{
    driver::{DriverError, DriverRef, Operation},
    types::{self, BinMap, Key, Record, Value},
};

pub mod demo;

pub const VERTEX_SET: &str = "vertex";
pub const EDGE_SET: &str = "edge";

/// Edge types whose adjacency lists are created along with each vertex.
pub const EDGE_TYPES: [&str; 2] = ["WORKS_AT", "KNOWS"];

pub type Properties = BTreeMap<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("driver error :: {0}")]
    DriverError(#[from] DriverError),
    #[error("types error :: {0}")]
    TypesError(#[from] types::Error),
    #[error("malformed vertex `{id}`: {msg}")]
    MalformedVertex { id: String, msg: String },
}

/// Which adjacency list to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
}

impl Direction {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Out => "out",
            Self::In => "in",
        }
    }
}

/// Name of the bin holding the adjacency list of `edge_type` in `direction`.
pub fn edge_bin(direction: Direction, edge_type: &str) -> String {
    format!("{}_{}", direction.prefix(), edge_type)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: String,
    pub vertex_type: String,
    pub properties: Properties,
}

impl Vertex {
    fn try_from_record(id: &str, record: &Record) -> Result<Self, GraphError> {
        let malformed = |msg: &str| GraphError::MalformedVertex {
            id: id.to_owned(),
            msg: msg.to_owned(),
        };

        let vertex_type = record
            .bin("type")
            .and_then(Value::as_text)
            .ok_or_else(|| malformed("missing `type` bin"))?;
        let properties = record
            .bin("properties")
            .and_then(Value::as_map)
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            id: id.to_owned(),
            vertex_type: vertex_type.to_owned(),
            properties,
        })
    }

    /// Shortcut for the `name` property.
    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(Value::as_text)
    }
}

pub struct GraphDb {
    driver: DriverRef,
    namespace: String,
}

impl GraphDb {
    pub fn new(driver: DriverRef, namespace: impl Into<String>) -> Self {
        Self {
            driver,
            namespace: namespace.into(),
        }
    }

    fn vertex_key(&self, id: &str) -> Result<Key, types::Error> {
        Key::try_new(self.namespace.as_str(), VERTEX_SET, id)
    }

    fn edge_key(&self, id: &str) -> Result<Key, types::Error> {
        Key::try_new(self.namespace.as_str(), EDGE_SET, id)
    }

    pub async fn add_vertex(
        &self,
        id: &str,
        vertex_type: &str,
        properties: Properties,
    ) -> Result<(), GraphError> {
        let mut bins = BinMap::new()
            .with("type", vertex_type)?
            .with("properties", properties)?;
        for edge_type in EDGE_TYPES {
            for direction in [Direction::Out, Direction::In] {
                bins.insert(edge_bin(direction, edge_type), Value::List(Vec::new()))?;
            }
        }

        self.driver.put(&self.vertex_key(id)?, &bins).await?;
        info!("Added vertex: {}:{}", vertex_type, id);
        Ok(())
    }

    pub async fn add_edge(
        &self,
        from_id: &str,
        to_id: &str,
        edge_type: &str,
        properties: Properties,
    ) -> Result<(), GraphError> {
        let out_bin = edge_bin(Direction::Out, edge_type);
        let in_bin = edge_bin(Direction::In, edge_type);
        // Fail on oversized edge types before writing anything
        types::Bin::try_new(out_bin.as_str(), Value::Nil)?;
        types::Bin::try_new(in_bin.as_str(), Value::Nil)?;

        let edge_id = format!("{from_id}-{edge_type}-{to_id}");
        let bins = BinMap::new()
            .with("from_id", from_id)?
            .with("to_id", to_id)?
            .with("type", edge_type)?
            .with("properties", properties)?;
        self.driver.put(&self.edge_key(&edge_id)?, &bins).await?;

        self.driver
            .operate(
                &self.vertex_key(from_id)?,
                &[Operation::list_append(out_bin, to_id)],
            )
            .await?;
        self.driver
            .operate(
                &self.vertex_key(to_id)?,
                &[Operation::list_append(in_bin, from_id)],
            )
            .await?;

        info!("Added edge: {} from {} to {}", edge_type, from_id, to_id);
        Ok(())
    }

    pub async fn get_vertex(&self, id: &str) -> Result<Vertex, GraphError> {
        let record = self.driver.get(&self.vertex_key(id)?).await?;
        Vertex::try_from_record(id, &record)
    }

    /// Ids found in the adjacency list of `edge_type` in `direction`.
    /// A vertex without that list has no neighbours.
    pub async fn neighbor_ids(
        &self,
        id: &str,
        edge_type: &str,
        direction: Direction,
    ) -> Result<Vec<String>, GraphError> {
        let record = self.driver.get(&self.vertex_key(id)?).await?;
        let bin = edge_bin(direction, edge_type);

        let ids = record
            .bin(&bin)
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_text().map(str::to_owned))
            .collect();
        Ok(ids)
    }

    pub async fn get_neighbors(
        &self,
        id: &str,
        edge_type: &str,
        direction: Direction,
    ) -> Result<Vec<Vertex>, GraphError> {
        let ids = self.neighbor_ids(id, edge_type, direction).await?;
        debug!("{} has {} {} neighbours", id, ids.len(), edge_bin(direction, edge_type));

        let mut neighbors = Vec::with_capacity(ids.len());
        for n_id in ids {
            neighbors.push(self.get_vertex(&n_id).await?);
        }
        Ok(neighbors)
    }
}

/// Builds a [`Properties`] map from literal pairs.
pub fn properties<const N: usize>(entries: [(&str, Value); N]) -> Properties {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryDriver;
    use std::sync::Arc;

    fn graph() -> GraphDb {
        GraphDb::new(Arc::new(MemoryDriver::new(["test"])), "test")
    }

    #[tokio::test]
    async fn vertex_round_trip() {
        let g = graph();
        g.add_vertex(
            "p1",
            "person",
            properties([("name", "Alice".into()), ("age", 30.into())]),
        )
        .await
        .unwrap();

        let v = g.get_vertex("p1").await.unwrap();
        assert_eq!(v.vertex_type, "person");
        assert_eq!(v.name(), Some("Alice"));
        assert_eq!(v.properties.get("age"), Some(&Value::Integer(30)));
        assert!(g.neighbor_ids("p1", "KNOWS", Direction::Out).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn edges_update_both_endpoints() {
        let g = graph();
        g.add_vertex("a", "person", properties([("name", "A".into())]))
            .await
            .unwrap();
        g.add_vertex("b", "person", properties([("name", "B".into())]))
            .await
            .unwrap();
        g.add_edge("a", "b", "KNOWS", Properties::new()).await.unwrap();

        let out: Vec<String> = g
            .get_neighbors("a", "KNOWS", Direction::Out)
            .await
            .unwrap()
            .iter()
            .map(|v| v.id.clone())
            .collect();
        assert_eq!(out, vec!["b"]);
        assert_eq!(
            g.neighbor_ids("b", "KNOWS", Direction::In).await.unwrap(),
            vec!["a"]
        );
        assert!(g.neighbor_ids("b", "KNOWS", Direction::Out).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn undeclared_edge_type_gets_its_own_list() {
        let g = graph();
        g.add_vertex("a", "person", Properties::new()).await.unwrap();
        g.add_vertex("c", "city", Properties::new()).await.unwrap();
        g.add_edge("a", "c", "LIVES_IN", Properties::new()).await.unwrap();

        assert_eq!(
            g.neighbor_ids("a", "LIVES_IN", Direction::Out).await.unwrap(),
            vec!["c"]
        );
    }

    #[tokio::test]
    async fn oversized_edge_type_writes_nothing() {
        let driver = Arc::new(MemoryDriver::new(["test"]));
        let g = GraphDb::new(driver.clone(), "test");
        g.add_vertex("a", "person", Properties::new()).await.unwrap();
        let err = g
            .add_edge("a", "a", "A_VERY_LONG_TYPE", Properties::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::TypesError(types::Error::BinNameTooLong(_))));

        assert_eq!(driver.set_len("test", EDGE_SET).await.unwrap(), 0);
        assert_eq!(driver.set_len("test", VERTEX_SET).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_vertex() {
        let g = graph();
        let err = g.get_vertex("ghost").await.unwrap_err();
        assert!(matches!(err, GraphError::DriverError(e) if e.is_not_found()));
    }
}
