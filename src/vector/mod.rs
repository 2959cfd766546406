//! Dense vectors stored as list bins, with brute-force nearest neighbour
//! search over a set scan.

use futures::StreamExt;
use log::{trace, warn};

use crate::{
    driver::{DriverError, DriverRef},
    types::{self, BinMap, Key, UserKey, Value},
};

mod distance;
pub use distance::*;

pub mod demo;

pub const VECTOR_SET: &str = "vectors";
pub const VECTOR_BIN: &str = "vec";

#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("driver error :: {0}")]
    DriverError(#[from] DriverError),
    #[error("types error :: {0}")]
    TypesError(#[from] types::Error),
    #[error("expected {expected} dimensions, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("k must be positive")]
    ZeroK,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: UserKey,
    /// Lower is closer, see [`raw_distance`].
    pub distance: f32,
}

pub struct VectorStore {
    driver: DriverRef,
    namespace: String,
    dimensions: usize,
}

fn decode(value: &Value) -> Option<Vec<f32>> {
    value
        .as_list()?
        .iter()
        .map(|v| v.as_float().map(|f| f as f32))
        .collect()
}

impl VectorStore {
    pub fn new(driver: DriverRef, namespace: impl Into<String>, dimensions: usize) -> Self {
        Self {
            driver,
            namespace: namespace.into(),
            dimensions,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.dimensions {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimensions,
                found: vector.len(),
            });
        }
        Ok(())
    }

    pub async fn store(&self, id: impl Into<UserKey>, vector: &[f32]) -> Result<(), VectorError> {
        self.check_dimensions(vector)?;

        let key = Key::try_new(self.namespace.as_str(), VECTOR_SET, id)?;
        let bins = BinMap::new().with(VECTOR_BIN, vector.to_vec())?;
        self.driver.put(&key, &bins).await?;

        trace!("stored vector {}", key);
        Ok(())
    }

    /// Returns the `k` stored vectors closest to `query`, closest first.
    ///
    /// Records whose `vec` bin is missing or has another dimension are skipped.
    pub async fn knn(
        &self,
        query: &[f32],
        k: usize,
        metric: Metric,
    ) -> Result<Vec<Neighbor>, VectorError> {
        self.check_dimensions(query)?;
        if k == 0 {
            return Err(VectorError::ZeroK);
        }

        let mut records = self.driver.scan(&self.namespace, VECTOR_SET).await?;
        let mut neighbors = Vec::new();

        while let Some(record) = records.next().await {
            let record = record?;
            let candidate = match record.bin(VECTOR_BIN).and_then(decode) {
                Some(v) if v.len() == self.dimensions => v,
                _ => {
                    warn!("skipping record {} without a valid vector", record.key);
                    continue;
                }
            };

            neighbors.push(Neighbor {
                id: record.key.user_key().clone(),
                distance: raw_distance(query, &candidate, metric),
            });
        }

        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);
        Ok(neighbors)
    }
}
