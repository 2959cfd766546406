//! Stores a handful of vectors and looks up the neighbours of a sample one.

use log::info;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{Metric, Neighbor, VectorError, VectorStore, normalize};
use crate::demo::{DemoContext, banner};

pub const SAMPLE: [f32; 3] = [0.1, 0.2, 0.3];
pub const RANDOM_VECTORS: usize = 20;
pub const K: usize = 5;
const SEED: u64 = 42;

pub async fn run(ctx: &DemoContext) -> Result<Vec<Neighbor>, VectorError> {
    banner("Vectors");

    let vs = VectorStore::new(ctx.driver.clone(), ctx.namespace.as_str(), SAMPLE.len());
    let mut rng = StdRng::seed_from_u64(SEED);

    vs.store("sample", &SAMPLE).await?;
    for i in 0..RANDOM_VECTORS {
        let v: Vec<f32> = (0..vs.dimensions()).map(|_| rng.random::<f32>()).collect();
        vs.store(format!("random-{i}"), &v).await?;
    }
    info!("Stored {} vectors", RANDOM_VECTORS + 1);

    let mut query = SAMPLE;
    normalize(&mut query);

    let neighbors = vs.knn(&query, K, Metric::Cosine).await?;
    for n in &neighbors {
        info!("Neighbor {} (cosine distance {:.4})", n.id, n.distance);
    }

    Ok(neighbors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{driver::MemoryDriver, params::Configurables, types::UserKey};
    use std::sync::Arc;

    #[tokio::test]
    async fn sample_is_its_own_nearest_neighbour() {
        let ctx = DemoContext::new(Arc::new(MemoryDriver::new(["test"])), &Configurables::default());
        let neighbors = run(&ctx).await.unwrap();

        assert_eq!(neighbors.len(), K);
        assert_eq!(neighbors[0].id, UserKey::from("sample"));
        assert!(neighbors.windows(2).all(|w| w[0].distance <= w[1].distance));
    }
}
