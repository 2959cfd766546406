//! Single record round trip: write a greeting, read it back.

use log::info;

use super::DemoContext;
use crate::{
    driver::DriverError,
    types::{BinMap, Record, Timestamp},
};

pub const KEY: &str = "demo-key";
pub const GREETING: &str = "Hello, Aerospike!";

/// Writes then reads back a single record. Any failure is returned to the
/// caller, which is expected to treat it as fatal.
pub async fn run(ctx: &DemoContext) -> Result<Record, DriverError> {
    let key = ctx.key(KEY)?;

    let bins = BinMap::new()
        .with("greet", GREETING)?
        .with("time", Timestamp::now().to_local_string())?;

    ctx.driver.put(&key, &bins).await?;
    info!("Record written successfully");

    let record = ctx.driver.get(&key).await?;
    info!("Record read successfully: {}", record.bins);

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{driver::MemoryDriver, params::Configurables, types::Value};
    use std::sync::Arc;

    #[tokio::test]
    async fn round_trip() {
        let ctx = DemoContext::new(Arc::new(MemoryDriver::new(["test"])), &Configurables::default());

        let record = run(&ctx).await.unwrap();
        assert_eq!(record.bin("greet"), Some(&Value::from(GREETING)));
        assert!(record.bin("time").and_then(Value::as_text).is_some());
        assert_eq!(record.key.to_string(), "test:demo:demo-key");
    }

    #[tokio::test]
    async fn unknown_namespace_is_an_error() {
        let params = Configurables {
            namespace: "missing".into(),
            ..Default::default()
        };
        let ctx = DemoContext::new(Arc::new(MemoryDriver::new(["test"])), &params);

        assert!(matches!(
            run(&ctx).await,
            Err(DriverError::InvalidNamespace(_))
        ));
    }
}
