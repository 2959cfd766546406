//! Feature showcase: batch reads, list operations and secondary index queries.
//!
//! Every showcase logs and stops at its first failing step, the next one
//! still runs.

use futures::StreamExt;
use log::{error, info, warn};

use super::{DemoContext, Outcome, StepError, StepExt, banner};
use crate::{
    driver::{IndexDefinition, Operation},
    query::{Filter, IndexType, Statement},
    types::{BinMap, Record, Value},
};

pub const BATCH_SIZE: i64 = 3;
pub const LIST_KEY: &str = "list-demo";
pub const LIST_BIN: &str = "numbers";
pub const INDEX_NAME: &str = "age_index";
pub const INDEX_BIN: &str = "age";
pub const FIRST_AGE: i64 = 20;
pub const USERS: i64 = 10;
pub const MIN_AGE: i64 = 25;
pub const MAX_AGE: i64 = 100;

/// `'A' + offset`, `?` past `'Z'`.
fn letter(offset: i64) -> char {
    u8::try_from(offset)
        .ok()
        .filter(|o| *o < 26)
        .map_or('?', |o| char::from(b'A' + o))
}

pub async fn batch_operations(ctx: &DemoContext) -> Outcome {
    banner("Batch Operations");
    batch(ctx).await.into()
}

async fn batch(ctx: &DemoContext) -> Result<Vec<Record>, StepError> {
    let mut keys = Vec::with_capacity(BATCH_SIZE as usize);

    for i in 0..BATCH_SIZE {
        let step = format!("writing batch record {i}");
        let key = ctx.key(i).step(&step)?;
        let bins = BinMap::new()
            .with("id", i)
            .and_then(|b| b.with("data", format!("batch-data-{}", letter(i))))
            .step(&step)?;

        ctx.driver.put(&key, &bins).await.step(&step)?;
        keys.push(key);
    }

    let records = ctx.driver.batch_get(&keys).await.step("in batch get")?;

    let mut found = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        match record {
            Some(record) => {
                info!("Batch record {}: {}", i, record.bins);
                found.push(record);
            }
            None => warn!("Batch record {}: not found", i),
        }
    }

    Ok(found)
}

pub async fn list_operations(ctx: &DemoContext) -> Outcome {
    banner("List Operations");
    list(ctx).await.into()
}

async fn list(ctx: &DemoContext) -> Result<Vec<Record>, StepError> {
    let key = ctx.key(LIST_KEY).step("creating list")?;

    let bins = BinMap::new()
        .with(LIST_BIN, vec![1, 2, 3])
        .step("creating list")?;
    ctx.driver.put(&key, &bins).await.step("creating list")?;

    ctx.driver
        .operate(&key, &[Operation::list_append(LIST_BIN, 4)])
        .await
        .step("appending to list")?;

    let record = ctx.driver.get(&key).await.step("reading list")?;
    info!(
        "Final list: {}",
        record.bin(LIST_BIN).unwrap_or(&Value::Nil)
    );

    Ok(vec![record])
}

pub async fn secondary_index(ctx: &DemoContext) -> Outcome {
    banner("Secondary Index and Query");
    index_and_query(ctx).await.into()
}

async fn index_and_query(ctx: &DemoContext) -> Result<Vec<Record>, StepError> {
    let index = IndexDefinition::new(
        ctx.namespace.as_str(),
        ctx.set.as_str(),
        INDEX_NAME,
        INDEX_BIN,
        IndexType::Numeric,
    );

    // The index might already exist, carry on anyway
    match ctx.driver.create_index(&index).await {
        Ok(task) => loop {
            match task.is_done().await {
                Ok(true) => break,
                Ok(false) => tokio::time::sleep(ctx.poll_interval).await,
                Err(e) => {
                    error!("Error checking index status: {}", e);
                    break;
                }
            }
        },
        Err(e) => warn!("Error creating index: {}", e),
    }

    for i in 0..USERS {
        let step = "inserting record";
        let key = ctx.key(format!("user-{i}")).step(step)?;
        let bins = BinMap::new()
            .with("name", format!("user-{}", letter(i)))
            .and_then(|b| b.with(INDEX_BIN, FIRST_AGE + i))
            .step(step)?;
        ctx.driver.put(&key, &bins).await.step(step)?;
    }

    let filter = Filter::range(INDEX_BIN, MIN_AGE, MAX_AGE).step("querying")?;
    let statement = Statement::new(ctx.namespace.as_str(), ctx.set.as_str()).with_filter(filter);
    let mut results = ctx.driver.query(statement).await.step("querying")?;

    let mut records = Vec::new();
    while let Some(result) = results.next().await {
        match result {
            Ok(record) => {
                info!("Query result: {}", record.bins);
                records.push(record);
            }
            Err(e) => error!("Error in result: {}", e),
        }
    }

    Ok(records)
}

/// Runs every showcase in order.
pub async fn run_all(ctx: &DemoContext) -> Vec<Outcome> {
    vec![
        batch_operations(ctx).await,
        list_operations(ctx).await,
        secondary_index(ctx).await,
    ]
}
