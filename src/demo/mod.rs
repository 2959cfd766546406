//! Demo flows: each function walks through one capability of the store,
//! logging every request and response.

use colored::Colorize;
use log::{error, info};
use std::time::Duration;

use crate::{
    driver::{DriverError, DriverRef},
    params::Configurables,
    types::{self, Key, Record, UserKey},
};

pub mod basic;
pub mod features;

/// Everything a demo needs: the driver and where to write.
#[derive(Clone)]
pub struct DemoContext {
    pub driver: DriverRef,
    pub namespace: String,
    pub set: String,
    /// Sleep between two index build status checks
    pub poll_interval: Duration,
}

impl DemoContext {
    pub fn new(driver: DriverRef, params: &Configurables) -> Self {
        Self {
            driver,
            namespace: params.namespace.clone(),
            set: params.set.clone(),
            poll_interval: params.index_poll_interval,
        }
    }

    pub fn key(&self, user_key: impl Into<UserKey>) -> Result<Key, types::Error> {
        Key::try_new(self.namespace.as_str(), self.set.as_str(), user_key)
    }
}

/// Failure of a single demo step, carrying a description of the step.
#[derive(Debug, thiserror::Error)]
#[error("error {step}: {source}")]
pub struct StepError {
    pub step: String,
    #[source]
    pub source: DriverError,
}

pub(crate) trait StepExt<T> {
    fn step(self, step: impl Into<String>) -> Result<T, StepError>;
}

impl<T, E> StepExt<T> for Result<T, E>
where
    E: Into<DriverError>,
{
    fn step(self, step: impl Into<String>) -> Result<T, StepError> {
        self.map_err(|e| StepError {
            step: step.into(),
            source: e.into(),
        })
    }
}

/// Result of a feature showcase. A failing step aborts the showcase but
/// never the process.
#[derive(Debug)]
pub enum Outcome {
    Completed(Vec<Record>),
    Aborted(StepError),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn records(&self) -> &[Record] {
        match self {
            Self::Completed(records) => records,
            Self::Aborted(_) => &[],
        }
    }
}

impl From<Result<Vec<Record>, StepError>> for Outcome {
    fn from(value: Result<Vec<Record>, StepError>) -> Self {
        match value {
            Ok(records) => Self::Completed(records),
            Err(err) => {
                error!("{}", err);
                Self::Aborted(err)
            }
        }
    }
}

/// Logs a section title.
pub fn banner(title: &str) {
    info!("{}", format!("=== {title} ===").bold());
}
