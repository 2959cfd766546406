use super::Filter;

/// Describes a query over a set: which bins to return and an optional
/// secondary index filter.
///
/// A statement without filter scans the whole set.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub namespace: String,
    pub set: String,
    /// Bins to return, [`None`] returns all bins.
    pub bins: Option<Vec<String>>,
    pub filter: Option<Filter>,
}

impl Statement {
    pub fn new(namespace: impl Into<String>, set: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
            bins: None,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_bins<I, S>(mut self, bins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bins = Some(bins.into_iter().map(Into::into).collect());
        self
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.namespace, self.set)?;
        if let Some(filter) = &self.filter {
            write!(f, " where {filter}")?;
        }
        Ok(())
    }
}
