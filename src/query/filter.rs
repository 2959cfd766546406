//! # Secondary Index Filters
//!
//! Building blocks for the predicates a query can push down to a secondary
//! index.
//!
//! -   _Operation_ ([`Op`]): the logical predicate.
//!     An [`Op`] defines *how* to compare data: equality (`Eq`), ordering
//!     (`Lt`, `Leq`, `Gt`, `Geq`) or an inclusive range (`Between`).
//!
//! -   _Filter_ ([`Filter`]): an [`Op`] bound to a bin name.
//!     The store evaluates filters against a secondary index, which only
//!     understands two shapes: equality and inclusive integer ranges.
//!     Ordering operations are therefore lowered to ranges
//!     ([`Filter::bounds`]) before they reach a backend.

use crate::types::{Integer, Value};

use super::{Error, IndexType};

#[derive(Debug, thiserror::Error)]
pub enum OpError {
    /// Occurs when an operation is applied to a value type that cannot support it.
    #[error("wrong type `{0}`")]
    WrongType(&'static str),

    /// Unsupported operation
    #[error("unsupported operation")]
    UnsupportedOperation,

    /// Occurs when constructing a [`Range`] where `min > max`.
    #[error("empty range")]
    EmptyRange,
}

/// A trait that indicates which combinations of values and [`Op`]s
/// are supported by an implementing type.
///
/// By default, all operations are unsupported (`false`).
pub trait IsSupportedOp {
    fn support_eq(&self) -> bool {
        false
    }
    fn support_ordering(&self) -> bool {
        false
    }
}

impl IsSupportedOp for Value {
    fn support_eq(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Text(_))
    }

    fn support_ordering(&self) -> bool {
        matches!(self, Self::Integer(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Range<T> {
    min: T,
    max: T,
}

impl<T> Range<T>
where
    T: PartialOrd,
{
    pub fn try_new(min: T, max: T) -> Result<Self, OpError> {
        if min > max {
            return Err(OpError::EmptyRange);
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> &T {
        &self.min
    }

    pub fn max(&self) -> &T {
        &self.max
    }
}

/// Represents the logical operator to apply to a bin for filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum Op<T> {
    /// Equal
    Eq(T),
    /// Less than or equal
    Leq(T),
    /// Greater then or equal
    Geq(T),
    /// Lower then
    Lt(T),
    /// Greater then
    Gt(T),
    /// In between a two value range [a, b] with a <= b
    Between(Range<T>),
}

impl<T> Op<T>
where
    T: IsSupportedOp,
{
    pub fn is_supported_op(&self) -> bool {
        match self {
            Self::Eq(v) => v.support_eq(),
            Self::Leq(v) => v.support_ordering(),
            Self::Geq(v) => v.support_ordering(),
            Self::Lt(v) => v.support_ordering(),
            Self::Gt(v) => v.support_ordering(),
            Self::Between(range) => range.min.support_ordering() && range.max.support_ordering(),
        }
    }
}

/// A predicate over a single bin, evaluated by a secondary index.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    bin: String,
    op: Op<Value>,
}

impl Filter {
    pub fn try_new(bin: impl Into<String>, op: Op<Value>) -> Result<Self, Error> {
        if !op.is_supported_op() {
            return Err(OpError::UnsupportedOperation.into());
        }
        Ok(Self {
            bin: bin.into(),
            op,
        })
    }

    /// Inclusive integer range filter `begin <= bin <= end`.
    pub fn range(bin: impl Into<String>, begin: Integer, end: Integer) -> Result<Self, Error> {
        let range = Range::try_new(Value::Integer(begin), Value::Integer(end))?;
        Self::try_new(bin, Op::Between(range))
    }

    /// Equality filter over an integer or string bin.
    pub fn equal(bin: impl Into<String>, value: impl Into<Value>) -> Result<Self, Error> {
        let value = value.into();
        if !value.support_eq() {
            return Err(OpError::WrongType(value.type_name()).into());
        }
        Self::try_new(bin, Op::Eq(value))
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    pub fn op(&self) -> &Op<Value> {
        &self.op
    }

    /// Kind of secondary index able to serve this filter.
    pub fn index_type(&self) -> IndexType {
        match &self.op {
            Op::Eq(Value::Text(_)) => IndexType::String,
            _ => IndexType::Numeric,
        }
    }

    /// Lowers the operation to the inclusive integer range an index scan
    /// understands, with `min <= max`.
    ///
    /// Returns [`None`] for string equality and for filters no integer can
    /// satisfy, such as `< i64::MIN`.
    pub fn bounds(&self) -> Option<(Integer, Integer)> {
        let int = |v: &Value| v.as_integer();
        let (min, max) = match &self.op {
            Op::Eq(v) => int(v).map(|v| (v, v)),
            Op::Leq(v) => int(v).map(|v| (Integer::MIN, v)),
            Op::Geq(v) => int(v).map(|v| (v, Integer::MAX)),
            Op::Lt(v) => int(v)?.checked_sub(1).map(|v| (Integer::MIN, v)),
            Op::Gt(v) => int(v)?.checked_add(1).map(|v| (v, Integer::MAX)),
            Op::Between(range) => Some((int(&range.min)?, int(&range.max)?)),
        }?;
        (min <= max).then_some((min, max))
    }

    /// Checks whether a bin value satisfies the filter.
    ///
    /// Values of a type the filter's index does not cover never match, the
    /// same way the store skips them when building the index.
    pub fn matches(&self, value: &Value) -> bool {
        match (&self.op, value) {
            (Op::Eq(Value::Text(expected)), Value::Text(actual)) => expected == actual,
            (Op::Eq(Value::Text(_)), _) => false,
            (_, Value::Integer(actual)) => self
                .bounds()
                .is_some_and(|(min, max)| min <= *actual && *actual <= max),
            _ => false,
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.op {
            Op::Eq(v) => write!(f, "{} == {}", self.bin, v),
            Op::Leq(v) => write!(f, "{} <= {}", self.bin, v),
            Op::Geq(v) => write!(f, "{} >= {}", self.bin, v),
            Op::Lt(v) => write!(f, "{} < {}", self.bin, v),
            Op::Gt(v) => write!(f, "{} > {}", self.bin, v),
            Op::Between(r) => write!(f, "{} in [{}, {}]", self.bin, r.min, r.max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive() {
        let filter = Filter::range("age", 25, 100).unwrap();

        assert_eq!(filter.bounds(), Some((25, 100)));
        assert!(!filter.matches(&Value::Integer(24)));
        assert!(filter.matches(&Value::Integer(25)));
        assert!(filter.matches(&Value::Integer(100)));
        assert!(!filter.matches(&Value::Integer(101)));
        assert!(!filter.matches(&Value::from("25")));
        assert_eq!(filter.index_type(), IndexType::Numeric);
    }

    #[test]
    fn empty_range() {
        assert!(matches!(
            Filter::range("age", 10, 5),
            Err(Error::Op(OpError::EmptyRange))
        ));

        let inverted = Range {
            min: Value::Integer(10),
            max: Value::Integer(5),
        };
        let filter = Filter::try_new("age", Op::Between(inverted)).unwrap();
        assert_eq!(filter.bounds(), None);
        assert!(!filter.matches(&Value::Integer(7)));
    }

    #[test]
    fn ordering_lowering() {
        let gt = Filter::try_new("age", Op::Gt(Value::Integer(25))).unwrap();
        assert_eq!(gt.bounds(), Some((26, Integer::MAX)));
        assert!(gt.matches(&Value::Integer(26)));
        assert!(!gt.matches(&Value::Integer(25)));

        let leq = Filter::try_new("age", Op::Leq(Value::Integer(25))).unwrap();
        assert_eq!(leq.bounds(), Some((Integer::MIN, 25)));
        assert!(leq.matches(&Value::Integer(25)));
    }

    #[test]
    fn ordering_past_integer_limits_matches_nothing() {
        let lt = Filter::try_new("age", Op::Lt(Value::Integer(Integer::MIN))).unwrap();
        assert_eq!(lt.bounds(), None);
        assert!(!lt.matches(&Value::Integer(Integer::MIN)));

        let gt = Filter::try_new("age", Op::Gt(Value::Integer(Integer::MAX))).unwrap();
        assert_eq!(gt.bounds(), None);
        assert!(!gt.matches(&Value::Integer(Integer::MAX)));

        let geq = Filter::try_new("age", Op::Geq(Value::Integer(Integer::MAX))).unwrap();
        assert_eq!(geq.bounds(), Some((Integer::MAX, Integer::MAX)));
    }

    #[test]
    fn string_equality() {
        let filter = Filter::equal("name", "user-A").unwrap();

        assert_eq!(filter.index_type(), IndexType::String);
        assert_eq!(filter.bounds(), None);
        assert!(filter.matches(&Value::from("user-A")));
        assert!(!filter.matches(&Value::from("user-B")));
        assert!(!filter.matches(&Value::Integer(1)));
    }

    #[test]
    fn unsupported_ops() {
        assert!(Filter::try_new("name", Op::Geq(Value::from("a"))).is_err());
        assert!(Filter::try_new("score", Op::Eq(Value::Float(1.0))).is_err());
        assert!(matches!(
            Filter::equal("flag", true),
            Err(Error::Op(OpError::WrongType("bool")))
        ));
    }
}
