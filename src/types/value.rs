use serde::Serialize;
use std::collections::BTreeMap;

/// Floating point value type alias
pub type Float = f64;
/// Integer value type alias
pub type Integer = i64;
/// Literal type alias
pub type Text = String;

/// A wrapper enum to allow heterogeneous bin values to coexist in
/// dynamic containers like [`super::BinMap`].
///
/// Collections nest: a [`Value::List`] may hold maps and a [`Value::Map`]
/// may hold lists, mirroring the collection data types of the store.
#[derive(Debug, Clone, PartialEq, PartialOrd, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Absence of a value. Writing it to a bin removes the bin.
    Nil,
    Integer(Integer),
    Float(Float),
    Text(Text),
    Boolean(bool),
    Blob(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn as_integer(&self) -> Option<Integer> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<Float> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as Float),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Short name of the value type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::Boolean(_) => "bool",
            Self::Blob(_) => "blob",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => write!(f, "<nil>"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Blob(v) => write!(f, "{v:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(entries) => {
                write!(f, "map[")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Value>,
{
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_collections() {
        let list = Value::from(vec![1, 2, 3, 4]);
        assert_eq!(list.to_string(), "[1 2 3 4]");

        let mut map = BTreeMap::new();
        map.insert("id".to_owned(), Value::from(0));
        map.insert("data".to_owned(), Value::from("batch-data-A"));
        assert_eq!(Value::Map(map).to_string(), "map[data:batch-data-A id:0]");
    }

    #[test]
    fn numeric_accessors() {
        assert_eq!(Value::from(7).as_integer(), Some(7));
        assert_eq!(Value::from(7).as_float(), Some(7.0));
        assert_eq!(Value::from("x").as_integer(), None);
        assert!(Value::from(None::<i64>).is_nil());
    }

    #[test]
    fn json_is_untagged() {
        let v = Value::from(vec![Value::from(1), Value::from("a"), Value::Boolean(true)]);
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"[1,"a",true]"#);
    }
}
