use serde::Serialize;

use super::{Error, Value};

/// The user-supplied part of a record key.
///
/// The store accepts integer and string user keys; every other value type is
/// rejected when a [`Key`] is built.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum UserKey {
    Integer(i64),
    Text(String),
}

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for UserKey {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for UserKey {
    fn from(v: i32) -> Self {
        Self::Integer(v.into())
    }
}

impl From<&str> for UserKey {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for UserKey {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl TryFrom<Value> for UserKey {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Integer(v) => Ok(Self::Integer(v)),
            Value::Text(v) => Ok(Self::Text(v)),
            other => Err(Error::UnsupportedUserKey(other.type_name())),
        }
    }
}

impl From<UserKey> for Value {
    fn from(value: UserKey) -> Self {
        match value {
            UserKey::Integer(v) => Value::Integer(v),
            UserKey::Text(v) => Value::Text(v),
        }
    }
}

/// Unique address of a record: namespace, set and user key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Key {
    namespace: String,
    set: String,
    user_key: UserKey,
}

impl Key {
    pub fn try_new(
        namespace: impl Into<String>,
        set: impl Into<String>,
        user_key: impl Into<UserKey>,
    ) -> Result<Self, Error> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(Error::EmptyNamespace);
        }

        Ok(Self {
            namespace,
            set: set.into(),
            user_key: user_key.into(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn set(&self) -> &str {
        &self.set
    }

    pub fn user_key(&self) -> &UserKey {
        &self.user_key
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.set, self.user_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_parts() {
        let key = Key::try_new("test", "demo", "demo-key").unwrap();
        assert_eq!(key.namespace(), "test");
        assert_eq!(key.set(), "demo");
        assert_eq!(key.user_key(), &UserKey::Text("demo-key".into()));
        assert_eq!(key.to_string(), "test:demo:demo-key");
    }

    #[test]
    fn empty_namespace_is_rejected() {
        assert!(matches!(
            Key::try_new("", "demo", 1),
            Err(Error::EmptyNamespace)
        ));
    }

    #[test]
    fn user_key_from_value() {
        assert_eq!(UserKey::try_from(Value::from(3)).unwrap(), UserKey::Integer(3));
        assert!(matches!(
            UserKey::try_from(Value::Float(1.5)),
            Err(Error::UnsupportedUserKey("float"))
        ));
    }
}
