use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A dynamically typed value as carried by the object codec.
///
/// `List`, `Map` and `Object` keep the remote type name when the peer sent
/// one, so a value decoded from a response can be written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    /// milliseconds since the unix epoch
    Date(i64),
    List {
        class: Option<String>,
        items: Vec<Value>,
    },
    Map {
        class: Option<String>,
        entries: Vec<(Value, Value)>,
    },
    Object {
        class: String,
        fields: Vec<(String, Value)>,
    },
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List { class: None, items }
    }

    pub fn typed_map<C: Into<String>>(class: C, entries: Vec<(Value, Value)>) -> Value {
        Value::Map {
            class: Some(class.into()),
            entries,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Looks up a field of an object or a string-keyed map entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object { fields, .. } => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Value::Map { entries, .. } => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Whether this value is a remote exception instance.
    pub fn is_error(&self) -> bool {
        match self {
            Value::Object { class, fields } => {
                class.ends_with("Exception")
                    || class.ends_with("Error")
                    || class == "java.lang.Throwable"
                    || fields.iter().any(|(k, _)| k == "detailMessage")
            }
            _ => false,
        }
    }

    /// The message a remote exception carries, falling back to its class name.
    pub fn error_message(&self) -> Option<String> {
        if !self.is_error() {
            return None;
        }
        let class = match self {
            Value::Object { class, .. } => class.as_str(),
            _ => "",
        };
        match self.get("detailMessage").and_then(Value::as_str) {
            Some(msg) => Some(format!("{}: {}", class, msg)),
            None => Some(class.to_owned()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i32(*i),
            Value::Long(l) | Value::Date(l) => serializer.serialize_i64(*l),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::List { items, .. } => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map { entries, .. } => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Object { fields, .. } => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                        Value::Int(i as i32)
                    } else {
                        Value::Long(i)
                    }
                } else {
                    Value::Double(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::list(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => Value::Map {
                class: None,
                entries: obj
                    .into_iter()
                    .map(|(k, v)| (Value::String(k), Value::from(v)))
                    .collect(),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Value {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Value {
        Value::Long(l)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Value {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Value {
        o.map_or(Value::Null, Into::into)
    }
}

/// A call argument together with the remote type it must be bound to.
///
/// The type tag is either a primitive name (`int`, `long`, ...), a qualified
/// class name, or an array of either prefixed with `[`.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    class: String,
    value: Value,
}

impl Arg {
    pub fn new<C: Into<String>, V: Into<Value>>(class: C, value: V) -> Arg {
        Arg {
            class: class.into(),
            value: value.into(),
        }
    }

    pub fn boolean(b: bool) -> Arg {
        Arg::new("boolean", b)
    }

    pub fn int(i: i32) -> Arg {
        Arg::new("int", i)
    }

    pub fn short(s: i16) -> Arg {
        Arg::new("short", s as i32)
    }

    pub fn long(l: i64) -> Arg {
        Arg::new("long", l)
    }

    pub fn double(d: f64) -> Arg {
        Arg::new("double", d)
    }

    pub fn float(f: f32) -> Arg {
        Arg::new("float", f as f64)
    }

    pub fn string<S: Into<String>>(s: S) -> Arg {
        Arg::new("java.lang.String", s.into())
    }

    /// A bean argument, written as an object instance of `class`.
    pub fn object<C: Into<String>>(class: C, fields: Vec<(String, Value)>) -> Arg {
        let class = class.into();
        Arg {
            value: Value::Object {
                class: class.clone(),
                fields,
            },
            class,
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}
