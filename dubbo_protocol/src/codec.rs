use std::fmt::Debug;

use crate::{Result, Value};

/// The object serialization used for request bodies and response payloads.
///
/// An implementation writes values back to back into one buffer, so any
/// state it keeps between values (class definitions, type references) must
/// live for the duration of a single `write` call.
pub trait ObjectCodec: Debug + Send + Sync {
    fn write(&self, values: &[&Value]) -> Result<Vec<u8>>;

    /// Reads the first value in `data`, ignoring anything after it.
    fn read(&self, data: &[u8]) -> Result<Value>;

    /// Reads every value in `data`.
    fn read_all(&self, data: &[u8]) -> Result<Vec<Value>>;
}
