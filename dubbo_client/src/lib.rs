pub mod cache;
pub mod client;
pub mod discovery;
pub mod provider;
pub mod registry;
pub mod service;

pub use cache::*;
pub use client::*;
pub use discovery::*;
pub use provider::*;
pub use registry::*;
pub use service::*;

use async_trait::async_trait;
use dubbo_protocol::{Arg, Result, Value};

#[async_trait]
pub trait DubboClient {
    /// Invokes `method` on the bound service. `Ok(None)` means the method
    /// returned nothing.
    async fn call(&self, method: &str, args: Vec<Arg>) -> Result<Option<Value>>;
}
