//! A consumer for Dubbo services.
//!
//! ```no_run
//! use dubbo::*;
//!
//! # async fn run() -> Result<()> {
//! let registry = RegistryClient::connect("127.0.0.1:2181", RegistryOpt::default()).await?;
//! let client = ServiceClient::new(registry, ServiceDescriptor::new("com.example.Foo", "dev"));
//! let reply = client.call("bar", vec![Arg::string("hello")]).await?;
//! println!("{:?}", reply);
//! # Ok(())
//! # }
//! ```

pub use dubbo_client::*;
pub use dubbo_protocol::*;
