use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{
    client::{CallSession, Opt},
    registry::RegistryClient,
    DubboClient,
};
use dubbo_protocol::{describe, Arg, Hessian2, ObjectCodec, Request, Result, Value};

/// the protocol version written at the head of every request body
pub const DEFAULT_VERSION: &str = "2.5.3.6";
/// the timeout advertised to providers, in milliseconds
pub const DEFAULT_TIMEOUT: &str = "60000";

/// Identifies the remote service a `ServiceClient` is bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    path: String,
    version: String,
    environment: String,
    group: Option<String>,
    attachments: Vec<(String, String)>,
}

impl ServiceDescriptor {
    /// `path` is the remote interface name, e.g. `com.example.Foo`; the
    /// environment tag is upper-cased.
    pub fn new<P: Into<String>, E: AsRef<str>>(path: P, environment: E) -> ServiceDescriptor {
        let mut sd = ServiceDescriptor {
            path: path.into(),
            version: DEFAULT_VERSION.to_owned(),
            environment: environment.as_ref().to_uppercase(),
            group: None,
            attachments: Vec::new(),
        };
        sd.build_attachments();
        sd
    }

    pub fn with_version<V: Into<String>>(mut self, version: V) -> ServiceDescriptor {
        self.version = version.into();
        self
    }

    pub fn with_group<G: Into<String>>(mut self, group: G) -> ServiceDescriptor {
        self.group = Some(group.into());
        self.build_attachments();
        self
    }

    fn build_attachments(&mut self) {
        let mut attachments = vec![
            ("path".to_owned(), self.path.clone()),
            ("interface".to_owned(), self.path.clone()),
            ("version".to_owned(), self.environment.clone()),
        ];
        if let Some(ref group) = self.group {
            attachments.push(("group".to_owned(), group.clone()));
        }
        attachments.push(("timeout".to_owned(), DEFAULT_TIMEOUT.to_owned()));
        self.attachments = attachments;
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn attachments(&self) -> &[(String, String)] {
        &self.attachments
    }
}

/// A client bound to one remote service.
pub struct ServiceClient {
    pub opt: Opt,
    descriptor: ServiceDescriptor,
    registry: RegistryClient,
    codec: Arc<dyn ObjectCodec>,
}

impl ServiceClient {
    pub fn new(registry: RegistryClient, descriptor: ServiceDescriptor) -> ServiceClient {
        ServiceClient {
            opt: Default::default(),
            descriptor,
            registry,
            codec: Arc::new(Hessian2::new()),
        }
    }

    pub fn with_opt(mut self, opt: Opt) -> ServiceClient {
        self.opt = opt;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn ObjectCodec>) -> ServiceClient {
        self.codec = codec;
        self
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    /// Builds the request for `method`, deriving the parameter types from
    /// the argument tags.
    pub fn request(&self, method: &str, args: Vec<Arg>) -> Result<Request> {
        let sd = &self.descriptor;
        Ok(Request {
            version: sd.version.clone(),
            service_path: sd.path.clone(),
            environment: sd.environment.clone(),
            method: method.to_owned(),
            parameter_types: describe(&args)?,
            args,
            attachments: sd.attachments.clone(),
        })
    }

    /// Invokes `method` and returns its decoded result, or `None` for a
    /// method without return value.
    pub async fn invoke(&self, method: &str, args: Vec<Arg>) -> Result<Option<Value>> {
        let request = self.request(method, args)?;
        let frame = request.encode(self.codec.as_ref())?;
        debug!(
            service = self.descriptor.path(),
            method,
            types = %request.parameter_types,
            bytes = frame.len(),
            "encoded request"
        );

        CallSession::new(
            &self.registry,
            self.codec.as_ref(),
            &self.opt,
            &self.descriptor,
            method,
            frame,
        )
        .run()
        .await
    }
}

#[async_trait]
impl DubboClient for ServiceClient {
    async fn call(&self, method: &str, args: Vec<Arg>) -> Result<Option<Value>> {
        self.invoke(method, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StaticRegistry;
    use crate::registry::RegistryOpt;
    use dubbo_protocol::{ErrorKind, MAX_PAYLOAD};

    fn client() -> ServiceClient {
        let registry = RegistryClient::new(Arc::new(StaticRegistry::new()), RegistryOpt::default());
        ServiceClient::new(registry, ServiceDescriptor::new("com.example.Foo", "dev"))
    }

    #[test]
    fn attachments_follow_the_descriptor() {
        let sd = ServiceDescriptor::new("com.example.Foo", "dev");
        assert_eq!("DEV", sd.environment());
        assert_eq!(DEFAULT_VERSION, sd.version());
        assert_eq!(
            vec![
                ("path".to_owned(), "com.example.Foo".to_owned()),
                ("interface".to_owned(), "com.example.Foo".to_owned()),
                ("version".to_owned(), "DEV".to_owned()),
                ("timeout".to_owned(), "60000".to_owned()),
            ],
            sd.attachments()
        );

        let sd = sd.with_group("blue").with_version("2.7.0");
        assert_eq!(Some("blue"), sd.group());
        assert_eq!("2.7.0", sd.version());
        assert_eq!(("group".to_owned(), "blue".to_owned()), sd.attachments()[3]);
        assert_eq!(5, sd.attachments().len());
    }

    #[test]
    fn request_carries_the_parameter_types() {
        let req = client()
            .request("find", vec![Arg::long(1), Arg::string("x")])
            .unwrap();
        assert_eq!("JLjava/lang/String;", req.parameter_types);
        assert_eq!("DEV", req.environment);
        assert_eq!(2, req.args.len());
    }

    #[tokio::test]
    async fn oversized_payload_fails_before_resolving() {
        let client = client();
        let err = client
            .invoke("upload", vec![Arg::new("[byte", Value::Bytes(vec![0; MAX_PAYLOAD + 1]))])
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::PayloadTooLarge, err.kind());
        assert!(client.registry().cache().is_empty());
    }

    #[tokio::test]
    async fn unresolvable_service_is_reported() {
        let err = client().invoke("bar", vec![]).await.unwrap_err();
        assert_eq!(ErrorKind::RegistryLookup, err.kind());
    }
}
