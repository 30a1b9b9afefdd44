use std::{future::Future, io, time::Duration};

use bytes::Bytes;
use strum_macros::{Display, EnumIter, EnumString};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tracing::{debug, warn};

use crate::{
    provider::{Endpoint, Provider},
    registry::RegistryClient,
    service::ServiceDescriptor,
};
use dubbo_protocol::{
    CallResult, Error, ErrorKind, FrameBuffer, ObjectCodec, Response, Result, Value,
};

#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString)]
pub enum FailMode {
    //Failover resolves the provider again and retries
    Failover = 0,
    //Failfast returns error immediately
    Failfast = 1,
    //Failtry use current endpoint again
    Failtry = 2,
}

#[derive(Debug, Copy, Clone)]
pub struct Opt {
    /// retries after a transport failure
    pub retries: u8,
    pub retry_backoff: Duration,
    pub fail_mode: FailMode,
    /// zero waits as long as the OS does
    pub connect_timeout: Duration,
    /// zero never times out; providers enforce the advertised timeout
    pub read_timeout: Duration,
    pub nodelay: Option<bool>,
    /// also fail fast on unknown methods when the endpoint came from cache
    pub check_methods_on_cache_hit: bool,
}

impl Default for Opt {
    fn default() -> Self {
        Opt {
            retries: 1,
            retry_backoff: Duration::from_secs(2),
            fail_mode: FailMode::Failover,
            connect_timeout: Default::default(),
            read_timeout: Default::default(),
            nodelay: None,
            check_methods_on_cache_hit: false,
        }
    }
}

#[derive(Debug, Copy, Clone, Display, PartialEq)]
pub enum SessionState {
    Idle,
    Resolving,
    Connecting,
    Sending,
    AwaitingResponse,
    Retrying,
    Succeeded,
    Failed,
}

/// One invocation: resolve, connect, send, read the response frame.
///
/// Each session owns its connection and drops it as soon as the response
/// frame is complete or the session gives up.
pub struct CallSession<'a> {
    registry: &'a RegistryClient,
    codec: &'a dyn ObjectCodec,
    opt: &'a Opt,
    service: &'a ServiceDescriptor,
    method: &'a str,
    frame: Bytes,
    state: SessionState,
    retried: u8,
}

impl<'a> CallSession<'a> {
    pub fn new(
        registry: &'a RegistryClient,
        codec: &'a dyn ObjectCodec,
        opt: &'a Opt,
        service: &'a ServiceDescriptor,
        method: &'a str,
        frame: Bytes,
    ) -> CallSession<'a> {
        CallSession {
            registry,
            codec,
            opt,
            service,
            method,
            frame,
            state: SessionState::Idle,
            retried: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            service = self.service.path(),
            method = self.method,
            from = %self.state,
            to = %next,
            "call session"
        );
        self.state = next;
    }

    pub async fn run(mut self) -> Result<Option<Value>> {
        let rt = self.drive().await;
        match rt {
            Ok(_) => self.transition(SessionState::Succeeded),
            Err(_) => self.transition(SessionState::Failed),
        }
        rt
    }

    async fn drive(&mut self) -> Result<Option<Value>> {
        let mut fresh = false;
        let mut pinned: Option<Endpoint> = None;
        loop {
            self.transition(SessionState::Resolving);
            let endpoint = match pinned.take() {
                Some(ep) => ep,
                None => self.endpoint(fresh).await?,
            };

            let err = match self.exchange(&endpoint).await {
                Ok(resp) => return self.classify(resp),
                Err(err) if err.is_transport() => err,
                Err(err) => return Err(err),
            };
            warn!(
                service = self.service.path(),
                method = self.method,
                endpoint = %endpoint,
                error = %err,
                "transport failed"
            );
            if self.opt.fail_mode == FailMode::Failfast || self.retried >= self.opt.retries {
                return Err(err);
            }

            self.retried += 1;
            self.transition(SessionState::Retrying);
            tokio::time::sleep(self.opt.retry_backoff).await;
            match self.opt.fail_mode {
                FailMode::Failtry => pinned = Some(endpoint),
                _ => fresh = true,
            }
        }
    }

    /// Reads the cache unless `fresh`; a cache hit never touches the registry.
    async fn endpoint(&self, fresh: bool) -> Result<Endpoint> {
        let path = self.service.path();
        if !fresh {
            if let Some(provider) = self.registry.cache().lookup(path) {
                if self.opt.check_methods_on_cache_hit {
                    self.check_method(&provider)?;
                }
                return Ok(provider.endpoint);
            }
        }
        let provider = self
            .registry
            .resolve(path, self.service.environment())
            .await?;
        self.check_method(&provider)?;
        Ok(provider.endpoint)
    }

    fn check_method(&self, provider: &Provider) -> Result<()> {
        if provider.has_method(self.method) {
            return Ok(());
        }
        Err(Error::new(
            ErrorKind::MethodNotFound,
            format!(
                "{} is not provided by {} at {}",
                self.method,
                self.service.path(),
                provider.endpoint
            ),
        ))
    }

    async fn exchange(&mut self, endpoint: &Endpoint) -> Result<Response> {
        self.transition(SessionState::Connecting);
        let addr = endpoint.to_string();
        let mut stream = with_timeout(self.opt.connect_timeout, TcpStream::connect(addr.as_str())).await?;
        if let Some(nodelay) = self.opt.nodelay {
            stream.set_nodelay(nodelay)?;
        }

        self.transition(SessionState::Sending);
        stream.write_all(&self.frame).await?;

        self.transition(SessionState::AwaitingResponse);
        let mut frame = FrameBuffer::new();
        let mut chunk = vec![0u8; 8192];
        loop {
            let n = with_timeout(self.opt.read_timeout, stream.read(&mut chunk)).await?;
            if n == 0 {
                return Err(Error::new(
                    ErrorKind::Transport,
                    format!(
                        "connection to {} closed after {} bytes",
                        endpoint,
                        frame.received()
                    ),
                ));
            }
            if frame.push(&chunk[..n]) {
                break;
            }
        }
        drop(stream);

        debug!(endpoint = %endpoint, bytes = frame.received(), "response frame complete");
        frame.into_response()
    }

    fn classify(&self, resp: Response) -> Result<Option<Value>> {
        match resp.decode(self.codec) {
            CallResult::Success(v) => Ok(Some(v)),
            CallResult::Empty => Ok(None),
            CallResult::Failure(msg) if resp.is_ok() => Err(Error::new(ErrorKind::Protocol, msg)),
            CallResult::Failure(msg) => {
                Err(Error::new(ErrorKind::Protocol, msg).with_status(resp.status()))
            }
        }
    }
}

async fn with_timeout<F, T>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    if limit.as_millis() == 0 {
        return Ok(fut.await?);
    }
    match tokio::time::timeout(limit, fut).await {
        Ok(rt) => Ok(rt?),
        Err(_) => Err(Error::new(
            ErrorKind::Transport,
            format!("timed out after {:?}", limit),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{discovery::StaticRegistry, registry::RegistryOpt};
    use dubbo_protocol::Hessian2;
    use std::sync::Arc;

    fn registry_with(child: &str) -> RegistryClient {
        let registry = Arc::new(StaticRegistry::new());
        registry.set_children("/dubbo/com.example.Foo/providers", vec![child.to_owned()]);
        RegistryClient::new(registry, RegistryOpt::default())
    }

    #[test]
    fn default_opt_retries_once_after_two_seconds() {
        let opt = Opt::default();
        assert_eq!(1, opt.retries);
        assert_eq!(Duration::from_secs(2), opt.retry_backoff);
        assert_eq!(FailMode::Failover, opt.fail_mode);
        assert!(!opt.check_methods_on_cache_hit);
    }

    #[tokio::test]
    async fn unknown_method_fails_before_connecting() {
        // nothing listens on port 9; reaching the transport would be a
        // transport error instead
        let registry =
            registry_with("dubbo://127.0.0.1:9/com.example.Foo?version=DEV&methods=bar,baz");
        let service = ServiceDescriptor::new("com.example.Foo", "DEV");
        let opt = Opt::default();
        let session = CallSession::new(
            &registry,
            &Hessian2,
            &opt,
            &service,
            "qux",
            Bytes::from_static(b"unused"),
        );
        assert_eq!(SessionState::Idle, session.state());
        let err = session.run().await.unwrap_err();
        assert_eq!(ErrorKind::MethodNotFound, err.kind());
    }

    #[tokio::test]
    async fn cache_hits_skip_the_method_check_unless_asked() {
        let registry = registry_with("dubbo://127.0.0.1:9/com.example.Foo?version=DEV&methods=bar");
        registry.cache().put(
            "com.example.Foo",
            Provider::new(Endpoint::new("127.0.0.1", 9), vec!["bar".to_owned()]),
        );
        let service = ServiceDescriptor::new("com.example.Foo", "DEV");
        let opt = Opt {
            check_methods_on_cache_hit: true,
            ..Default::default()
        };
        let err = CallSession::new(&registry, &Hessian2, &opt, &service, "qux", Bytes::new())
            .run()
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::MethodNotFound, err.kind());
    }

    #[tokio::test]
    async fn failfast_surfaces_the_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let registry = registry_with(&format!(
            "dubbo://127.0.0.1:{}/com.example.Foo?version=DEV&methods=bar",
            port
        ));
        let service = ServiceDescriptor::new("com.example.Foo", "DEV");
        let opt = Opt {
            fail_mode: FailMode::Failfast,
            ..Default::default()
        };
        let err = CallSession::new(&registry, &Hessian2, &opt, &service, "bar", Bytes::new())
            .run()
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::Transport, err.kind());
    }
}
