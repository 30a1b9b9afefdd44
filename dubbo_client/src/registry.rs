use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};

use futures::future::{BoxFuture, FutureExt, Shared};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, info, warn};

use crate::{
    cache::EndpointCache,
    discovery::Registry,
    provider::Provider,
    service::ServiceDescriptor,
};
use dubbo_protocol::{Error, ErrorKind, Result};

/// What to do when no provider is published for the requested environment.
#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString)]
pub enum ProviderFallback {
    /// bind to the last provider listed, whatever its environment
    LastSeen,
    /// fail the resolution
    Fail,
}

#[derive(Debug, Clone)]
pub struct RegistryOpt {
    /// the root node services are published under
    pub root: String,
    pub fallback: ProviderFallback,
}

impl Default for RegistryOpt {
    fn default() -> Self {
        RegistryOpt {
            root: "dubbo".to_owned(),
            fallback: ProviderFallback::LastSeen,
        }
    }
}

type Resolution = Shared<BoxFuture<'static, Result<Provider>>>;

struct Inner {
    registry: Arc<dyn Registry>,
    opt: RegistryOpt,
    cache: EndpointCache,
    inflight: Mutex<HashMap<(String, String), Resolution>>,
    watching: Mutex<HashSet<String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves service paths to providers and keeps the endpoint cache fresh.
///
/// Cloning is cheap; every clone shares the registry connection, the cache
/// and the in-flight resolutions. Hand one clone to each `ServiceClient`
/// that should share them.
#[derive(Clone)]
pub struct RegistryClient {
    inner: Arc<Inner>,
}

impl RegistryClient {
    pub fn new(registry: Arc<dyn Registry>, opt: RegistryOpt) -> RegistryClient {
        RegistryClient {
            inner: Arc::new(Inner {
                registry,
                opt,
                cache: EndpointCache::new(),
                inflight: Mutex::new(HashMap::new()),
                watching: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Connects to a ZooKeeper ensemble.
    #[cfg(feature = "zookeeper")]
    pub async fn connect(conn: &str, opt: RegistryOpt) -> Result<RegistryClient> {
        let registry = crate::discovery::ZookeeperRegistry::connect(conn).await?;
        Ok(RegistryClient::new(Arc::new(registry), opt))
    }

    pub fn cache(&self) -> &EndpointCache {
        &self.inner.cache
    }

    pub fn opt(&self) -> &RegistryOpt {
        &self.inner.opt
    }

    fn root(&self) -> &str {
        self.inner.opt.root.trim_matches('/')
    }

    pub fn providers_path(&self, service_path: &str) -> String {
        format!("/{}/{}/providers", self.root(), service_path)
    }

    pub fn consumers_path(&self, service_path: &str) -> String {
        format!("/{}/{}/consumers", self.root(), service_path)
    }

    /// Looks up a provider for `path` in the registry and caches it.
    ///
    /// Concurrent resolutions of the same path and environment share one
    /// registry round trip.
    pub async fn resolve(&self, path: &str, env: &str) -> Result<Provider> {
        let key = (path.to_owned(), env.to_owned());
        let resolution = {
            let mut inflight = lock(&self.inner.inflight);
            match inflight.get(&key) {
                Some(r) => {
                    debug!(service = path, "joining in-flight resolution");
                    r.clone()
                }
                None => {
                    let this = self.clone();
                    let done = key.clone();
                    let r = async move {
                        let rt = this.lookup(&done.0, &done.1).await;
                        lock(&this.inner.inflight).remove(&done);
                        rt
                    }
                    .boxed()
                    .shared();
                    inflight.insert(key, r.clone());
                    r
                }
            }
        };
        resolution.await
    }

    async fn lookup(&self, path: &str, env: &str) -> Result<Provider> {
        let providers_path = self.providers_path(path);
        let children = self.inner.registry.children(&providers_path).await?;
        let provider = select_provider(path, env, &children, self.inner.opt.fallback)?;
        info!(
            service = path,
            env,
            endpoint = %provider.endpoint,
            methods = provider.methods.len(),
            "resolved provider"
        );
        self.inner.cache.put(path, provider.clone());
        self.arm_watch(path, env, children);
        Ok(provider)
    }

    /// Re-resolves `path` in the background once its providers differ from
    /// `seen`, the listing the cached entry came from. At most one watch is
    /// armed per path.
    ///
    /// When the watch or the refresh fails the cache entry is dropped, so the
    /// next call resolves afresh and arms a new watch.
    fn arm_watch(&self, path: &str, env: &str, seen: Vec<String>) {
        if !lock(&self.inner.watching).insert(path.to_owned()) {
            return;
        }
        let this = self.clone();
        let path = path.to_owned();
        let env = env.to_owned();
        tokio::spawn(async move {
            let providers_path = this.providers_path(&path);
            let fired = this.inner.registry.watch(&providers_path, &seen).await;
            lock(&this.inner.watching).remove(&path);
            if let Err(err) = fired {
                warn!(service = %path, error = %err, "failed to watch providers");
                this.inner.cache.invalidate(&path);
                return;
            }
            debug!(service = %path, "providers changed");
            if let Err(err) = this.resolve(&path, &env).await {
                warn!(service = %path, error = %err, "failed to refresh providers");
                this.inner.cache.invalidate(&path);
            }
        });
    }

    /// Publishes this process as a consumer of `service` and returns the
    /// node path created.
    pub async fn register_consumer(
        &self,
        service: &ServiceDescriptor,
        host: &str,
    ) -> Result<String> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let mut url = format!(
            "consumer://{}/{}?category=consumers&check=false&dubbo={}&interface={}&side=consumer&timestamp={}&version={}",
            host,
            service.path(),
            service.version(),
            service.path(),
            timestamp,
            service.environment(),
        );
        if let Some(group) = service.group() {
            url.push_str("&group=");
            url.push_str(group);
        }
        let node = format!(
            "{}/{}",
            self.consumers_path(service.path()),
            utf8_percent_encode(&url, NON_ALPHANUMERIC)
        );
        self.inner.registry.create_ephemeral(&node).await?;
        info!(service = service.path(), host, "registered consumer");
        Ok(node)
    }

    pub async fn close(&self) {
        self.inner.registry.close().await;
    }
}

/// Picks the first provider published for `env`, falling back per `fallback`.
pub fn select_provider(
    service: &str,
    env: &str,
    children: &[String],
    fallback: ProviderFallback,
) -> Result<Provider> {
    if children.is_empty() {
        return Err(Error::new(
            ErrorKind::RegistryLookup,
            format!("no provider found for {}", service),
        ));
    }

    let mut last = None;
    for child in children {
        match Provider::parse(child) {
            Ok(p) if p.version.as_deref() == Some(env) => return Ok(p),
            Ok(p) => last = Some(p),
            Err(err) => warn!(service, error = %err, "skipping malformed provider"),
        }
    }

    match (fallback, last) {
        (ProviderFallback::LastSeen, Some(p)) => {
            warn!(
                service,
                env,
                endpoint = %p.endpoint,
                "no provider for this environment, using the last one listed"
            );
            Ok(p)
        }
        _ => Err(Error::new(
            ErrorKind::RegistryLookup,
            format!("no provider for {} matches environment {}", service, env),
        )),
    }
}
