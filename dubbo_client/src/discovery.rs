use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use async_trait::async_trait;
use tokio::sync::Notify;

use dubbo_protocol::Result;

/// The coordination service providers publish themselves to.
///
/// Paths are absolute node paths such as `/dubbo/com.example.Foo/providers`.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Lists the child names of `path`. A missing node lists as empty.
    async fn children(&self, path: &str) -> Result<Vec<String>>;

    /// Completes once the children of `path` differ from `seen`, the listing
    /// the caller last acted on. Returns at once if they already differ.
    async fn watch(&self, path: &str, seen: &[String]) -> Result<()>;

    /// Creates an ephemeral node that disappears with this session.
    async fn create_ephemeral(&self, path: &str) -> Result<()>;

    async fn close(&self) {}
}

/// An in-memory registry whose children are set by hand.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    nodes: RwLock<HashMap<String, Vec<String>>>,
    changed: Notify,
}

impl StaticRegistry {
    pub fn new() -> StaticRegistry {
        Default::default()
    }

    pub fn set_children(&self, path: &str, children: Vec<String>) {
        {
            let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
            nodes.insert(path.to_owned(), children);
        }
        self.changed.notify_waiters();
    }

    pub fn add_child(&self, path: &str, child: String) {
        {
            let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
            nodes.entry(path.to_owned()).or_default().push(child);
        }
        self.changed.notify_waiters();
    }

    pub fn remove_child(&self, path: &str, child: &str) {
        {
            let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(children) = nodes.get_mut(path) {
                children.retain(|c| c != child);
            }
        }
        self.changed.notify_waiters();
    }

    fn snapshot(&self, path: &str) -> Vec<String> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.get(path).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn children(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.snapshot(path))
    }

    async fn watch(&self, path: &str, seen: &[String]) -> Result<()> {
        loop {
            let notified = self.changed.notified();
            if self.snapshot(path) != seen {
                return Ok(());
            }
            notified.await;
        }
    }

    async fn create_ephemeral(&self, path: &str) -> Result<()> {
        let (parent, child) = match path.rfind('/') {
            Some(idx) => (&path[..idx], &path[idx + 1..]),
            None => ("", path),
        };
        self.add_child(parent, child.to_owned());
        Ok(())
    }
}

#[cfg(feature = "zookeeper")]
pub use self::zookeeper::ZookeeperRegistry;

#[cfg(feature = "zookeeper")]
mod zookeeper {
    use async_trait::async_trait;
    use tracing::{debug, info};
    use zookeeper_client as zk;

    use super::Registry;
    use dubbo_protocol::{Error, ErrorKind, Result};

    fn registry_err(err: zk::Error) -> Error {
        Error::new(ErrorKind::Registry, err)
    }

    /// A registry backed by a ZooKeeper ensemble.
    pub struct ZookeeperRegistry {
        client: zk::Client,
    }

    impl ZookeeperRegistry {
        /// Connects to `conn`, e.g. `127.0.0.1:2181,127.0.0.2:2181`, and
        /// waits for the session to be established.
        pub async fn connect(conn: &str) -> Result<ZookeeperRegistry> {
            let client = zk::Client::connect(conn).await.map_err(registry_err)?;
            info!(conn, "zookeeper connected");
            Ok(ZookeeperRegistry { client })
        }
    }

    #[async_trait]
    impl Registry for ZookeeperRegistry {
        async fn children(&self, path: &str) -> Result<Vec<String>> {
            match self.client.get_children(path).await {
                Ok((children, _)) => Ok(children),
                Err(zk::Error::NoNode) => Ok(Vec::new()),
                Err(err) => Err(registry_err(err)),
            }
        }

        async fn watch(&self, path: &str, seen: &[String]) -> Result<()> {
            let (children, _, watcher) = match self.client.get_and_watch_children(path).await {
                Ok(listed) => listed,
                Err(zk::Error::NoNode) if !seen.is_empty() => return Ok(()),
                Err(err) => return Err(registry_err(err)),
            };
            if children != seen {
                debug!(path, "children changed before the watch was set");
                return Ok(());
            }
            let event = watcher.changed().await;
            debug!(path, ?event, "children changed");
            Ok(())
        }

        async fn create_ephemeral(&self, path: &str) -> Result<()> {
            let options = zk::CreateMode::Ephemeral.with_acls(zk::Acls::anyone_all());
            match self.client.create(path, &[], &options).await {
                Ok(_) | Err(zk::Error::NodeExists) => Ok(()),
                Err(err) => Err(registry_err(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    const PATH: &str = "/dubbo/com.example.Foo/providers";

    #[tokio::test]
    async fn missing_node_lists_as_empty() {
        let registry = StaticRegistry::new();
        assert!(registry.children(PATH).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn watch_fires_on_change() {
        let registry = Arc::new(StaticRegistry::new());
        registry.set_children(PATH, vec!["a".to_owned()]);

        let watcher = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.watch(PATH, &["a".to_owned()]).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        registry.add_child(PATH, "b".to_owned());
        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn watch_returns_at_once_when_already_stale() {
        let registry = StaticRegistry::new();
        registry.set_children(PATH, vec!["b".to_owned()]);
        tokio::time::timeout(
            Duration::from_millis(100),
            registry.watch(PATH, &["a".to_owned()]),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn ephemeral_nodes_become_children() {
        let registry = StaticRegistry::new();
        registry
            .create_ephemeral("/dubbo/com.example.Foo/consumers/c1")
            .await
            .unwrap();
        assert_eq!(
            vec!["c1".to_owned()],
            registry
                .children("/dubbo/com.example.Foo/consumers")
                .await
                .unwrap()
        );
    }
}
