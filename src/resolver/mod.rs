//! Resolvers turn a [`BinaryInfo`] into a download URL for the host platform.
//!
//! Each release-hosting platform gets an adapter implementing [`Resolver`]; the
//! [`ResolverRegistry`] holds the active adapters in registration order.

pub mod github;

use crate::config::Settings;
use crate::types::BinaryInfo;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};

pub use github::GitHubResolver;

#[async_trait]
pub trait Resolver: Send + Sync {
    /// Stable identifier recorded in the state file so `update` can reuse the
    /// same resolver.
    fn name(&self) -> &str;

    /// Returns the download URL of an asset built for this host, or `None` when
    /// the release exists but ships nothing for this platform. On success the
    /// descriptor's `installed_version` and `resolver` are filled in.
    async fn resolve(&self, binary: &mut BinaryInfo) -> Result<Option<String>>;

    /// Latest released version of the binary's source, without asset matching.
    async fn resolve_latest_version(&self, binary: &BinaryInfo) -> Result<String>;
}

/// Ordered set of resolvers, deduplicated by [`Resolver::name`].
#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: RwLock<Vec<Arc<dyn Resolver>>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in adapters configured from `settings`.
    pub fn with_default_resolvers(settings: &Settings) -> Self {
        let registry = Self::new();
        let github = GitHubResolver::new(&settings.github_api_url)
            .with_token(settings.github_token.clone());
        registry.register(Arc::new(github));
        registry
    }

    /// Adds a resolver unless one with the same name is already registered.
    pub fn register(&self, resolver: Arc<dyn Resolver>) {
        let mut resolvers = self
            .resolvers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if resolvers.iter().any(|r| r.name() == resolver.name()) {
            tracing::debug!("Resolver '{}' already registered", resolver.name());
            return;
        }
        tracing::debug!("Registering resolver '{}'", resolver.name());
        resolvers.push(resolver);
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn unregister(&self, name: &str) {
        self.resolvers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|r| r.name() != name);
    }

    /// Snapshot of the registered resolvers; later (un)registrations do not
    /// affect it.
    pub fn list(&self) -> Vec<Arc<dyn Resolver>> {
        self.resolvers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Resolver>> {
        self.resolvers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.name() == name)
            .cloned()
    }
}
