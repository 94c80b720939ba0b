use crate::bindings::Bindings;
use crate::error::Result;
use crate::store::{Item, KnowledgeBase, NodeId};
use crate::term::Statement;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A knowledge base shared between tasks
///
/// Every operation takes one exclusive lock around the whole store, so
/// forward chaining, backward search and retraction cascades always see a
/// consistent snapshot.
#[derive(Debug, Clone, Default)]
pub struct SharedKnowledgeBase {
    inner: Arc<Mutex<KnowledgeBase>>,
}

impl SharedKnowledgeBase {
    /// Wraps an existing store
    #[must_use]
    pub fn new(kb: KnowledgeBase) -> Self {
        Self {
            inner: Arc::new(Mutex::new(kb)),
        }
    }

    /// See [`KnowledgeBase::assert`].
    ///
    /// # Errors
    ///
    /// Propagates the store's error.
    pub async fn assert(&self, item: impl Into<Item>) -> Result<NodeId> {
        self.inner.lock().await.assert(item)
    }

    /// See [`KnowledgeBase::retract`].
    ///
    /// # Errors
    ///
    /// Propagates the store's error.
    pub async fn retract(&self, item: impl Into<Item>) -> Result<()> {
        self.inner.lock().await.retract(item)
    }

    /// See [`KnowledgeBase::ask`].
    ///
    /// # Errors
    ///
    /// Propagates the store's error.
    pub async fn ask(&self, query: &Statement) -> Result<Vec<Bindings>> {
        self.inner.lock().await.ask(query)
    }

    /// See [`KnowledgeBase::query`].
    pub async fn query(&self, query: &Statement) -> Vec<Bindings> {
        self.inner.lock().await.query(query)
    }

    /// Runs `f` with the lock held, for multi-step operations that must not
    /// interleave with other callers.
    pub async fn with<R>(&self, f: impl FnOnce(&mut KnowledgeBase) -> R) -> R {
        let mut kb = self.inner.lock().await;
        f(&mut kb)
    }
}
