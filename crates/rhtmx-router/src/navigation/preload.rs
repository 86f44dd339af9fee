//! Preload bookkeeping: one in-flight load per base-relative path

use super::{ChainNode, RevalidationHandle};
use crate::lock;
use crate::BoxFuture;
use futures::future::{FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Mutex;

/// Loaded chain data waiting to be consumed by a navigation
#[derive(Debug, Clone)]
pub struct Preloaded {
    pub chain: Vec<ChainNode>,
    /// Receives background refreshes of the preloaded data
    pub(crate) revalidation: RevalidationHandle,
}

pub(crate) type SharedPreload = Shared<BoxFuture<'static, Preloaded>>;

#[derive(Default)]
pub(crate) struct Preloads {
    entries: Mutex<HashMap<String, SharedPreload>>,
}

impl Preloads {
    /// Join the load for `path`, starting it when there is none
    ///
    /// The flag is true when an existing load was joined.
    pub fn join_or_start<F>(&self, path: &str, start: F) -> (SharedPreload, bool)
    where
        F: FnOnce() -> BoxFuture<'static, Preloaded>,
    {
        let mut entries = lock(&self.entries);
        if let Some(existing) = entries.get(path) {
            return (existing.clone(), true);
        }

        let shared = start().shared();
        entries.insert(path.to_string(), shared.clone());
        (shared, false)
    }

    /// Remove and return the load for `path`
    pub fn take(&self, path: &str) -> Option<SharedPreload> {
        lock(&self.entries).remove(path)
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}
