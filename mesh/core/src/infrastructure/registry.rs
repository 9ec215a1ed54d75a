// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Process-wide client registry.
//!
//! Authority clients (configuration, policy) are constructed once per
//! `(domain, port)` and reused for the process lifetime. The registry is an
//! explicit object owned by the composition root and injected where
//! needed — no hidden globals. Construction is single-flight: the mutex is
//! held across the build, so concurrent first use from multiple workers
//! cannot race two clients into existence.
//!
//! Entries are never evicted or refreshed. If an authority moves, the
//! cached client goes stale for the remainder of the process — a deliberate
//! trade of staleness for simplicity, inherited from the substrate design.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::Mutex;

use crate::domain::error::MeshError;

/// Get-or-create cache keyed by `(domain, port)`.
pub struct ClientRegistry<C> {
    clients: Mutex<HashMap<(String, u16), C>>,
}

impl<C: Clone> ClientRegistry<C> {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached client for the authority, building it on first
    /// use. A failed build is not cached; the next caller retries.
    pub async fn get_or_create<F, Fut>(
        &self,
        domain: &str,
        port: u16,
        build: F,
    ) -> Result<C, MeshError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, MeshError>>,
    {
        let key = (domain.to_string(), port);
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }
        let client = build().await?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    /// Number of distinct authorities with a live client.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}

impl<C: Clone> Default for ClientRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
