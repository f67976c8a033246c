use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::exchange::{Exchange, ExchangeError, SymbolMeta};

use super::retry::RetryPolicy;

/// Per-process cache of contract rules, keyed by exchange symbol.
///
/// Entries are never invalidated. Two concurrent misses for the same symbol
/// may both fetch; the first insert wins and both see equal values.
#[derive(Debug, Clone, Default)]
pub struct SymbolMetaCache {
    entries: Arc<RwLock<HashMap<String, SymbolMeta>>>,
}

impl SymbolMetaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, exchange_symbol: &str) -> Option<SymbolMeta> {
        self.entries.read().await.get(exchange_symbol).cloned()
    }

    pub async fn insert(&self, meta: SymbolMeta) {
        self.entries
            .write()
            .await
            .insert(meta.exchange_symbol.clone(), meta);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Cached rules for `exchange_symbol`, fetching them on first use.
    /// The lock is not held across the network call.
    pub async fn get_or_fetch(
        &self,
        exchange: &dyn Exchange,
        exchange_symbol: &str,
        retry: &RetryPolicy,
    ) -> Result<SymbolMeta, ExchangeError> {
        if let Some(meta) = self.get(exchange_symbol).await {
            return Ok(meta);
        }

        let fetched = retry
            .run("symbol_meta", || exchange.symbol_meta(exchange_symbol))
            .await?;

        tracing::debug!(
            exchange = exchange.name(),
            symbol = exchange_symbol,
            lot_step = %fetched.lot_step,
            min_size = %fetched.min_size,
            "Cached symbol rules"
        );

        let mut entries = self.entries.write().await;
        Ok(entries
            .entry(exchange_symbol.to_string())
            .or_insert(fetched)
            .clone())
    }
}
