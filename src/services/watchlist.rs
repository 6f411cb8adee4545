use log::info;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::Result;
use crate::models::ticker::{SuffixPolicy, Ticker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(Ticker),
    AlreadyPresent(Ticker),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed(Ticker),
    NotFound(Ticker),
}

/// The set of tracked tickers, kept in insertion order.
///
/// Mutations are serialized by an internal lock; requests work on the copy
/// returned by [`WatchlistStore::snapshot`] so a concurrent removal never
/// changes a fetch that is already in flight.
pub struct WatchlistStore {
    policy: SuffixPolicy,
    tickers: Mutex<Vec<Ticker>>,
}

impl WatchlistStore {
    pub fn new(policy: SuffixPolicy) -> Self {
        Self {
            policy,
            tickers: Mutex::new(Vec::new()),
        }
    }

    /// Builds a store pre-filled with `symbols`, normalized and de-duplicated.
    pub fn with_symbols<I, S>(policy: SuffixPolicy, symbols: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let store = Self::new(policy);
        for symbol in symbols {
            store.add(symbol.as_ref())?;
        }
        Ok(store)
    }

    pub fn policy(&self) -> &SuffixPolicy {
        &self.policy
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Ticker>> {
        self.tickers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, raw_symbol: &str) -> Result<AddOutcome> {
        let ticker = Ticker::normalize(raw_symbol, &self.policy)?;
        let mut tickers = self.lock();
        if tickers.contains(&ticker) {
            return Ok(AddOutcome::AlreadyPresent(ticker));
        }
        info!("Watch-list: added {}", ticker);
        tickers.push(ticker.clone());
        Ok(AddOutcome::Added(ticker))
    }

    pub fn remove(&self, raw_symbol: &str) -> Result<RemoveOutcome> {
        let ticker = Ticker::normalize(raw_symbol, &self.policy)?;
        let mut tickers = self.lock();
        match tickers.iter().position(|t| t == &ticker) {
            Some(idx) => {
                tickers.remove(idx);
                info!("Watch-list: removed {}", ticker);
                Ok(RemoveOutcome::Removed(ticker))
            }
            None => Ok(RemoveOutcome::NotFound(ticker)),
        }
    }

    /// Current tickers in insertion order.
    pub fn list(&self) -> Vec<Ticker> {
        self.snapshot()
    }

    /// Immutable copy for the duration of one request.
    pub fn snapshot(&self) -> Vec<Ticker> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
