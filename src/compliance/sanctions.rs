//! Sanctions screening: remote oracle plus a local list.
//!
//! The local list is loaded once at startup into a [`SanctionsCache`]. The
//! cache grows whenever the oracle confirms a hit and is never pruned, so a
//! later lookup for the same address succeeds even if the oracle is down.

use crate::chain::{normalize_address, SanctionsOracle};
use crate::error::{Error, FaultPolicy, Result};
use alloy_primitives::Address;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Static sanctions list record as shipped on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSanctionsList {
    /// Sanctioned addresses, any case.
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl LocalSanctionsList {
    /// Load a list from a `.json` or `.toml` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Invalid sanctions list {}: {e}", path.display())))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Invalid sanctions list {}: {e}", path.display())))
        }
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Lookups that found the address.
    pub hits: u64,
    /// Lookups that did not.
    pub misses: u64,
    /// Addresses added after startup.
    pub additions: u64,
}

/// Append-only set of lower-cased sanctioned addresses.
///
/// Clones share the same underlying set. Inserting an address that is
/// already present is a no-op.
#[derive(Clone, Default)]
pub struct SanctionsCache {
    inner: Arc<RwLock<HashSet<String>>>,
    stats: Arc<RwLock<CacheStats>>,
}

impl SanctionsCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a cache from a static list.
    #[must_use]
    pub fn from_list(list: &LocalSanctionsList) -> Self {
        let set: HashSet<String> = list
            .addresses
            .iter()
            .map(|a| a.trim().to_ascii_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        info!("Sanctions cache seeded with {} addresses", set.len());
        Self {
            inner: Arc::new(RwLock::new(set)),
            stats: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    /// Check whether an address is in the cache.
    pub fn contains(&self, address: &Address) -> bool {
        let found = self.inner.read().contains(&normalize_address(address));

        let mut stats = self.stats.write();
        if found {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }

        found
    }

    /// Add an address. Returns `true` if it was not already present.
    pub fn insert(&self, address: &Address) -> bool {
        let added = self.inner.write().insert(normalize_address(address));
        if added {
            self.stats.write().additions += 1;
            debug!("Added {} to sanctions cache", normalize_address(address));
        }
        added
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }

    /// Number of cached addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Which source produced a sanctions answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionsSourceKind {
    /// The oracle answered.
    Oracle,
    /// The oracle is not configured; only the local list was consulted.
    LocalList,
    /// The oracle failed and the local list was used instead.
    LocalFallback,
}

/// Result of a sanctions lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanctionsCheck {
    /// Whether the address is sanctioned.
    pub sanctioned: bool,
    /// Where the answer came from.
    pub source: SanctionsSourceKind,
}

/// Combines the remote oracle and the local cache.
pub struct SanctionsSource {
    oracle: Option<Arc<dyn SanctionsOracle>>,
    cache: SanctionsCache,
    on_oracle_fault: FaultPolicy,
}

impl SanctionsSource {
    /// Local-list-only source.
    #[must_use]
    pub fn local(cache: SanctionsCache) -> Self {
        Self {
            oracle: None,
            cache,
            on_oracle_fault: FaultPolicy::Degrade,
        }
    }

    /// Oracle-backed source with the local cache as fallback.
    #[must_use]
    pub fn with_oracle(
        oracle: Arc<dyn SanctionsOracle>,
        cache: SanctionsCache,
        on_oracle_fault: FaultPolicy,
    ) -> Self {
        Self {
            oracle: Some(oracle),
            cache,
            on_oracle_fault,
        }
    }

    /// Whether an oracle is configured.
    #[must_use]
    pub fn uses_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    /// The shared cache.
    #[must_use]
    pub fn cache(&self) -> &SanctionsCache {
        &self.cache
    }

    /// Check an address against the oracle and the local list.
    ///
    /// The answer is the logical OR of both. An oracle hit is added to the
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns the oracle error if the oracle fails and the fault policy is
    /// [`FaultPolicy::Propagate`].
    pub async fn check(&self, address: &Address) -> Result<SanctionsCheck> {
        let Some(oracle) = &self.oracle else {
            return Ok(SanctionsCheck {
                sanctioned: self.cache.contains(address),
                source: SanctionsSourceKind::LocalList,
            });
        };

        match oracle.is_sanctioned(*address).await {
            Ok(true) => {
                if self.cache.insert(address) {
                    info!(
                        "Oracle confirmed sanctioned address {}",
                        normalize_address(address)
                    );
                }
                Ok(SanctionsCheck {
                    sanctioned: true,
                    source: SanctionsSourceKind::Oracle,
                })
            }
            Ok(false) => Ok(SanctionsCheck {
                sanctioned: self.cache.contains(address),
                source: SanctionsSourceKind::Oracle,
            }),
            Err(e) => match self.on_oracle_fault {
                FaultPolicy::Degrade => {
                    warn!(
                        "Sanctions oracle failed for {}, using local list: {}",
                        normalize_address(address),
                        e
                    );
                    Ok(SanctionsCheck {
                        sanctioned: self.cache.contains(address),
                        source: SanctionsSourceKind::LocalFallback,
                    })
                }
                FaultPolicy::Propagate => {
                    warn!(
                        "Sanctions oracle failed for {}: {}",
                        normalize_address(address),
                        e
                    );
                    Err(Error::Sanctions(format!("Oracle lookup failed: {e}")))
                }
            },
        }
    }
}
