//! API key rotation: hand out the least-used key, reset counters daily.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const RESET_INTERVAL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
struct UsageFile {
    timestamp: DateTime<Utc>,
    usage: HashMap<String, u64>,
}

#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<String>,
    usage: HashMap<String, u64>,
    last_reset: DateTime<Utc>,
    store: Option<PathBuf>,
}

impl KeyPool {
    /// Duplicate and blank keys are dropped; order is kept for tie-breaking.
    pub fn new(keys: Vec<String>, now: DateTime<Utc>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(keys.len());
        for key in keys {
            let key = key.trim().to_string();
            if !key.is_empty() && !unique.contains(&key) {
                unique.push(key);
            }
        }
        let usage = unique.iter().map(|k| (k.clone(), 0)).collect();
        Self {
            keys: unique,
            usage,
            last_reset: now,
            store: None,
        }
    }

    /// Like [`KeyPool::new`], restoring counters from `path` when they are
    /// less than a day old.
    pub fn with_store(keys: Vec<String>, path: PathBuf, now: DateTime<Utc>) -> Self {
        let mut pool = Self::new(keys, now);
        match std::fs::read_to_string(&path)
            .ok()
            .map(|s| serde_json::from_str::<UsageFile>(&s))
        {
            Some(Ok(saved)) if saved.timestamp + reset_interval() > now => {
                for key in &pool.keys {
                    if let Some(&used) = saved.usage.get(key) {
                        pool.usage.insert(key.clone(), used);
                    }
                }
                pool.last_reset = saved.timestamp;
                log::debug!("Restored key usage from {}", path.display());
            }
            Some(Ok(_)) => log::debug!("Key usage in {} is stale, starting fresh", path.display()),
            Some(Err(err)) => {
                log::warn!("Ignoring unreadable key usage {}: {}", path.display(), err)
            }
            None => {}
        }
        pool.store = Some(path);
        pool
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn usage(&self, key: &str) -> u64 {
        self.usage.get(key).copied().unwrap_or(0)
    }

    pub fn get_active_key(&mut self) -> Option<String> {
        self.get_active_key_at(Utc::now())
    }

    /// Least-used key; the earliest configured key wins ties.
    pub fn get_active_key_at(&mut self, now: DateTime<Utc>) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        if now - self.last_reset >= reset_interval() {
            log::info!("Resetting API key usage counters");
            for used in self.usage.values_mut() {
                *used = 0;
            }
            self.last_reset = now;
            self.save();
        }
        self.keys
            .iter()
            .min_by_key(|k| self.usage(k))
            .cloned()
    }

    pub fn increment_usage(&mut self, key: &str, cost: u64) {
        *self.usage.entry(key.to_string()).or_insert(0) += cost;
        self.save();
    }

    fn save(&self) {
        let Some(ref path) = self.store else {
            return;
        };
        if let Err(err) = self.write_usage(path) {
            log::warn!("Failed to save key usage: {:#}", err);
        }
    }

    fn write_usage(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_string(&UsageFile {
            timestamp: self.last_reset,
            usage: self.usage.clone(),
        })?;
        std::fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn reset_interval() -> Duration {
    Duration::hours(RESET_INTERVAL_HOURS)
}
