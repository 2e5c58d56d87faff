//! Description cache — persists `(provider_model, tool_name)` ->
//! `ToolDescription` across restarts so description generation (the
//! dominant startup cost) only runs once per model/tool pair.
//!
//! Storage is an append-only JSONL journal, replayed into an in-memory
//! map on load. `put` is idempotent per key: writing the same key twice
//! overwrites the prior entry (both in memory and via a fresh append;
//! the journal is compacted on the next load).

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use parking_lot::RwLock;
use webagent_domain::model::ToolDescription;

pub struct DescriptionCache {
    inner: RwLock<HashMap<String, ToolDescription>>,
    log_path: Option<PathBuf>,
}

impl DescriptionCache {
    /// Opens (and replays) the cache journal at `log_path`, or starts
    /// empty and in-memory-only when `log_path` is `None`.
    pub fn open(log_path: Option<PathBuf>) -> Self {
        let mut map = HashMap::new();
        if let Some(path) = &log_path {
            if let Ok(text) = std::fs::read_to_string(path) {
                for line in text.lines() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<ToolDescription>(line) {
                        Ok(desc) => {
                            let key = ToolDescription::cache_key(&desc.provider_model, &desc.tool_name);
                            map.insert(key, desc);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "skipping malformed description cache line");
                        }
                    }
                }
            }
        }
        Self {
            inner: RwLock::new(map),
            log_path,
        }
    }

    pub fn get(&self, model: &str, tool_name: &str) -> Option<ToolDescription> {
        let key = ToolDescription::cache_key(model, tool_name);
        self.inner.read().get(&key).cloned()
    }

    /// Idempotent overwrite for `(model, tool_name)`. Appends to the
    /// journal; on append failure, degrades to in-memory-only for this
    /// run and emits a warning (never fatal — §4.1 cache-store-failure
    /// semantics).
    pub fn put(
        &self,
        model: &str,
        tool_name: &str,
        description: String,
        parameters_info: String,
        generation_time_ms: u64,
    ) -> ToolDescription {
        let desc = ToolDescription::new(model, tool_name, description, parameters_info, generation_time_ms);
        let key = ToolDescription::cache_key(model, tool_name);
        self.inner.write().insert(key, desc.clone());
        self.append_journal(&desc);
        desc
    }

    /// Increments `usage_count` and `last_used_at` for an existing entry.
    /// A no-op when the key isn't present — touching is best-effort
    /// bookkeeping, never a precondition for a successful lookup.
    pub fn touch(&self, model: &str, tool_name: &str) {
        let key = ToolDescription::cache_key(model, tool_name);
        let updated = {
            let mut map = self.inner.write();
            if let Some(desc) = map.get_mut(&key) {
                desc.usage_count += 1;
                desc.last_used_at = Utc::now();
                Some(desc.clone())
            } else {
                None
            }
        };
        if let Some(desc) = updated {
            self.append_journal(&desc);
        }
    }

    fn append_journal(&self, desc: &ToolDescription) {
        let Some(path) = &self.log_path else { return };
        let line = match serde_json::to_string(desc) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize description cache entry");
                return;
            }
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = result {
            tracing::warn!(error = %e, path = %path.display(), "description cache journal append failed, degrading to in-memory-only");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrip() {
        let cache = DescriptionCache::open(None);
        cache.put("gpt-4", "browseWebAndReturnText", "desc".into(), "{}".into(), 1200);
        let got = cache.get("gpt-4", "browseWebAndReturnText").unwrap();
        assert_eq!(got.description, "desc");
        assert_eq!(got.usage_count, 0);
    }

    #[test]
    fn get_miss_returns_none() {
        let cache = DescriptionCache::open(None);
        assert!(cache.get("gpt-4", "nonexistent").is_none());
    }

    #[test]
    fn put_is_idempotent_overwrite() {
        let cache = DescriptionCache::open(None);
        cache.put("gpt-4", "t", "first".into(), "{}".into(), 100);
        cache.put("gpt-4", "t", "second".into(), "{}".into(), 50);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("gpt-4", "t").unwrap().description, "second");
    }

    #[test]
    fn touch_increments_usage_count() {
        let cache = DescriptionCache::open(None);
        cache.put("gpt-4", "t", "d".into(), "{}".into(), 10);
        cache.touch("gpt-4", "t");
        assert_eq!(cache.get("gpt-4", "t").unwrap().usage_count, 1);
    }

    #[test]
    fn touch_on_missing_key_is_noop() {
        let cache = DescriptionCache::open(None);
        cache.touch("gpt-4", "ghost");
        assert!(cache.is_empty());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("descriptions.jsonl");

        let cache = DescriptionCache::open(Some(path.clone()));
        cache.put("gpt-4", "browseWebAndReturnText", "desc".into(), "{}".into(), 900);
        drop(cache);

        let reopened = DescriptionCache::open(Some(path));
        let got = reopened.get("gpt-4", "browseWebAndReturnText").unwrap();
        assert_eq!(got.description, "desc");
    }

    #[test]
    fn reopen_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("descriptions.jsonl");
        std::fs::write(&path, "not json\n").unwrap();
        let cache = DescriptionCache::open(Some(path));
        assert!(cache.is_empty());
    }

    #[test]
    fn distinct_models_are_independent_keys() {
        let cache = DescriptionCache::open(None);
        cache.put("gpt-4", "t", "gpt4-desc".into(), "{}".into(), 10);
        cache.put("claude-3", "t", "claude-desc".into(), "{}".into(), 10);
        assert_eq!(cache.get("gpt-4", "t").unwrap().description, "gpt4-desc");
        assert_eq!(cache.get("claude-3", "t").unwrap().description, "claude-desc");
        assert_eq!(cache.len(), 2);
    }
}
