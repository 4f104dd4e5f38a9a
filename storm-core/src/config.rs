//! Process-wide configuration for Storm (spec.md §6).
//!
//! `StormConfig` is a typed key/value store. Each recognised key has a typed
//! accessor; an unset key falls through to an environment variable, then to
//! a hard default, following the `ContextAssemblyDefaults::from_env` pattern.

use std::collections::HashMap;

/// The dynamic-update shape strategy (spec.md §4.5 / §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Never consult the write planner; always emit a full-row UPDATE.
    Off,
    /// Always emit a full-row UPDATE, but still consult dirty state to decide
    /// whether to emit at all.
    Entity,
    /// Emit UPDATE statements scoped to the dirty columns, subject to the
    /// shape cap.
    Field,
}

impl UpdateMode {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OFF" => Some(Self::Off),
            "ENTITY" => Some(Self::Entity),
            "FIELD" => Some(Self::Field),
            _ => None,
        }
    }
}

/// The dirty-check comparison strategy (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyCheck {
    /// Compare references; primitive fields compared by value.
    Instance,
    /// Compare using column-type equality.
    Value,
}

impl DirtyCheck {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INSTANCE" => Some(Self::Instance),
            "VALUE" => Some(Self::Value),
            _ => None,
        }
    }
}

/// Process-wide Storm configuration (spec.md §6).
///
/// Keys not present in `overrides` fall through to the matching environment
/// variable (`STORM_UPDATE_DEFAULT_MODE`, `STORM_UPDATE_DIRTY_CHECK`,
/// `STORM_UPDATE_MAX_SHAPES`, `STORM_BATCH_DEFAULT_SIZE`,
/// `STORM_CHUNK_DEFAULT_SIZE`), then to the documented default.
#[derive(Debug, Clone, Default)]
pub struct StormConfig {
    overrides: HashMap<&'static str, String>,
}

impl StormConfig {
    /// An empty configuration; every accessor falls through to env/default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the current process environment only.
    pub fn from_env() -> Self {
        Self::new()
    }

    /// Explicitly set a key, taking precedence over the environment.
    pub fn set(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        self.overrides.insert(key, value.into());
        self
    }

    fn lookup(&self, key: &'static str, env_var: &str) -> Option<String> {
        self.overrides
            .get(key)
            .cloned()
            .or_else(|| std::env::var(env_var).ok())
    }

    /// `storm.update.default_mode`, default `ENTITY`.
    pub fn update_default_mode(&self) -> UpdateMode {
        self.lookup("storm.update.default_mode", "STORM_UPDATE_DEFAULT_MODE")
            .and_then(|s| UpdateMode::parse(&s))
            .unwrap_or(UpdateMode::Entity)
    }

    /// `storm.update.dirty_check`, default `INSTANCE`.
    pub fn update_dirty_check(&self) -> DirtyCheck {
        self.lookup("storm.update.dirty_check", "STORM_UPDATE_DIRTY_CHECK")
            .and_then(|s| DirtyCheck::parse(&s))
            .unwrap_or(DirtyCheck::Instance)
    }

    /// `storm.update.max_shapes`, default 16.
    pub fn update_max_shapes(&self) -> usize {
        self.lookup("storm.update.max_shapes", "STORM_UPDATE_MAX_SHAPES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(16)
    }

    /// `storm.batch.default_size`, default 32.
    pub fn batch_default_size(&self) -> usize {
        self.lookup("storm.batch.default_size", "STORM_BATCH_DEFAULT_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(32)
    }

    /// `storm.chunk.default_size`, default 1000.
    pub fn chunk_default_size(&self) -> usize {
        self.lookup("storm.chunk.default_size", "STORM_CHUNK_DEFAULT_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_overrides_or_env() {
        let cfg = StormConfig::new();
        assert_eq!(cfg.update_default_mode(), UpdateMode::Entity);
        assert_eq!(cfg.update_dirty_check(), DirtyCheck::Instance);
        assert_eq!(cfg.update_max_shapes(), 16);
        assert_eq!(cfg.batch_default_size(), 32);
        assert_eq!(cfg.chunk_default_size(), 1000);
    }

    #[test]
    fn explicit_override_wins_over_default() {
        let mut cfg = StormConfig::new();
        cfg.set("storm.update.max_shapes", "4");
        assert_eq!(cfg.update_max_shapes(), 4);
    }

    #[test]
    fn unparseable_mode_falls_back_to_default() {
        let mut cfg = StormConfig::new();
        cfg.set("storm.update.default_mode", "nonsense");
        assert_eq!(cfg.update_default_mode(), UpdateMode::Entity);
    }
}
