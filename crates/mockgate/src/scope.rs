//! Scope registry - lifecycle management for mock scopes.
//!
//! A scope is one registered [`ResponseStrategy`] plus its recorder, keyed by
//! the value test code puts in the discovery header. The registry is an
//! ordinary owned value; share it with `Arc` between the test and its
//! services.

use crate::config::MockConfig;
use crate::matcher::CompiledMatcher;
use crate::recorder::{Recorder, Report, RequestRecord};
use crate::strategy::{MatchStrategy, ResponseSpec, ResponseStrategy};
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// Scope Key
// ============================================================================

/// Opaque identifier of one open scope.
///
/// Keys must be unique among concurrently open scopes. The registry does not
/// enforce this; opening a key twice replaces the first scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Random key, unique per call.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Key derived from the source location of the caller.
    ///
    /// The same call site always yields the same key.
    #[track_caller]
    pub fn from_call_site() -> Self {
        Self::from_location(Location::caller())
    }

    pub fn from_location(location: &Location<'_>) -> Self {
        let mut hasher = DefaultHasher::new();
        format!(
            "{}|{}|{}",
            location.file(),
            location.line(),
            location.column()
        )
        .hash(&mut hasher);
        Self(format!("{:016x}", hasher.finish()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ScopeKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

// ============================================================================
// Scope
// ============================================================================

/// One rule of a scope, with its matcher compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: MatchStrategy,
    pub matcher: CompiledMatcher,
    pub response: ResponseSpec,
}

/// Runtime state of an open scope
#[derive(Debug)]
pub struct Scope {
    key: ScopeKey,
    strategy: ResponseStrategy,
    rules: Vec<CompiledRule>,
    recorder: Recorder,
}

impl Scope {
    fn new(key: ScopeKey, strategy: ResponseStrategy) -> Self {
        let rules = strategy
            .entries()
            .into_iter()
            .map(|(rule, response)| CompiledRule {
                rule: rule.clone(),
                matcher: CompiledMatcher::compile(rule),
                response: response.clone(),
            })
            .collect();

        Self {
            key,
            strategy,
            rules,
            recorder: Recorder::new(),
        }
    }

    pub fn key(&self) -> &ScopeKey {
        &self.key
    }

    pub fn strategy(&self) -> &ResponseStrategy {
        &self.strategy
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Rules in registration order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Every rule matching `url`, in registration order.
    pub fn matching_rules<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a CompiledRule> {
        self.rules.iter().filter(move |r| r.matcher.matches(url))
    }

    pub fn matches_any(&self, url: &str) -> bool {
        self.matching_rules(url).next().is_some()
    }
}

/// Caller's handle on an open scope.
///
/// The handle keeps the scope's recorder alive, so a report can still be
/// taken after the scope was closed.
#[derive(Debug, Clone)]
pub struct ScopeHandle {
    scope: Arc<Scope>,
}

impl ScopeHandle {
    pub fn key(&self) -> &ScopeKey {
        self.scope.key()
    }

    pub fn report(&self) -> Report {
        self.scope.recorder().snapshot()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Owns every open scope, keyed by [`ScopeKey`].
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    scopes: RwLock<HashMap<ScopeKey, Arc<Scope>>>,
    config: MockConfig,
}

impl ScopeRegistry {
    pub fn new(config: MockConfig) -> Self {
        Self {
            scopes: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    /// Register `strategy` under `key`, replacing any scope already there.
    pub fn open(&self, key: impl Into<ScopeKey>, strategy: ResponseStrategy) -> ScopeHandle {
        let key = key.into();
        let rule_count = strategy.len();
        let scope = Arc::new(Scope::new(key.clone(), strategy));

        let previous = self.scopes.write().insert(key.clone(), Arc::clone(&scope));
        if previous.is_some() {
            warn!("Scope {} was already open, replacing it", key);
        }
        info!("Scope {} opened with {} rule(s)", key, rule_count);

        ScopeHandle { scope }
    }

    /// Open a scope under a fresh random key.
    pub fn open_scope(&self, strategy: ResponseStrategy) -> ScopeHandle {
        self.open(ScopeKey::random(), strategy)
    }

    /// Remove the scope under `key`. Unknown or already closed keys are a no-op.
    ///
    /// Returns the final report when a scope was removed.
    pub fn close(&self, key: &ScopeKey) -> Option<Report> {
        let removed = self.scopes.write().remove(key);
        match removed {
            Some(scope) => {
                let report = scope.recorder().snapshot();
                info!(
                    "Scope {} closed after {} request(s), {} execution(s)",
                    key,
                    report.requests.len(),
                    report.total_executed
                );
                Some(report)
            }
            None => {
                debug!("Scope {} is not open, nothing to close", key);
                None
            }
        }
    }

    /// Close the scope behind `handle`. Idempotent.
    ///
    /// A newer scope that replaced it under the same key stays open.
    pub fn close_scope(&self, handle: &ScopeHandle) {
        let mut scopes = self.scopes.write();
        let is_current = scopes
            .get(handle.key())
            .is_some_and(|current| Arc::ptr_eq(current, &handle.scope));
        if is_current {
            scopes.remove(handle.key());
            debug!("Scope {} closed", handle.key());
        }
    }

    pub fn report(&self, handle: &ScopeHandle) -> Report {
        handle.report()
    }

    pub fn lookup(&self, key: &ScopeKey) -> Option<Arc<Scope>> {
        self.scopes.read().get(key).cloned()
    }

    pub fn lookup_str(&self, key: &str) -> Option<Arc<Scope>> {
        self.scopes.read().get(&ScopeKey::new(key)).cloned()
    }

    pub fn is_open(&self, key: &ScopeKey) -> bool {
        self.scopes.read().contains_key(key)
    }

    pub fn active_scopes(&self) -> usize {
        self.scopes.read().len()
    }

    /// Append to the request log of `key`. False when the scope is not open.
    pub fn record(&self, key: &ScopeKey, record: RequestRecord) -> bool {
        match self.lookup(key) {
            Some(scope) => {
                scope.recorder().record(record);
                true
            }
            None => false,
        }
    }

    /// Increment the counter of `rule` in `key`. False when the scope is not open.
    pub fn bump(&self, key: &ScopeKey, rule: &MatchStrategy) -> bool {
        match self.lookup(key) {
            Some(scope) => {
                scope.recorder().bump(rule);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self, key: &ScopeKey) -> Option<Report> {
        self.lookup(key).map(|scope| scope.recorder().snapshot())
    }
}
