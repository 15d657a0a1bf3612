//! Deterministic HTTP request interception and mocking for tests.
//!
//! Open a scope in a [`ScopeRegistry`], send requests through a
//! [`MockService`] stamped with the scope's key, and read the [`Report`] of
//! what was observed. Requests without a key pass through to the inner
//! service.

// ===== Mock registration =====
pub mod config;
pub mod fixture;
pub mod strategy;

// ===== Engine =====
pub mod gate;
pub mod matcher;
pub mod recorder;
pub mod scope;
pub mod synth;

// ===== Integration =====
pub mod client;
pub mod error;
pub mod service;

pub use client::{passthrough_client, stub, stub_with, MockClient, PassthroughClient};
pub use config::{MockConfig, UnmatchedPolicy, DEFAULT_SCOPE_HEADER};
pub use error::{BoxError, MockError};
pub use fixture::{Fixture, FixtureError};
pub use gate::{GateDecision, InterceptionGate};
pub use recorder::{Report, RequestRecord, UnmatchedRequest};
pub use scope::{Scope, ScopeHandle, ScopeKey, ScopeRegistry};
pub use service::{MockBody, MockLayer, MockService, Offline};
pub use strategy::{
    FailureInfo, MatchStrategy, ResponseCode, ResponseSpec, ResponseStrategy, UnsupportedStatus,
};
pub use synth::{Emission, Outcome, ResponseSynthesizer, Synthesis};

/// Install a `tracing` subscriber writing to the test harness output.
///
/// Filtering follows `RUST_LOG`. Safe to call from every test; only the first
/// call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
