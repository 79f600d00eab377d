//! Reactive filter and selection views over live collections.
//!
//! A [`ViewEngine`] combines three independently changing inputs into one
//! derived view: a debounced search token, a toggled key set and the latest
//! snapshot of a [`CollectionSource`]. Every output is published through a
//! [`Replay`] slot, so late subscribers start from the most recent value.

/// Engine configuration loaded from TOML or built in code.
pub mod config;
/// Quiescence-window debouncing for search input.
pub mod debounce;
/// Filter composition engine and its handle.
pub mod engine;
/// Error types shared by engines and sources.
pub mod error;
/// Single-slot multicast of the latest value.
pub mod replay;
/// Session-gated collection sources.
pub mod session;
/// Collection source contract and the in-memory store.
pub mod source;
mod task;
/// Toggle reducer for active key sets.
pub mod toggle;
/// View policies and the pure derivation step.
pub mod view;

pub use config::EngineConfig;
pub use engine::{EngineBuilder, EngineStatus, InputOutcome, ViewEngine};
pub use error::{ConfigError, EngineError, SourceError};
pub use replay::{Mapped, Publisher, Replay, ReplayCell};
pub use session::{MemorySession, SessionGate, SessionProvider, SessionState};
pub use source::{CollectionSource, MemoryStore, Snapshot, SourceSink, SourceStream, SourceUpdate};
pub use toggle::{InitialKeys, KeySet, ToggleEvent, ToggleReducer};
pub use view::{DerivedView, ViewMode, ViewPolicy, ViewRow};
