//! Ingestion pipeline and learning engine for the learnproxy reverse proxy.
//!
//! Covers path normalization, the dispatch decision (proxy vs mock vs
//! failover), the learning buffer with background consolidation, the
//! recursive JSON schema learner and synthetic response generator, the
//! sliding-window anomaly detector with adaptive thresholds, and the
//! structural drift detector. Persistence, authentication, and HTTP
//! transport are deliberately thin layers on top of this crate (see
//! `learnproxy-http` and `learnproxy-cli`).

pub mod behavior_store;
pub mod broadcaster;
pub mod buffer;
pub mod chaos;
pub mod config;
pub mod consolidator;
pub mod dispatch;
pub mod drift;
pub mod error;
pub mod formats;
pub mod generator;
pub mod health;
pub mod logging;
pub mod normalizer;
pub mod persistence;
pub mod schema;

pub use behavior_store::{BehaviorStore, EndpointBehavior};
pub use broadcaster::{Broadcaster, TransactionEvent};
pub use buffer::{LearningBuffer, Shutdown, Transaction};
pub use chaos::{ChaosOutcome, ChaosProfile, ChaosRegistry};
pub use config::{AppConfig, Failover, RunMode};
pub use dispatch::{
    endpoint_key, Engine, ForwardError, Forwarder, InboundRequest, OutboundResponse, ReqwestForwarder,
};
pub use drift::{DriftAlert, DriftRegistry, Issue, IssueKind, Severity};
pub use error::{Error, Result};
pub use health::{HealthBand, HealthEvaluation, HealthRegistry, HealthSample};
pub use normalizer::normalize;
pub use persistence::{JsonFileStore, PersistedState, Storage};
pub use schema::{Descriptor, FormatHint};
