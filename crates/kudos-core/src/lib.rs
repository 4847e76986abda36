//! # Kudos Core Library
//!
//! This library provides the core business logic for the Kudos gamification
//! and activity-throttling engine. It implements a CLI-first philosophy where
//! all operations are available via a standalone CLI binary, with any outer
//! service surface being a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Engine**: A facade that sequences each tracked activity through the
//!   throttle gate, points ledger, streak tracker, achievement engine, and
//!   best-effort prediction and notification stages
//! - **Storage**: SQLite-based profile/history persistence and TOML-based
//!   configuration
//! - **Notifications**: Trait seam for external delivery transports,
//!   dispatched fire-and-forget under a bounded timeout
//!
//! ## Key Components
//!
//! - [`GamificationEngine`]: Orchestrating facade; one instance per process
//! - [`ActivityThrottler`]: Per-subject, per-activity rate limiting
//! - [`PointsLedger`]: Append-only point crediting
//! - [`AchievementEngine`]: Catalog-driven achievement evaluation
//! - [`EngagementPredictor`]: Engagement scoring and risk classification

pub mod achievements;
pub mod activity;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod notify;
pub mod prediction;
pub mod profile;
pub mod storage;
pub mod streak;
pub mod throttle;

pub use achievements::{AchievementCondition, AchievementDefinition, AchievementEngine};
pub use activity::ActivityType;
pub use config::{EngineConfig, PredictorConfig};
pub use engine::{
    GamificationEngine, RealtimeStats, RedeemOutcome, TrackOutcome, TrackRequest, TrackResult,
};
pub use error::{ConfigError, EngineError, StoreError};
pub use events::GamificationEvent;
pub use ledger::{Award, CreditOutcome, PointsLedger};
pub use notify::{NotificationFanout, Notifier, NotifyError, NullNotifier};
pub use prediction::{EngagementPrediction, EngagementPredictor, PredictionFactors, RiskLevel};
pub use profile::{GamificationProfile, PointsHistoryEntry, SubjectId};
pub use storage::{GamificationStore, MemoryStore, SqliteStore};
pub use streak::{StreakTracker, StreakUpdate};
pub use throttle::{
    ActiveCooldown, ActivityThrottler, ThrottleDecision, ThrottlePolicy, ThrottleRejection,
    ThrottleStore, WindowKind,
};
