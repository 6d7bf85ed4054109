pub mod browser;
pub mod catalog;
pub mod config;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod rotation;
pub mod telemetry;

pub use catalog::{Category, UrlCatalog};
pub use config::{
    ChromiumSection, KioskConfig, NetworkSection, ObservabilitySection, ResilienceSection,
    RotationSection,
};
pub use error::{CatalogError, ConfigError, Result};
pub use metrics::{MetricsError, MetricsReporter, MetricsSnapshot, RotationMetrics};
pub use rotation::{
    ExitReason, FailureKind, HttpProbe, ProbeError, ResilienceManager, RotationError,
    RotationScheduler, SessionState, VisitOutcome,
};
pub use telemetry::{TelemetryError, VisitTelemetry};
