//! Vocalis engine - state reconciliation and capability resolution for the dictation app.
//!
//! Events from the platform layer and the recognition worker flow through the
//! [`bus`] into one [`StateReconciler`], which owns the application snapshot.
//! Commands go out through the [`PlatformHost`] trait; their failures come back
//! as normalized error envelopes rather than panics.

pub mod bus;
pub mod capability;
pub mod diagnostics;
pub mod error_normalizer;
pub mod host;
pub mod model_status;
pub mod reconciler;
pub mod sidecar;
pub mod state;
pub mod transcript;

pub use bus::{EventPublisher, EventPump, PumpStats, ShutdownHandle};
pub use capability::{resolve, PlatformReport, Resolution};
pub use diagnostics::{DiagnosticsComposer, DiagnosticsInput};
pub use error_normalizer::{local_error, normalize_error};
pub use host::{HostError, HostSelfCheck, PlatformHost};
pub use model_status::{DownloadEstimate, ModelStatusTracker, ModelUpdateOutcome};
pub use reconciler::{CommandResult, Snapshot, StateReconciler};
pub use sidecar::{SidecarHealthMonitor, SidecarTransition};
pub use state::{Lifecycle, PhaseOutcome};
pub use transcript::{normalize_entry, History};
