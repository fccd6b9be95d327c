pub mod attempt_lifecycle;
pub mod checkpoint_oracle;
pub mod commit_coordinator;
pub mod event_sink;
pub mod failure_tracker;
pub mod liveness_registry;
pub mod master_service;
pub mod matrix_table;
pub mod metadata_reconciler;
pub mod terminator;
pub mod timeout_scanner;

pub use attempt_lifecycle::AttemptLifecycle;
pub use checkpoint_oracle::ManualCheckpointOracle;
pub use commit_coordinator::{CommitCoordinator, CommitDecision};
pub use event_sink::ChannelEventSink;
pub use failure_tracker::PsFailureTracker;
pub use liveness_registry::{LivenessRegistry, Registries};
pub use master_service::{LiveAttempts, MasterCollaborators, MasterService};
pub use matrix_table::InMemoryMatrixMetaManager;
pub use metadata_reconciler::reconcile;
pub use terminator::{ChannelTerminator, TerminationRequest};
pub use timeout_scanner::{
    ScanReport, ScannerHandle, TimeoutScanner, ALL_CLIENTS_LOST_EXIT_STATUS, HEARTBEAT_TIMEOUT,
};
