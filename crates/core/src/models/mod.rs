pub mod attempt;
pub mod command;
pub mod event;
pub mod matrix;
pub mod report;

pub use attempt::{
    AttemptKey, AttemptLocation, AttemptRole, ClientId, Location, PsAgentAttemptId, PsAttemptId,
    PsId, Role, WorkerAttemptId,
};
pub use command::MasterCommand;
pub use event::{AppEvent, AttemptEvent, MasterEvent};
pub use matrix::{
    CheckpointRound, CommitRequest, MatrixCommit, MatrixId, MatrixMeta, MatrixSpec, PartitionId,
    PartitionMeta, PartitionReport, PartitionState, PsMatrixReport, RecoverPartition,
    RecoverSource,
};
pub use report::{
    PsAgentReport, PsReport, PsReportResponse, ReconcileDelta, ReportPayload, WorkerReport,
    WorkerReportResponse,
};
