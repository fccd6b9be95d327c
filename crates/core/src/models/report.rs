use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::attempt::PsId;
use super::command::MasterCommand;
use super::matrix::{CommitRequest, MatrixMeta, MatrixId, PsMatrixReport, RecoverPartition};

/// 心跳携带的通用状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    /// 0.0 ~ 1.0
    pub progress: Option<f64>,
    pub metrics: BTreeMap<String, String>,
}

impl ReportPayload {
    pub fn with_progress(progress: f64) -> Self {
        Self {
            progress: Some(progress),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub payload: ReportPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PsAgentReport {
    pub payload: ReportPayload,
}

/// PS心跳：状态 + 矩阵清单 + 对其他PS的失败观测计数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PsReport {
    pub payload: ReportPayload,
    pub matrices: Vec<PsMatrixReport>,
    pub failed_ps_reports: BTreeMap<PsId, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReportResponse {
    pub command: MasterCommand,
    pub active_task_num: usize,
}

/// 三类矩阵差异
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileDelta {
    pub need_create: Vec<MatrixMeta>,
    pub need_release: Vec<MatrixId>,
    pub need_recover: Vec<RecoverPartition>,
}

impl ReconcileDelta {
    pub fn is_empty(&self) -> bool {
        self.need_create.is_empty() && self.need_release.is_empty() && self.need_recover.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsReportResponse {
    pub command: MasterCommand,
    pub commit: Option<CommitRequest>,
    pub delta: ReconcileDelta,
}

impl PsReportResponse {
    pub fn shutdown() -> Self {
        Self {
            command: MasterCommand::Shutdown,
            commit: None,
            delta: ReconcileDelta::default(),
        }
    }
}
