//! 协作方接口的测试替身
//!
//! 每个替身按顺序记录收到的调用，多数可切换为失败模式。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use psmaster_core::{
    AttemptEvent, EventSink, MasterError, MasterEvent, MasterResult, MatrixId, MatrixMeta,
    MatrixMetaManager, MatrixSpec, MetaSnapshotStore, ProcessTerminator, PsFailureReporter, PsId,
};

/// 按顺序记录所有投递的事件
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<MasterEvent>>,
    fail: AtomicBool,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开启后 `emit` 返回错误且不记录事件
    pub fn fail_emits(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<MasterEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn failure_count(&self) -> usize {
        self.count_matching(|event| matches!(event, AttemptEvent::Failed(_)))
    }

    pub fn success_count(&self) -> usize {
        self.count_matching(|event| matches!(event, AttemptEvent::Succeeded))
    }

    fn count_matching<F: Fn(&AttemptEvent) -> bool>(&self, predicate: F) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(MasterEvent::attempt_event)
            .filter(|event| predicate(event))
            .count()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: MasterEvent) -> MasterResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MasterError::event_sink("recording sink configured to fail"));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// 只记录终止请求，不退出进程
#[derive(Debug, Default)]
pub struct RecordingTerminator {
    calls: Mutex<Vec<(i32, String)>>,
}

impl RecordingTerminator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(i32, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessTerminator for RecordingTerminator {
    fn terminate(&self, exit_status: i32, reason: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((exit_status, reason.to_string()));
    }
}

/// 记录转发的PS失败计数
#[derive(Debug, Default)]
pub struct RecordingFailureReporter {
    reports: Mutex<Vec<(String, BTreeMap<PsId, u32>)>>,
}

impl RecordingFailureReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(String, BTreeMap<PsId, u32>)> {
        self.reports.lock().unwrap().clone()
    }
}

impl PsFailureReporter for RecordingFailureReporter {
    fn report_failures(&self, reporter: &str, counters: &BTreeMap<PsId, u32>) -> MasterResult<()> {
        self.reports
            .lock()
            .unwrap()
            .push((reporter.to_string(), counters.clone()));
        Ok(())
    }
}

/// 写入总是失败的快照存储，记录尝试次数
#[derive(Debug, Default)]
pub struct FailingSnapshotStore {
    attempts: AtomicUsize,
}

impl FailingSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetaSnapshotStore for FailingSnapshotStore {
    async fn write_snapshot(&self, _matrices: &[MatrixMeta]) -> MasterResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MasterError::persistence("snapshot storage unavailable"))
    }
}

/// 保留全部快照写入的快照存储
#[derive(Debug, Default)]
pub struct RecordingSnapshotStore {
    snapshots: Mutex<Vec<Vec<MatrixMeta>>>,
}

impl RecordingSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn latest(&self) -> Option<Vec<MatrixMeta>> {
        self.snapshots.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl MetaSnapshotStore for RecordingSnapshotStore {
    async fn write_snapshot(&self, matrices: &[MatrixMeta]) -> MasterResult<()> {
        self.snapshots.lock().unwrap().push(matrices.to_vec());
        Ok(())
    }
}

/// 所有操作都失败的矩阵表，记录调用次数
#[derive(Debug, Default)]
pub struct UnavailableMatrixMeta {
    calls: AtomicUsize,
}

impl UnavailableMatrixMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn unavailable<T>(&self) -> MasterResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(MasterError::persistence("matrix table unavailable"))
    }
}

#[async_trait]
impl MatrixMetaManager for UnavailableMatrixMeta {
    async fn create_matrices(&self, _specs: Vec<MatrixSpec>) -> MasterResult<Vec<MatrixMeta>> {
        self.unavailable()
    }

    async fn get_matrices(&self, _names: &[String]) -> MasterResult<Vec<MatrixMeta>> {
        self.unavailable()
    }

    async fn release_matrices(&self, _names: &[String]) -> MasterResult<()> {
        self.unavailable()
    }

    async fn all_matrix_meta(&self) -> MasterResult<BTreeMap<MatrixId, MatrixMeta>> {
        self.unavailable()
    }

    async fn check_matrices_created(&self, _names: &[String]) -> MasterResult<bool> {
        self.unavailable()
    }

    async fn record_ps_inventory(&self, _ps: PsId, _matrices: Vec<MatrixId>) -> MasterResult<()> {
        self.unavailable()
    }
}
