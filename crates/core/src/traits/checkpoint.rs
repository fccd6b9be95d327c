use std::collections::BTreeMap;

use crate::errors::MasterResult;
use crate::models::{CheckpointRound, PsId};

/// 全局checkpoint就绪判断
///
/// 返回 `Some(round)` 表示前置条件满足，round中列出需要保存的矩阵。
pub trait CheckpointOracle: Send + Sync {
    fn pending_round(&self) -> Option<CheckpointRound>;
}

/// PS失败的间接观测（其他进程上报的失败计数）转发目标
pub trait PsFailureReporter: Send + Sync {
    /// `reporter` 为上报方Attempt的展示名
    fn report_failures(&self, reporter: &str, counters: &BTreeMap<PsId, u32>) -> MasterResult<()>;
}
