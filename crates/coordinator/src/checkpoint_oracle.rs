use std::collections::BTreeSet;
use std::sync::Mutex;

use tracing::info;

use psmaster_core::{CheckpointOracle, CheckpointRound, MatrixId};

#[derive(Debug, Default)]
struct OracleState {
    last_round: u64,
    pending: Option<CheckpointRound>,
}

/// 手动触发的checkpoint就绪策略
///
/// `trigger` 打开新一轮（轮次号单调递增），`complete` 关闭当前轮次。
/// 轮次打开期间每次PS心跳都会收到COMMIT，PS按轮次号去重。
#[derive(Debug, Default)]
pub struct ManualCheckpointOracle {
    state: Mutex<OracleState>,
}

impl ManualCheckpointOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut OracleState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    /// 打开新一轮checkpoint，返回轮次号；已有未完成轮次时将其替换
    pub fn trigger<I: IntoIterator<Item = MatrixId>>(&self, matrices: I) -> u64 {
        let matrices: BTreeSet<MatrixId> = matrices.into_iter().collect();
        self.with_state(|state| {
            state.last_round += 1;
            info!(
                "打开checkpoint轮次 {} (矩阵: {:?})",
                state.last_round, matrices
            );
            state.pending = Some(CheckpointRound {
                id: state.last_round,
                matrices,
            });
            state.last_round
        })
    }

    /// 关闭当前轮次
    pub fn complete(&self) -> Option<CheckpointRound> {
        self.with_state(|state| {
            let finished = state.pending.take();
            if let Some(round) = &finished {
                info!("checkpoint轮次 {} 已完成", round.id);
            }
            finished
        })
    }
}

impl CheckpointOracle for ManualCheckpointOracle {
    fn pending_round(&self) -> Option<CheckpointRound> {
        self.with_state(|state| state.pending.clone())
    }
}
