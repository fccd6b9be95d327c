use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, warn};

use psmaster_core::{
    CheckpointOracle, CommitRequest, MasterCommand, MatrixCommit, MatrixId, MatrixMeta,
    PsFailureReporter, PsId,
};

/// 针对单次PS心跳的checkpoint决策
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDecision {
    pub command: MasterCommand,
    pub commit: Option<CommitRequest>,
}

/// 决定每次PS心跳是否下发COMMIT，并转发其他进程对PS失败的观测计数
///
/// 调用方需先确认Attempt仍在存活表中，未知Attempt直接回复SHUTDOWN，不会走到这里。
pub struct CommitCoordinator {
    oracle: Arc<dyn CheckpointOracle>,
    failure_reporter: Arc<dyn PsFailureReporter>,
}

impl CommitCoordinator {
    pub fn new(
        oracle: Arc<dyn CheckpointOracle>,
        failure_reporter: Arc<dyn PsFailureReporter>,
    ) -> Self {
        Self {
            oracle,
            failure_reporter,
        }
    }

    /// 就绪且该PS至少负责一个待保存分区时返回COMMIT，否则返回OK
    pub fn decide(&self, ps: PsId, master_table: &BTreeMap<MatrixId, MatrixMeta>) -> CommitDecision {
        let Some(round) = self.oracle.pending_round() else {
            return CommitDecision {
                command: MasterCommand::Ok,
                commit: None,
            };
        };

        let matrices: Vec<MatrixCommit> = round
            .matrices
            .iter()
            .filter_map(|matrix_id| master_table.get(matrix_id))
            .filter_map(|meta| {
                let partitions = meta.partitions_of(ps);
                (!partitions.is_empty()).then(|| MatrixCommit {
                    matrix_id: meta.id,
                    partitions,
                })
            })
            .collect();

        if matrices.is_empty() {
            debug!("checkpoint轮次 {} 中没有 {} 负责的分区", round.id, ps);
            return CommitDecision {
                command: MasterCommand::Ok,
                commit: None,
            };
        }

        info!(
            "向 {} 下发COMMIT (轮次: {}, 矩阵数: {})",
            ps,
            round.id,
            matrices.len()
        );
        counter!("psmaster_commit_issued_total").increment(1);

        CommitDecision {
            command: MasterCommand::Commit,
            commit: Some(CommitRequest {
                round: round.id,
                matrices,
            }),
        }
    }

    /// 转发失败观测计数，转发失败只记录日志
    pub fn forward_failure_reports(&self, reporter: &str, counters: &BTreeMap<PsId, u32>) {
        if counters.is_empty() {
            return;
        }

        debug!("{} 上报了 {} 个PS的失败计数", reporter, counters.len());
        if let Err(e) = self.failure_reporter.report_failures(reporter, counters) {
            warn!("转发 {} 的PS失败计数失败: {}", reporter, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use psmaster_core::{CheckpointRound, MasterResult};
    use psmaster_testing_utils::{MatrixMetaBuilder, RecordingFailureReporter};
    use std::collections::BTreeSet;

    mock! {
        Oracle {}
        impl CheckpointOracle for Oracle {
            fn pending_round(&self) -> Option<CheckpointRound>;
        }
    }

    mock! {
        Reporter {}
        impl PsFailureReporter for Reporter {
            fn report_failures(&self, reporter: &str, counters: &BTreeMap<PsId, u32>) -> MasterResult<()>;
        }
    }

    fn table() -> BTreeMap<MatrixId, MatrixMeta> {
        let mut table = BTreeMap::new();
        table.insert(
            1,
            MatrixMetaBuilder::new(1, "w1")
                .with_partition(0, 0)
                .with_partition(1, 1)
                .with_partition(2, 0)
                .build(),
        );
        table.insert(
            2,
            MatrixMetaBuilder::new(2, "w2").with_partition(0, 1).build(),
        );
        table
    }

    fn round(id: u64, matrices: &[MatrixId]) -> CheckpointRound {
        CheckpointRound {
            id,
            matrices: matrices.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn test_not_ready_returns_ok() {
        let mut oracle = MockOracle::new();
        oracle.expect_pending_round().times(1).returning(|| None);

        let coordinator = CommitCoordinator::new(
            Arc::new(oracle),
            Arc::new(RecordingFailureReporter::new()),
        );

        let decision = coordinator.decide(PsId(0), &table());
        assert_eq!(decision.command, MasterCommand::Ok);
        assert!(decision.commit.is_none());
    }

    #[test]
    fn test_ready_commits_owned_partitions_only() {
        let mut oracle = MockOracle::new();
        oracle
            .expect_pending_round()
            .returning(|| Some(round(7, &[1, 2])));

        let coordinator = CommitCoordinator::new(
            Arc::new(oracle),
            Arc::new(RecordingFailureReporter::new()),
        );

        let decision = coordinator.decide(PsId(0), &table());
        assert_eq!(decision.command, MasterCommand::Commit);
        assert_eq!(
            decision.commit,
            Some(CommitRequest {
                round: 7,
                matrices: vec![MatrixCommit {
                    matrix_id: 1,
                    partitions: vec![0, 2],
                }],
            })
        );
    }

    #[test]
    fn test_ready_but_nothing_owned_returns_ok() {
        let mut oracle = MockOracle::new();
        oracle
            .expect_pending_round()
            .returning(|| Some(round(3, &[2])));

        let coordinator = CommitCoordinator::new(
            Arc::new(oracle),
            Arc::new(RecordingFailureReporter::new()),
        );

        assert_eq!(coordinator.decide(PsId(0), &table()).command, MasterCommand::Ok);
        assert_eq!(coordinator.decide(PsId(1), &table()).command, MasterCommand::Commit);
        // 不负责任何分区的PS
        assert_eq!(coordinator.decide(PsId(5), &table()).command, MasterCommand::Ok);
    }

    #[test]
    fn test_empty_failure_reports_are_not_forwarded() {
        let mut reporter = MockReporter::new();
        reporter.expect_report_failures().times(0);

        let coordinator = CommitCoordinator::new(Arc::new(MockOracle::new()), Arc::new(reporter));
        coordinator.forward_failure_reports("ps_1_attempt_0", &BTreeMap::new());
    }

    #[test]
    fn test_failure_reports_forwarded() {
        let reporter = Arc::new(RecordingFailureReporter::new());
        let coordinator = CommitCoordinator::new(Arc::new(MockOracle::new()), reporter.clone());

        let mut counters = BTreeMap::new();
        counters.insert(PsId(3), 2);
        coordinator.forward_failure_reports("ps_1_attempt_0", &counters);

        assert_eq!(
            reporter.reports(),
            vec![("ps_1_attempt_0".to_string(), counters)]
        );
    }
}
