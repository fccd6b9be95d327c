//! Master矩阵表与单个PS上报清单的差异计算
//!
//! `reconcile` 是纯函数：只读输入，相同输入得到相同输出（各列表按id排序）。

use std::collections::{BTreeMap, BTreeSet};

use psmaster_core::{
    MatrixId, MatrixMeta, PartitionId, PsId, PsMatrixReport, ReconcileDelta, RecoverPartition,
    RecoverSource,
};

/// 对比Master权威表与PS上报清单
///
/// - `need_create`: 表中该PS作为owner或副本持有、但PS未上报的矩阵（完整元数据）
/// - `need_release`: PS上报了、但表中已不存在的矩阵
/// - `need_recover`: 两边都有、但PS上报分区已丢失或损坏
pub fn reconcile(
    master_table: &BTreeMap<MatrixId, MatrixMeta>,
    ps: PsId,
    reported: &[PsMatrixReport],
) -> ReconcileDelta {
    let reported_ids: BTreeSet<MatrixId> = reported.iter().map(|m| m.matrix_id).collect();

    let need_create: Vec<MatrixMeta> = master_table
        .values()
        .filter(|meta| meta.is_held_by(ps) && !reported_ids.contains(&meta.id))
        .cloned()
        .collect();

    let need_release: Vec<MatrixId> = reported_ids
        .iter()
        .filter(|id| !master_table.contains_key(id))
        .copied()
        .collect();

    let mut damaged: BTreeSet<(MatrixId, PartitionId)> = BTreeSet::new();
    for matrix in reported {
        if !master_table.contains_key(&matrix.matrix_id) {
            continue;
        }
        for partition in &matrix.partitions {
            if partition.state.needs_recovery() {
                damaged.insert((matrix.matrix_id, partition.part_id));
            }
        }
    }

    let need_recover: Vec<RecoverPartition> = damaged
        .into_iter()
        .filter_map(|(matrix_id, part_id)| {
            master_table.get(&matrix_id).map(|meta| RecoverPartition {
                matrix_id,
                part_id,
                source: recover_source(meta, part_id, ps),
            })
        })
        .collect();

    ReconcileDelta {
        need_create,
        need_release,
        need_recover,
    }
}

/// 优先从其他持有该分区的PS恢复（先看owner，再按顺序看副本），都没有则从checkpoint加载
fn recover_source(meta: &MatrixMeta, part_id: PartitionId, ps: PsId) -> RecoverSource {
    meta.partition(part_id)
        .and_then(|partition| partition.holders().find(|holder| *holder != ps))
        .map(RecoverSource::Replica)
        .unwrap_or(RecoverSource::Checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use psmaster_core::{PartitionMeta, PartitionReport, PartitionState};

    fn meta(id: MatrixId, owners: &[(PartitionId, u32, Vec<u32>)]) -> MatrixMeta {
        MatrixMeta {
            id,
            name: format!("m{id}"),
            row_num: 100,
            col_num: 10,
            partitions: owners
                .iter()
                .map(|(part_id, owner, replicas)| PartitionMeta {
                    part_id: *part_id,
                    start_row: 0,
                    end_row: 100,
                    start_col: 0,
                    end_col: 10,
                    owner: PsId(*owner),
                    replicas: replicas.iter().map(|r| PsId(*r)).collect(),
                })
                .collect(),
        }
    }

    fn report(matrix_id: MatrixId, parts: &[(PartitionId, PartitionState)]) -> PsMatrixReport {
        PsMatrixReport {
            matrix_id,
            name: format!("m{matrix_id}"),
            partitions: parts
                .iter()
                .map(|(part_id, state)| PartitionReport {
                    part_id: *part_id,
                    state: *state,
                })
                .collect(),
        }
    }

    #[test]
    fn test_recover_prefers_replica_over_checkpoint() {
        let with_replica = meta(1, &[(0, 1, vec![1, 2])]);
        let without_replica = meta(2, &[(0, 1, vec![])]);

        assert_eq!(
            recover_source(&with_replica, 0, PsId(1)),
            RecoverSource::Replica(PsId(2))
        );
        assert_eq!(
            recover_source(&without_replica, 0, PsId(1)),
            RecoverSource::Checkpoint
        );
        assert_eq!(
            recover_source(&without_replica, 9, PsId(1)),
            RecoverSource::Checkpoint
        );
    }

    #[test]
    fn test_replica_recovers_from_owner() {
        let m = meta(1, &[(0, 3, vec![4])]);
        assert_eq!(recover_source(&m, 0, PsId(4)), RecoverSource::Replica(PsId(3)));
    }

    #[test]
    fn test_replica_is_asked_to_create() {
        let mut table = BTreeMap::new();
        table.insert(1, meta(1, &[(0, 0, vec![1])]));

        let delta = reconcile(&table, PsId(1), &[]);
        assert_eq!(delta.need_create.len(), 1);
        assert!(reconcile(&table, PsId(2), &[]).is_empty());
    }

    #[test]
    fn test_duplicate_reports_are_collapsed() {
        let mut table = BTreeMap::new();
        table.insert(1, meta(1, &[(0, 1, vec![])]));

        let reported = vec![
            report(1, &[(0, PartitionState::Lost)]),
            report(1, &[(0, PartitionState::Corrupted)]),
        ];

        let delta = reconcile(&table, PsId(1), &reported);
        assert_eq!(delta.need_recover.len(), 1);
        assert!(delta.need_create.is_empty());
        assert!(delta.need_release.is_empty());
    }
}
