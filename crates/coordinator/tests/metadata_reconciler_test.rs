use std::collections::BTreeSet;

use psmaster_coordinator::reconcile;
use psmaster_core::{MatrixId, PartitionState, PsId, RecoverPartition, RecoverSource};
use psmaster_testing_utils::{matrix_table, MatrixMetaBuilder, PsMatrixReportBuilder};

#[test]
fn test_empty_inventory_needs_full_create() {
    let m1 = MatrixMetaBuilder::new(1, "M1")
        .with_partition(0, 1)
        .with_partition(1, 2)
        .build();
    let table = matrix_table(vec![m1.clone()]);

    let delta = reconcile(&table, PsId(1), &[]);

    assert_eq!(delta.need_create, vec![m1]);
    assert!(delta.need_release.is_empty());
    assert!(delta.need_recover.is_empty());
}

#[test]
fn test_matrices_of_other_ps_are_ignored() {
    let table = matrix_table(vec![MatrixMetaBuilder::new(1, "M1")
        .with_partition(0, 2)
        .build()]);

    assert!(reconcile(&table, PsId(1), &[]).is_empty());
}

#[test]
fn test_unknown_reported_matrix_is_released() {
    let table = matrix_table(vec![MatrixMetaBuilder::new(1, "M1")
        .with_partition(0, 1)
        .build()]);
    let reported = vec![
        PsMatrixReportBuilder::new(1, "M1").ready(0).build(),
        PsMatrixReportBuilder::new(9, "gone").lost(0).build(),
        PsMatrixReportBuilder::new(4, "old").ready(0).build(),
    ];

    let delta = reconcile(&table, PsId(1), &reported);

    assert!(delta.need_create.is_empty());
    assert_eq!(delta.need_release, vec![4, 9]);
    // 已释放矩阵的丢失分区不需要恢复
    assert!(delta.need_recover.is_empty());
}

#[test]
fn test_damaged_partitions_recover_from_holders() {
    let table = matrix_table(vec![
        MatrixMetaBuilder::new(1, "M1")
            .with_replicated_partition(0, 1, &[2])
            .with_replicated_partition(1, 3, &[1])
            .with_partition(2, 1)
            .build(),
    ]);
    let reported = vec![PsMatrixReportBuilder::new(1, "M1")
        .lost(0)
        .with_partition(1, PartitionState::Corrupted)
        .with_partition(2, PartitionState::Lost)
        .build()];

    let delta = reconcile(&table, PsId(1), &reported);

    assert_eq!(
        delta.need_recover,
        vec![
            RecoverPartition {
                matrix_id: 1,
                part_id: 0,
                source: RecoverSource::Replica(PsId(2)),
            },
            RecoverPartition {
                matrix_id: 1,
                part_id: 1,
                source: RecoverSource::Replica(PsId(3)),
            },
            RecoverPartition {
                matrix_id: 1,
                part_id: 2,
                source: RecoverSource::Checkpoint,
            },
        ]
    );
}

#[test]
fn test_loading_partitions_are_left_alone() {
    let table = matrix_table(vec![MatrixMetaBuilder::new(1, "M1")
        .with_partition(0, 1)
        .build()]);
    let reported = vec![PsMatrixReportBuilder::new(1, "M1")
        .with_partition(0, PartitionState::Loading)
        .build()];

    assert!(reconcile(&table, PsId(1), &reported).is_empty());
}

#[test]
fn test_reconcile_is_deterministic_and_disjoint() {
    let table = matrix_table(
        (1..=6)
            .map(|id| {
                MatrixMetaBuilder::new(id, &format!("m{id}"))
                    .with_partition(0, id % 2)
                    .with_partition(1, 1)
                    .build()
            })
            .collect(),
    );

    // 报告乱序并混入表中不存在的矩阵
    let reported = vec![
        PsMatrixReportBuilder::new(5, "m5").lost(1).build(),
        PsMatrixReportBuilder::new(12, "m12").ready(0).build(),
        PsMatrixReportBuilder::new(2, "m2").ready(1).build(),
        PsMatrixReportBuilder::new(10, "m10").ready(0).build(),
    ];

    let first = reconcile(&table, PsId(1), &reported);
    let second = reconcile(&table, PsId(1), &reported);
    assert_eq!(first, second);

    let created: BTreeSet<MatrixId> = first.need_create.iter().map(|m| m.id).collect();
    let released: BTreeSet<MatrixId> = first.need_release.iter().copied().collect();
    assert!(created.is_disjoint(&released));

    assert_eq!(created, BTreeSet::from([1, 3, 4, 6]));
    assert_eq!(first.need_release, vec![10, 12]);
    assert_eq!(first.need_recover.len(), 1);
}
