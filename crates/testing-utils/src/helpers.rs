//! 集成测试辅助函数

use std::collections::BTreeMap;

use psmaster_core::{
    HeartbeatConfig, MatrixId, MatrixMeta, PartitionState, PsId, PsMatrixReport, PsReport,
};

use crate::builders::PsMatrixReportBuilder;

/// 各类参与方使用相同超时的心跳配置
pub fn uniform_heartbeat_config(timeout_ms: u64) -> HeartbeatConfig {
    HeartbeatConfig {
        worker_heartbeat_timeout_ms: timeout_ms,
        ps_heartbeat_timeout_ms: timeout_ms,
        ps_agent_heartbeat_timeout_ms: timeout_ms,
        client_heartbeat_timeout_ms: timeout_ms,
        ..HeartbeatConfig::default()
    }
}

/// 按id索引矩阵列表，与Master权威表结构一致
pub fn matrix_table(matrices: Vec<MatrixMeta>) -> BTreeMap<MatrixId, MatrixMeta> {
    matrices.into_iter().map(|meta| (meta.id, meta)).collect()
}

/// 健康PS的上报清单：其作为owner或副本持有的全部分区，状态均为`Ready`
pub fn healthy_inventory(table: &BTreeMap<MatrixId, MatrixMeta>, ps: PsId) -> Vec<PsMatrixReport> {
    table
        .values()
        .filter(|meta| meta.is_held_by(ps))
        .map(|meta| {
            meta.held_partitions_of(ps)
                .into_iter()
                .fold(PsMatrixReportBuilder::new(meta.id, &meta.name), |builder, part_id| {
                    builder.with_partition(part_id, PartitionState::Ready)
                })
                .build()
        })
        .collect()
}

/// 只携带矩阵清单的PS心跳
pub fn ps_report(matrices: Vec<PsMatrixReport>) -> PsReport {
    PsReport {
        matrices,
        ..PsReport::default()
    }
}
