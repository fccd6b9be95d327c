//! 矩阵元数据与PS上报清单的测试数据构造器

use psmaster_core::{
    MatrixId, MatrixMeta, PartitionId, PartitionMeta, PartitionReport, PartitionState, PsId,
    PsMatrixReport,
};

/// 构造器生成的每个分区覆盖的行数
const ROWS_PER_PARTITION: u64 = 10;

/// `MatrixMeta` 构造器，每个分区占用独立的行块
pub struct MatrixMetaBuilder {
    meta: MatrixMeta,
}

impl MatrixMetaBuilder {
    pub fn new(id: MatrixId, name: &str) -> Self {
        Self {
            meta: MatrixMeta {
                id,
                name: name.to_string(),
                row_num: 0,
                col_num: 1,
                partitions: vec![],
            },
        }
    }

    pub fn with_cols(mut self, col_num: u64) -> Self {
        self.meta.col_num = col_num;
        for partition in &mut self.meta.partitions {
            partition.end_col = col_num;
        }
        self
    }

    pub fn with_partition(self, part_id: PartitionId, owner: u32) -> Self {
        self.with_replicated_partition(part_id, owner, &[])
    }

    pub fn with_replicated_partition(
        mut self,
        part_id: PartitionId,
        owner: u32,
        replicas: &[u32],
    ) -> Self {
        let start_row = u64::from(part_id) * ROWS_PER_PARTITION;
        let end_row = start_row + ROWS_PER_PARTITION;
        self.meta.row_num = self.meta.row_num.max(end_row);
        self.meta.partitions.push(PartitionMeta {
            part_id,
            start_row,
            end_row,
            start_col: 0,
            end_col: self.meta.col_num,
            owner: PsId(owner),
            replicas: replicas.iter().map(|r| PsId(*r)).collect(),
        });
        self
    }

    pub fn build(self) -> MatrixMeta {
        self.meta
    }
}

/// PS心跳中单个矩阵条目的构造器
pub struct PsMatrixReportBuilder {
    report: PsMatrixReport,
}

impl PsMatrixReportBuilder {
    pub fn new(matrix_id: MatrixId, name: &str) -> Self {
        Self {
            report: PsMatrixReport {
                matrix_id,
                name: name.to_string(),
                partitions: vec![],
            },
        }
    }

    pub fn with_partition(mut self, part_id: PartitionId, state: PartitionState) -> Self {
        self.report.partitions.push(PartitionReport { part_id, state });
        self
    }

    pub fn ready(self, part_id: PartitionId) -> Self {
        self.with_partition(part_id, PartitionState::Ready)
    }

    pub fn lost(self, part_id: PartitionId) -> Self {
        self.with_partition(part_id, PartitionState::Lost)
    }

    pub fn build(self) -> PsMatrixReport {
        self.report
    }
}
