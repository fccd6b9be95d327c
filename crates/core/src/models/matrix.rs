//! Master视角的矩阵元数据，以及PS心跳中上报的矩阵清单

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::attempt::PsId;

pub type MatrixId = u32;
pub type PartitionId = u32;

/// 客户端创建矩阵的请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixSpec {
    pub name: String,
    pub row_num: u64,
    pub col_num: u64,
    /// 分区行数，0表示使用默认值
    pub block_rows: u64,
    /// 分区列数，0表示使用默认值
    pub block_cols: u64,
    /// 每个分区额外的副本数
    pub replication: u32,
}

impl MatrixSpec {
    pub fn new<S: Into<String>>(name: S, row_num: u64, col_num: u64) -> Self {
        Self {
            name: name.into(),
            row_num,
            col_num,
            block_rows: 0,
            block_cols: 0,
            replication: 0,
        }
    }

    pub fn with_blocks(mut self, block_rows: u64, block_cols: u64) -> Self {
        self.block_rows = block_rows;
        self.block_cols = block_cols;
        self
    }

    pub fn with_replication(mut self, replication: u32) -> Self {
        self.replication = replication;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMeta {
    pub part_id: PartitionId,
    pub start_row: u64,
    pub end_row: u64,
    pub start_col: u64,
    pub end_col: u64,
    pub owner: PsId,
    pub replicas: Vec<PsId>,
}

impl PartitionMeta {
    /// owner在前，副本按顺序在后
    pub fn holders(&self) -> impl Iterator<Item = PsId> + '_ {
        std::iter::once(self.owner).chain(self.replicas.iter().copied())
    }

    pub fn is_held_by(&self, ps: PsId) -> bool {
        self.holders().any(|holder| holder == ps)
    }
}

/// Master权威表中的矩阵元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixMeta {
    pub id: MatrixId,
    pub name: String,
    pub row_num: u64,
    pub col_num: u64,
    pub partitions: Vec<PartitionMeta>,
}

impl MatrixMeta {
    pub fn owners(&self) -> BTreeSet<PsId> {
        self.partitions.iter().map(|p| p.owner).collect()
    }

    pub fn is_owned_by(&self, ps: PsId) -> bool {
        self.partitions.iter().any(|p| p.owner == ps)
    }

    /// 所有需要持有该矩阵数据的PS（owner与副本）
    pub fn holders(&self) -> BTreeSet<PsId> {
        self.partitions.iter().flat_map(PartitionMeta::holders).collect()
    }

    /// 该PS是否作为owner或副本持有任一分区
    pub fn is_held_by(&self, ps: PsId) -> bool {
        self.partitions.iter().any(|p| p.is_held_by(ps))
    }

    /// 指定PS作为owner或副本持有的分区编号（升序）
    pub fn held_partitions_of(&self, ps: PsId) -> Vec<PartitionId> {
        let mut ids: Vec<PartitionId> = self
            .partitions
            .iter()
            .filter(|p| p.is_held_by(ps))
            .map(|p| p.part_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// 指定PS负责的分区编号（升序）
    pub fn partitions_of(&self, ps: PsId) -> Vec<PartitionId> {
        let mut ids: Vec<PartitionId> = self
            .partitions
            .iter()
            .filter(|p| p.owner == ps)
            .map(|p| p.part_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn partition(&self, part_id: PartitionId) -> Option<&PartitionMeta> {
        self.partitions.iter().find(|p| p.part_id == part_id)
    }
}

/// PS上报的分区状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionState {
    Ready,
    Loading,
    Lost,
    Corrupted,
}

impl PartitionState {
    pub fn needs_recovery(&self) -> bool {
        matches!(self, PartitionState::Lost | PartitionState::Corrupted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReport {
    pub part_id: PartitionId,
    pub state: PartitionState,
}

/// PS心跳中携带的单个矩阵清单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsMatrixReport {
    pub matrix_id: MatrixId,
    pub name: String,
    pub partitions: Vec<PartitionReport>,
}

/// 分区恢复数据来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecoverSource {
    /// 从存活副本拉取
    Replica(PsId),
    /// 从最近一次checkpoint加载
    Checkpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverPartition {
    pub matrix_id: MatrixId,
    pub part_id: PartitionId,
    pub source: RecoverSource,
}

/// 一轮全局checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRound {
    pub id: u64,
    pub matrices: BTreeSet<MatrixId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCommit {
    pub matrix_id: MatrixId,
    pub partitions: Vec<PartitionId>,
}

/// 下发给单个PS的保存指令，每次心跳临时计算
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub round: u64,
    pub matrices: Vec<MatrixCommit>,
}
