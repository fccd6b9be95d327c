//! 矩阵元数据管理接口
//!
//! Master本身不拥有矩阵元数据的持久化，只通过这两个接口访问：
//! - `MatrixMetaManager` - 权威矩阵表，供客户端RPC透传以及PS心跳对账
//! - `MetaSnapshotStore` - 元数据快照写入，失败只记录日志，不影响RPC结果

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::MasterResult;
use crate::models::{MatrixId, MatrixMeta, MatrixSpec, PsId};

#[async_trait]
pub trait MatrixMetaManager: Send + Sync {
    /// 创建矩阵并分配分区，返回完整元数据
    async fn create_matrices(&self, specs: Vec<MatrixSpec>) -> MasterResult<Vec<MatrixMeta>>;

    /// 按名称查询，任意名称不存在即返回 `MatrixNotFound`
    async fn get_matrices(&self, names: &[String]) -> MasterResult<Vec<MatrixMeta>>;

    /// 按名称释放，不存在的名称忽略
    async fn release_matrices(&self, names: &[String]) -> MasterResult<()>;

    /// 权威矩阵表快照
    async fn all_matrix_meta(&self) -> MasterResult<BTreeMap<MatrixId, MatrixMeta>>;

    /// 所有负责这些矩阵的PS是否都已上报创建完成
    async fn check_matrices_created(&self, names: &[String]) -> MasterResult<bool>;

    /// 记录某个PS最近一次上报的矩阵清单
    async fn record_ps_inventory(&self, ps: PsId, matrices: Vec<MatrixId>) -> MasterResult<()>;
}

#[async_trait]
pub trait MetaSnapshotStore: Send + Sync {
    async fn write_snapshot(&self, matrices: &[MatrixMeta]) -> MasterResult<()>;
}

/// 不做任何持久化
#[derive(Debug, Default, Clone)]
pub struct NoopSnapshotStore;

#[async_trait]
impl MetaSnapshotStore for NoopSnapshotStore {
    async fn write_snapshot(&self, _matrices: &[MatrixMeta]) -> MasterResult<()> {
        Ok(())
    }
}
