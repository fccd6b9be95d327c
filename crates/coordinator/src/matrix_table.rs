//! 内存中的权威矩阵表
//!
//! 负责矩阵创建时的分区划分与PS分配，并记录每个PS最近一次上报的矩阵清单，
//! 用于判断矩阵是否已在所有相关PS上创建完成。

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use psmaster_core::{
    MasterConfig, MasterError, MasterResult, MatrixId, MatrixMeta, MatrixMetaManager, MatrixSpec,
    MetaSnapshotStore, PartitionMeta, PsId,
};

#[derive(Debug, Default)]
struct TableState {
    next_id: MatrixId,
    matrices: BTreeMap<MatrixId, MatrixMeta>,
    names: BTreeMap<String, MatrixId>,
    inventories: BTreeMap<PsId, BTreeSet<MatrixId>>,
}

pub struct InMemoryMatrixMetaManager {
    config: MasterConfig,
    state: RwLock<TableState>,
    snapshot_store: Arc<dyn MetaSnapshotStore>,
}

impl InMemoryMatrixMetaManager {
    pub fn new(config: MasterConfig, snapshot_store: Arc<dyn MetaSnapshotStore>) -> Self {
        Self {
            config,
            state: RwLock::new(TableState {
                next_id: 1,
                ..TableState::default()
            }),
            snapshot_store,
        }
    }

    /// 写元数据快照，失败只记录日志
    async fn persist(&self, matrices: Vec<MatrixMeta>) {
        if let Err(e) = self.snapshot_store.write_snapshot(&matrices).await {
            warn!("写入矩阵元数据快照失败，内存状态已更新: {}", e);
        }
    }

    fn validate_spec(&self, spec: &MatrixSpec) -> MasterResult<()> {
        if spec.name.trim().is_empty() {
            return Err(MasterError::invalid_matrix("矩阵名称不能为空"));
        }
        if spec.row_num == 0 || spec.col_num == 0 {
            return Err(MasterError::invalid_matrix(format!(
                "矩阵 {} 的行数和列数必须大于0",
                spec.name
            )));
        }
        if spec.replication >= self.config.ps_num {
            return Err(MasterError::invalid_matrix(format!(
                "矩阵 {} 的副本数 {} 必须小于PS数量 {}",
                spec.name, spec.replication, self.config.ps_num
            )));
        }
        Ok(())
    }

    /// 按行块、列块切分，分区轮流分配给各PS，副本放在后续的PS上
    fn partition(&self, id: MatrixId, spec: &MatrixSpec) -> MatrixMeta {
        let ps_num = self.config.ps_num.max(1);
        let block_rows = match (spec.block_rows, self.config.default_block_rows) {
            (0, 0) => spec.row_num.div_ceil(u64::from(ps_num)),
            (0, default) => default,
            (rows, _) => rows,
        }
        .clamp(1, spec.row_num);
        let block_cols = match (spec.block_cols, self.config.default_block_cols) {
            (0, 0) => spec.col_num,
            (0, default) => default,
            (cols, _) => cols,
        }
        .clamp(1, spec.col_num);

        let mut partitions = Vec::new();
        let mut part_id = 0u32;
        let mut start_row = 0;
        while start_row < spec.row_num {
            let end_row = (start_row + block_rows).min(spec.row_num);
            let mut start_col = 0;
            while start_col < spec.col_num {
                let end_col = (start_col + block_cols).min(spec.col_num);
                partitions.push(PartitionMeta {
                    part_id,
                    start_row,
                    end_row,
                    start_col,
                    end_col,
                    owner: PsId(part_id % ps_num),
                    replicas: (1..=spec.replication)
                        .map(|r| PsId((part_id + r) % ps_num))
                        .collect(),
                });
                part_id += 1;
                start_col = end_col;
            }
            start_row = end_row;
        }

        MatrixMeta {
            id,
            name: spec.name.clone(),
            row_num: spec.row_num,
            col_num: spec.col_num,
            partitions,
        }
    }
}

#[async_trait]
impl MatrixMetaManager for InMemoryMatrixMetaManager {
    async fn create_matrices(&self, specs: Vec<MatrixSpec>) -> MasterResult<Vec<MatrixMeta>> {
        for spec in &specs {
            self.validate_spec(spec)?;
        }

        let (created, snapshot) = {
            let mut state = self.state.write().await;

            let mut seen = HashSet::new();
            for spec in &specs {
                if state.names.contains_key(&spec.name) || !seen.insert(spec.name.as_str()) {
                    return Err(MasterError::matrix_already_exists(spec.name.clone()));
                }
            }

            let mut created = Vec::with_capacity(specs.len());
            for spec in &specs {
                let id = state.next_id;
                state.next_id += 1;

                let meta = self.partition(id, spec);
                info!(
                    "创建矩阵 {} (id: {}, 分区数: {})",
                    meta.name,
                    meta.id,
                    meta.partitions.len()
                );
                state.names.insert(meta.name.clone(), id);
                state.matrices.insert(id, meta.clone());
                created.push(meta);
            }

            let snapshot: Vec<MatrixMeta> = state.matrices.values().cloned().collect();
            (created, snapshot)
        };

        self.persist(snapshot).await;
        Ok(created)
    }

    async fn get_matrices(&self, names: &[String]) -> MasterResult<Vec<MatrixMeta>> {
        let state = self.state.read().await;
        names
            .iter()
            .map(|name| {
                state
                    .names
                    .get(name)
                    .and_then(|id| state.matrices.get(id))
                    .cloned()
                    .ok_or_else(|| MasterError::matrix_not_found(name.clone()))
            })
            .collect()
    }

    async fn release_matrices(&self, names: &[String]) -> MasterResult<()> {
        let snapshot = {
            let mut state = self.state.write().await;
            let mut released = 0;
            for name in names {
                match state.names.remove(name) {
                    Some(id) => {
                        state.matrices.remove(&id);
                        info!("释放矩阵 {} (id: {})", name, id);
                        released += 1;
                    }
                    None => debug!("矩阵 {} 不存在，忽略释放请求", name),
                }
            }

            if released == 0 {
                return Ok(());
            }
            state.matrices.values().cloned().collect::<Vec<_>>()
        };

        self.persist(snapshot).await;
        Ok(())
    }

    async fn all_matrix_meta(&self) -> MasterResult<BTreeMap<MatrixId, MatrixMeta>> {
        Ok(self.state.read().await.matrices.clone())
    }

    async fn check_matrices_created(&self, names: &[String]) -> MasterResult<bool> {
        let state = self.state.read().await;
        for name in names {
            let meta = state
                .names
                .get(name)
                .and_then(|id| state.matrices.get(id))
                .ok_or_else(|| MasterError::matrix_not_found(name.clone()))?;

            for ps in meta.holders() {
                let reported = state
                    .inventories
                    .get(&ps)
                    .is_some_and(|inventory| inventory.contains(&meta.id));
                if !reported {
                    debug!("矩阵 {} 尚未在 {} 上创建", name, ps);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    async fn record_ps_inventory(&self, ps: PsId, matrices: Vec<MatrixId>) -> MasterResult<()> {
        let mut state = self.state.write().await;
        state.inventories.insert(ps, matrices.into_iter().collect());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psmaster_core::NoopSnapshotStore;

    fn manager(ps_num: u32) -> InMemoryMatrixMetaManager {
        InMemoryMatrixMetaManager::new(
            MasterConfig {
                ps_num,
                ..MasterConfig::default()
            },
            Arc::new(NoopSnapshotStore),
        )
    }

    #[tokio::test]
    async fn test_partitions_cover_the_matrix() {
        let manager = manager(2);
        let created = manager
            .create_matrices(vec![MatrixSpec::new("w", 10, 4).with_blocks(3, 2)])
            .await
            .unwrap();

        let meta = &created[0];
        // 4个行块 x 2个列块
        assert_eq!(meta.partitions.len(), 8);
        let cells: u64 = meta
            .partitions
            .iter()
            .map(|p| (p.end_row - p.start_row) * (p.end_col - p.start_col))
            .sum();
        assert_eq!(cells, 40);
        assert_eq!(meta.owners(), BTreeSet::from([PsId(0), PsId(1)]));
    }

    #[tokio::test]
    async fn test_default_blocks_split_rows_across_ps() {
        let manager = manager(3);
        let created = manager
            .create_matrices(vec![MatrixSpec::new("w", 10, 5)])
            .await
            .unwrap();

        let rows: Vec<(u64, u64)> = created[0]
            .partitions
            .iter()
            .map(|p| (p.start_row, p.end_row))
            .collect();
        assert_eq!(rows, vec![(0, 4), (4, 8), (8, 10)]);
    }

    #[tokio::test]
    async fn test_replicas_are_placed_on_other_ps() {
        let manager = manager(3);
        let created = manager
            .create_matrices(vec![MatrixSpec::new("w", 3, 1)
                .with_blocks(1, 1)
                .with_replication(1)])
            .await
            .unwrap();

        for partition in &created[0].partitions {
            assert_eq!(partition.replicas.len(), 1);
            assert_ne!(partition.replicas[0], partition.owner);
        }
    }

    #[tokio::test]
    async fn test_invalid_specs_are_rejected() {
        let manager = manager(2);

        let err = manager
            .create_matrices(vec![MatrixSpec::new("w", 0, 4)])
            .await
            .unwrap_err();
        assert!(matches!(err, MasterError::InvalidMatrixSpec(_)));

        let err = manager
            .create_matrices(vec![MatrixSpec::new("w", 4, 4).with_replication(2)])
            .await
            .unwrap_err();
        assert!(matches!(err, MasterError::InvalidMatrixSpec(_)));

        let err = manager
            .create_matrices(vec![MatrixSpec::new("w", 4, 4), MatrixSpec::new("w", 2, 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, MasterError::MatrixAlreadyExists { .. }));
        assert!(manager.all_matrix_meta().await.unwrap().is_empty());
    }
}
