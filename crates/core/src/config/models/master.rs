use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// 参数服务器数量，决定矩阵分区的分配范围
    pub ps_num: u32,
    /// 矩阵分区默认行数，0表示按PS数量均分
    pub default_block_rows: u64,
    /// 矩阵分区默认列数，0表示不按列切分
    pub default_block_cols: u64,
    /// 进程优雅关闭的总超时
    pub shutdown_timeout_seconds: u64,
    /// 累计多少次失败观测后把PS标记为可疑
    pub ps_failure_suspect_threshold: u64,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            ps_num: 1,
            default_block_rows: 0,
            default_block_cols: 0,
            shutdown_timeout_seconds: 30,
            ps_failure_suspect_threshold: 3,
        }
    }
}

impl MasterConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ps_num == 0 {
            return Err(anyhow::anyhow!("PS数量必须大于0"));
        }

        if self.shutdown_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("关闭超时时间必须大于0"));
        }

        if self.ps_failure_suspect_threshold == 0 {
            return Err(anyhow::anyhow!("PS失败观测阈值必须大于0"));
        }

        Ok(())
    }
}
