use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::Role;

/// 心跳超时配置，四类参与方的阈值相互独立
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub worker_heartbeat_timeout_ms: u64,
    pub ps_heartbeat_timeout_ms: u64,
    pub ps_agent_heartbeat_timeout_ms: u64,
    pub client_heartbeat_timeout_ms: u64,
    /// 超时扫描间隔
    pub scan_interval_ms: u64,
    /// 关闭时等待扫描任务退出的上限
    pub scanner_join_timeout_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            worker_heartbeat_timeout_ms: 60_000,
            ps_heartbeat_timeout_ms: 60_000,
            ps_agent_heartbeat_timeout_ms: 60_000,
            client_heartbeat_timeout_ms: 60_000,
            scan_interval_ms: 1_000,
            scanner_join_timeout_ms: 5_000,
        }
    }
}

impl HeartbeatConfig {
    pub fn timeout_ms(&self, role: Role) -> u64 {
        match role {
            Role::Worker => self.worker_heartbeat_timeout_ms,
            Role::Ps => self.ps_heartbeat_timeout_ms,
            Role::PsAgent => self.ps_agent_heartbeat_timeout_ms,
            Role::Client => self.client_heartbeat_timeout_ms,
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn scanner_join_timeout(&self) -> Duration {
        Duration::from_millis(self.scanner_join_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for role in [Role::Worker, Role::Ps, Role::PsAgent, Role::Client] {
            if self.timeout_ms(role) == 0 {
                return Err(anyhow::anyhow!("{}心跳超时时间必须大于0", role));
            }
        }

        if self.scan_interval_ms == 0 {
            return Err(anyhow::anyhow!("超时扫描间隔必须大于0"));
        }

        if self.scanner_join_timeout_ms == 0 {
            return Err(anyhow::anyhow!("扫描任务退出等待时间必须大于0"));
        }

        Ok(())
    }
}
