use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{AttemptEvent, MasterEvent};

/// 参与方类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Worker,
    Ps,
    PsAgent,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Worker => "worker",
            Role::Ps => "ps",
            Role::PsAgent => "ps_agent",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 可以作为存活表键的标识
pub trait AttemptKey:
    Clone + Eq + Hash + Ord + fmt::Display + fmt::Debug + Send + Sync + 'static
{
}

impl<T> AttemptKey for T where
    T: Clone + Eq + Hash + Ord + fmt::Display + fmt::Debug + Send + Sync + 'static
{
}

/// 由外部状态机驱动的Attempt类别（Worker / PS / PS-Agent）
pub trait AttemptRole: AttemptKey {
    const ROLE: Role;

    /// 把单个Attempt的事件包装成全局事件
    fn into_event(self, event: AttemptEvent) -> MasterEvent;
}

/// 参数服务器编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PsId(pub u32);

impl fmt::Display for PsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ps_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerAttemptId {
    pub group: u32,
    pub worker: u32,
    pub attempt: u32,
}

impl WorkerAttemptId {
    pub fn new(group: u32, worker: u32, attempt: u32) -> Self {
        Self {
            group,
            worker,
            attempt,
        }
    }
}

impl fmt::Display for WorkerAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worker_{}_{}_attempt_{}",
            self.group, self.worker, self.attempt
        )
    }
}

impl AttemptRole for WorkerAttemptId {
    const ROLE: Role = Role::Worker;

    fn into_event(self, event: AttemptEvent) -> MasterEvent {
        MasterEvent::Worker(self, event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PsAttemptId {
    pub ps: PsId,
    pub attempt: u32,
}

impl PsAttemptId {
    pub fn new(ps: u32, attempt: u32) -> Self {
        Self {
            ps: PsId(ps),
            attempt,
        }
    }
}

impl fmt::Display for PsAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_attempt_{}", self.ps, self.attempt)
    }
}

impl AttemptRole for PsAttemptId {
    const ROLE: Role = Role::Ps;

    fn into_event(self, event: AttemptEvent) -> MasterEvent {
        MasterEvent::Ps(self, event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PsAgentAttemptId {
    pub agent: u32,
    pub attempt: u32,
}

impl PsAgentAttemptId {
    pub fn new(agent: u32, attempt: u32) -> Self {
        Self { agent, attempt }
    }
}

impl fmt::Display for PsAgentAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ps_agent_{}_attempt_{}", self.agent, self.attempt)
    }
}

impl AttemptRole for PsAgentAttemptId {
    const ROLE: Role = Role::PsAgent;

    fn into_event(self, event: AttemptEvent) -> MasterEvent {
        MasterEvent::PsAgent(self, event)
    }
}

/// 外部客户端标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client_{}", self.0)
    }
}

/// Attempt上报的监听地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub host: String,
    pub port: u16,
}

impl Location {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// 已注册Attempt的地址记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptLocation {
    pub location: Location,
    pub registered_at: DateTime<Utc>,
}
