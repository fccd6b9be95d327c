//! 心跳存活表
//!
//! 每类参与方一张 `attemptId -> 最近心跳时间(ms)` 的并发表。
//! 表中存在即表示Master认可该Attempt存活；不存在本身就是让对方自行退出的信号。

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use psmaster_core::{
    AttemptKey, ClientId, Clock, PsAgentAttemptId, PsAttemptId, Role, WorkerAttemptId,
};

#[derive(Debug)]
pub struct LivenessRegistry<K: AttemptKey> {
    role: Role,
    entries: DashMap<K, u64>,
    clock: Arc<dyn Clock>,
}

impl<K: AttemptKey> LivenessRegistry<K> {
    pub fn new(role: Role, clock: Arc<dyn Clock>) -> Self {
        Self {
            role,
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// 加入存活表，时间戳设为当前时间；已存在则覆盖
    pub fn register(&self, id: K) {
        let now = self.clock.now_millis();
        debug!("{} {} 加入存活表 (t={})", self.role, id, now);
        self.entries.insert(id, now);
    }

    /// 存在则刷新时间戳并返回true；不存在返回false且不做任何修改
    pub fn touch(&self, id: &K) -> bool {
        match self.entries.get_mut(id) {
            Some(mut last_seen) => {
                *last_seen = self.clock.now_millis();
                true
            }
            None => false,
        }
    }

    /// 幂等移除，返回本次调用是否真正移除了条目
    pub fn unregister(&self, id: &K) -> bool {
        let removed = self.entries.remove(id).is_some();
        if removed {
            debug!("{} {} 移出存活表", self.role, id);
        }
        removed
    }

    pub fn contains(&self, id: &K) -> bool {
        self.entries.contains_key(id)
    }

    pub fn last_seen(&self, id: &K) -> Option<u64> {
        self.entries.get(id).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按id排序的快照
    pub fn snapshot(&self) -> Vec<(K, u64)> {
        let mut entries: Vec<(K, u64)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// 剔除 `now - last_seen > timeout_ms` 的条目，返回本次真正剔除的id（升序）
    ///
    /// 先收集候选再逐个条件删除：候选收集之后到达的心跳会让 `remove_if` 落空，
    /// 该Attempt继续存活。
    pub fn evict_expired(&self, now: u64, timeout_ms: u64) -> Vec<K> {
        let candidates: Vec<K> = self
            .entries
            .iter()
            .filter(|entry| now.saturating_sub(*entry.value()) > timeout_ms)
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted: Vec<K> = candidates
            .into_iter()
            .filter(|id| {
                self.entries
                    .remove_if(id, |_, last_seen| now.saturating_sub(*last_seen) > timeout_ms)
                    .is_some()
            })
            .collect();
        evicted.sort();
        evicted
    }
}

/// 四张存活表，显式注入到RPC处理和超时扫描器
#[derive(Debug)]
pub struct Registries {
    pub workers: Arc<LivenessRegistry<WorkerAttemptId>>,
    pub ps: Arc<LivenessRegistry<PsAttemptId>>,
    pub ps_agents: Arc<LivenessRegistry<PsAgentAttemptId>>,
    pub clients: Arc<LivenessRegistry<ClientId>>,
}

impl Registries {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            workers: Arc::new(LivenessRegistry::new(Role::Worker, Arc::clone(&clock))),
            ps: Arc::new(LivenessRegistry::new(Role::Ps, Arc::clone(&clock))),
            ps_agents: Arc::new(LivenessRegistry::new(Role::PsAgent, Arc::clone(&clock))),
            clients: Arc::new(LivenessRegistry::new(Role::Client, clock)),
        }
    }
}
