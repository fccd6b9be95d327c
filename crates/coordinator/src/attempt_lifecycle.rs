use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, error, info, warn};

use psmaster_core::{
    AttemptEvent, AttemptLocation, AttemptRole, EventSink, Location, MasterCommand,
    ReportPayload,
};

use crate::liveness_registry::LivenessRegistry;

/// 单类Attempt（Worker / PS / PS-Agent）的协议处理
///
/// 三态约定：
/// - 不在存活表中：回复SHUTDOWN，不修改任何状态，不投递事件
/// - 在表中且为心跳：刷新时间戳，投递状态事件，回复OK
/// - 在表中且为done/error：移出存活表，投递结束事件，回复SUCCESS
pub struct AttemptLifecycle<K: AttemptRole> {
    registry: Arc<LivenessRegistry<K>>,
    locations: DashMap<K, AttemptLocation>,
    event_sink: Arc<dyn EventSink>,
}

impl<K: AttemptRole> AttemptLifecycle<K> {
    pub fn new(registry: Arc<LivenessRegistry<K>>, event_sink: Arc<dyn EventSink>) -> Self {
        Self {
            registry,
            locations: DashMap::new(),
            event_sink,
        }
    }

    pub fn registry(&self) -> &Arc<LivenessRegistry<K>> {
        &self.registry
    }

    /// 外部状态机把Attempt切到RUNNING时调用
    pub fn admit(&self, id: K) {
        info!("{} {} 开始运行，加入存活表", K::ROLE, id);
        // 同一Attempt重新准入时丢弃旧地址
        self.locations.remove(&id);
        self.registry.register(id);
    }

    pub fn register(&self, id: K, location: Location) -> MasterCommand {
        if !self.registry.touch(&id) {
            return self.reject(&id, "register");
        }

        info!("{} {} 注册成功，地址: {}", K::ROLE, id, location);
        self.locations.insert(
            id.clone(),
            AttemptLocation {
                location: location.clone(),
                registered_at: Utc::now(),
            },
        );
        self.emit(&id, AttemptEvent::Registered { location });
        MasterCommand::Ok
    }

    pub fn report(&self, id: K, payload: ReportPayload) -> MasterCommand {
        if !self.registry.touch(&id) {
            return self.reject(&id, "report");
        }

        debug!("收到 {} {} 的心跳", K::ROLE, id);
        self.emit(&id, AttemptEvent::StateUpdate(payload));
        MasterCommand::Ok
    }

    pub fn done(&self, id: K) -> MasterCommand {
        if !self.registry.unregister(&id) {
            return self.reject(&id, "done");
        }

        info!("{} {} 执行成功", K::ROLE, id);
        self.locations.remove(&id);
        self.emit(&id, AttemptEvent::Succeeded);
        MasterCommand::Success
    }

    pub fn error(&self, id: K, msg: String) -> MasterCommand {
        if !self.registry.unregister(&id) {
            return self.reject(&id, "error");
        }

        warn!("{} {} 执行失败: {}", K::ROLE, id, msg);
        self.locations.remove(&id);
        self.emit(&id, AttemptEvent::Diagnostics(msg.clone()));
        self.emit(&id, AttemptEvent::Failed(msg));
        MasterCommand::Success
    }

    /// 只返回仍在存活表中的Attempt的地址
    pub fn location(&self, id: &K) -> Option<AttemptLocation> {
        if !self.registry.contains(id) {
            return None;
        }
        self.locations.get(id).map(|entry| entry.value().clone())
    }

    /// 满足条件的存活Attempt中第一个有地址的
    pub fn find_location<F>(&self, predicate: F) -> Option<(K, AttemptLocation)>
    where
        F: Fn(&K) -> bool,
    {
        self.registry
            .snapshot()
            .into_iter()
            .map(|(id, _)| id)
            .filter(|id| predicate(id))
            .find_map(|id| self.location(&id).map(|location| (id, location)))
    }

    /// 清理已被超时剔除的Attempt的地址
    pub fn prune_locations(&self) -> usize {
        let before = self.locations.len();
        self.locations.retain(|id, _| self.registry.contains(id));
        before - self.locations.len()
    }

    pub fn is_alive(&self, id: &K) -> bool {
        self.registry.contains(id)
    }

    pub fn live_count(&self) -> usize {
        self.registry.len()
    }

    pub(crate) fn reject(&self, id: &K, action: &str) -> MasterCommand {
        warn!(
            "{} {} 不在存活表中，拒绝 {} 请求并要求其退出",
            K::ROLE,
            id,
            action
        );
        counter!("psmaster_unknown_attempt_total", "role" => K::ROLE.as_str()).increment(1);
        MasterCommand::Shutdown
    }

    fn emit(&self, id: &K, event: AttemptEvent) {
        if let Err(e) = self.event_sink.emit(id.clone().into_event(event)) {
            error!("投递 {} 的事件失败: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psmaster_core::{Clock, ManualClock, MasterEvent, PsAttemptId, Role, WorkerAttemptId};
    use psmaster_testing_utils::RecordingEventSink;

    fn lifecycle<K: AttemptRole>(
        clock: &Arc<ManualClock>,
    ) -> (AttemptLifecycle<K>, Arc<RecordingEventSink>) {
        let registry = Arc::new(LivenessRegistry::new(
            K::ROLE,
            Arc::clone(clock) as Arc<dyn Clock>,
        ));
        let events = Arc::new(RecordingEventSink::new());
        (AttemptLifecycle::new(registry, events.clone()), events)
    }

    #[test]
    fn test_unknown_attempt_is_shut_down_without_side_effects() {
        let clock = Arc::new(ManualClock::new(0));
        let (lifecycle, events) = lifecycle::<WorkerAttemptId>(&clock);
        let id = WorkerAttemptId::new(0, 0, 0);

        assert_eq!(
            lifecycle.register(id, Location::new("10.0.0.1", 7000)),
            MasterCommand::Shutdown
        );
        assert_eq!(
            lifecycle.report(id, ReportPayload::default()),
            MasterCommand::Shutdown
        );
        assert_eq!(lifecycle.done(id), MasterCommand::Shutdown);
        assert_eq!(
            lifecycle.error(id, "oom".to_string()),
            MasterCommand::Shutdown
        );

        assert!(events.events().is_empty());
        assert!(!lifecycle.is_alive(&id));
        assert!(lifecycle.location(&id).is_none());
    }

    #[test]
    fn test_register_records_location() {
        let clock = Arc::new(ManualClock::new(0));
        let (lifecycle, events) = lifecycle::<PsAttemptId>(&clock);
        let id = PsAttemptId::new(1, 0);
        let location = Location::new("10.0.0.2", 9000);

        lifecycle.admit(id);
        assert_eq!(lifecycle.register(id, location.clone()), MasterCommand::Ok);

        assert_eq!(
            lifecycle.location(&id).map(|l| l.location),
            Some(location.clone())
        );
        assert_eq!(
            events.events(),
            vec![MasterEvent::Ps(id, AttemptEvent::Registered { location })]
        );
    }

    #[test]
    fn test_error_emits_diagnostics_then_failure() {
        let clock = Arc::new(ManualClock::new(0));
        let (lifecycle, events) = lifecycle::<WorkerAttemptId>(&clock);
        let id = WorkerAttemptId::new(1, 2, 0);

        lifecycle.admit(id);
        assert_eq!(lifecycle.error(id, "oom".to_string()), MasterCommand::Success);

        assert_eq!(
            events.events(),
            vec![
                MasterEvent::Worker(id, AttemptEvent::Diagnostics("oom".to_string())),
                MasterEvent::Worker(id, AttemptEvent::Failed("oom".to_string())),
            ]
        );
        // 第二次上报已不在表中
        assert_eq!(lifecycle.done(id), MasterCommand::Shutdown);
        assert_eq!(events.failure_count(), 1);
    }

    #[test]
    fn test_location_hidden_after_eviction() {
        let clock = Arc::new(ManualClock::new(0));
        let (lifecycle, _events) = lifecycle::<PsAttemptId>(&clock);
        let id = PsAttemptId::new(3, 1);

        lifecycle.admit(id);
        lifecycle.register(id, Location::new("ps-3", 9000));
        assert_eq!(lifecycle.live_count(), 1);

        lifecycle.registry().evict_expired(10_000, 1_000);

        assert!(lifecycle.location(&id).is_none());
        assert_eq!(lifecycle.prune_locations(), 1);
        assert_eq!(lifecycle.registry().role(), Role::Ps);
    }

    #[test]
    fn test_event_sink_failure_still_acknowledges() {
        let clock = Arc::new(ManualClock::new(0));
        let (lifecycle, events) = lifecycle::<WorkerAttemptId>(&clock);
        let id = WorkerAttemptId::new(0, 1, 0);
        events.fail_emits(true);

        lifecycle.admit(id);
        assert_eq!(
            lifecycle.report(id, ReportPayload::with_progress(0.5)),
            MasterCommand::Ok
        );
        assert_eq!(lifecycle.done(id), MasterCommand::Success);
    }
}
