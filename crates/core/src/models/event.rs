use serde::{Deserialize, Serialize};

use super::attempt::{Location, PsAgentAttemptId, PsAttemptId, WorkerAttemptId};
use super::report::ReportPayload;

/// 投递给Attempt状态机的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttemptEvent {
    /// Attempt完成注册并上报了地址
    Registered { location: Location },
    /// 普通心跳携带的状态
    StateUpdate(ReportPayload),
    /// 诊断信息
    Diagnostics(String),
    /// 成功结束
    Succeeded,
    /// 失败结束（FAILMSG）
    Failed(String),
}

impl AttemptEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptEvent::Succeeded | AttemptEvent::Failed(_))
    }
}

/// 应用级生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppEvent {
    Kill,
    InternalError,
    Success,
}

impl AppEvent {
    /// 客户端stop请求中的退出码：1 -> KILL，2 -> INTERNAL_ERROR，其余 -> SUCCESS
    pub fn from_exit_status(exit_status: i32) -> Self {
        match exit_status {
            1 => AppEvent::Kill,
            2 => AppEvent::InternalError,
            _ => AppEvent::Success,
        }
    }

    /// 应用结束后Master进程的退出码
    pub fn exit_status(&self) -> i32 {
        match self {
            AppEvent::Success => 0,
            AppEvent::Kill => 1,
            AppEvent::InternalError => 2,
        }
    }
}

/// Master发出的全部事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MasterEvent {
    Worker(WorkerAttemptId, AttemptEvent),
    Ps(PsAttemptId, AttemptEvent),
    PsAgent(PsAgentAttemptId, AttemptEvent),
    App(AppEvent),
}

impl MasterEvent {
    pub fn attempt_event(&self) -> Option<&AttemptEvent> {
        match self {
            MasterEvent::Worker(_, e) | MasterEvent::Ps(_, e) | MasterEvent::PsAgent(_, e) => {
                Some(e)
            }
            MasterEvent::App(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_event_from_exit_status() {
        assert_eq!(AppEvent::from_exit_status(1), AppEvent::Kill);
        assert_eq!(AppEvent::from_exit_status(2), AppEvent::InternalError);
        assert_eq!(AppEvent::from_exit_status(0), AppEvent::Success);
        assert_eq!(AppEvent::from_exit_status(-7), AppEvent::Success);
        assert_eq!(AppEvent::from_exit_status(2).exit_status(), 2);
    }

    #[test]
    fn test_terminal_events() {
        assert!(AttemptEvent::Succeeded.is_terminal());
        assert!(AttemptEvent::Failed("oom".to_string()).is_terminal());
        assert!(!AttemptEvent::Diagnostics("heartbeat timeout".to_string()).is_terminal());
    }
}
