use crate::errors::MasterResult;
use crate::models::MasterEvent;

/// Attempt状态机事件的消费方
///
/// 事件可能重复或乱序到达（例如超时剔除与done RPC并发），实现必须幂等。
pub trait EventSink: Send + Sync {
    fn emit(&self, event: MasterEvent) -> MasterResult<()>;
}
