use tokio::sync::mpsc;
use tracing::trace;

use psmaster_core::{EventSink, MasterError, MasterEvent, MasterResult};

/// 通过无界通道把事件转交给应用层的事件分发循环
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<MasterEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MasterEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: MasterEvent) -> MasterResult<()> {
        trace!("投递事件: {:?}", event);
        self.tx
            .send(event)
            .map_err(|e| MasterError::event_sink(format!("事件通道已关闭: {:?}", e.0)))
    }
}
