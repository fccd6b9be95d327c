use tokio::sync::mpsc;
use tracing::{error, warn};

use psmaster_core::ProcessTerminator;

/// 进程退出请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationRequest {
    pub exit_status: i32,
    pub reason: String,
}

/// 把退出请求交给应用主循环，由主循环完成优雅关闭后退出进程
#[derive(Debug, Clone)]
pub struct ChannelTerminator {
    tx: mpsc::UnboundedSender<TerminationRequest>,
}

impl ChannelTerminator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TerminationRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProcessTerminator for ChannelTerminator {
    fn terminate(&self, exit_status: i32, reason: &str) {
        error!("请求终止Master进程 (退出码: {}, 原因: {})", exit_status, reason);
        let request = TerminationRequest {
            exit_status,
            reason: reason.to_string(),
        };
        if self.tx.send(request).is_err() {
            warn!("主循环已退出，忽略终止请求");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminate_forwards_request() {
        let (terminator, mut rx) = ChannelTerminator::new();
        terminator.terminate(1, "all clients lost");

        assert_eq!(
            rx.recv().await,
            Some(TerminationRequest {
                exit_status: 1,
                reason: "all clients lost".to_string(),
            })
        );
    }

    #[test]
    fn test_terminate_after_receiver_dropped_is_silent() {
        let (terminator, rx) = ChannelTerminator::new();
        drop(rx);
        terminator.terminate(1, "all clients lost");
    }
}
