use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use psmaster_coordinator::{
    ChannelEventSink, ChannelTerminator, InMemoryMatrixMetaManager, ManualCheckpointOracle,
    MasterCollaborators, MasterService, PsFailureTracker, Registries, TerminationRequest,
    TimeoutScanner, HEARTBEAT_TIMEOUT,
};
use psmaster_core::{
    AppConfig, AttemptEvent, Clock, EventSink, MasterEvent, MonotonicClock, NoopSnapshotStore,
    ProcessTerminator,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 事件循环在关闭时排空剩余事件的等待上限
const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Master主应用：组装存活表、默认协作方、RPC处理入口与超时扫描器
pub struct Application {
    config: AppConfig,
    service: Arc<MasterService>,
    scanner: Arc<TimeoutScanner>,
    checkpoint_oracle: Arc<ManualCheckpointOracle>,
    failure_tracker: Arc<PsFailureTracker>,
    terminator: ChannelTerminator,
    events_rx: mpsc::UnboundedReceiver<MasterEvent>,
    termination_rx: mpsc::UnboundedReceiver<TerminationRequest>,
}

impl Application {
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate().context("配置校验失败")?;
        info!(
            "初始化Master (PS数量: {}, 扫描间隔: {}ms)",
            config.master.ps_num, config.heartbeat.scan_interval_ms
        );

        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let registries = Arc::new(Registries::new(Arc::clone(&clock)));

        let (event_sink, events_rx) = ChannelEventSink::new();
        let event_sink: Arc<dyn EventSink> = Arc::new(event_sink);
        let (terminator, termination_rx) = ChannelTerminator::new();

        let checkpoint_oracle = Arc::new(ManualCheckpointOracle::new());
        let failure_tracker = Arc::new(PsFailureTracker::new(
            config.master.ps_failure_suspect_threshold,
        ));
        let matrix_meta = Arc::new(InMemoryMatrixMetaManager::new(
            config.master.clone(),
            Arc::new(NoopSnapshotStore),
        ));

        let service = Arc::new(MasterService::new(
            &registries,
            MasterCollaborators {
                event_sink: Arc::clone(&event_sink),
                matrix_meta,
                checkpoint_oracle: checkpoint_oracle.clone(),
                failure_reporter: failure_tracker.clone(),
            },
        ));

        let scanner = Arc::new(TimeoutScanner::new(
            registries,
            config.heartbeat.clone(),
            clock,
            event_sink,
            Arc::new(terminator.clone()),
        ));

        Ok(Self {
            config,
            service,
            scanner,
            checkpoint_oracle,
            failure_tracker,
            terminator,
            events_rx,
            termination_rx,
        })
    }

    /// RPC传输层使用的处理入口
    pub fn service(&self) -> Arc<MasterService> {
        Arc::clone(&self.service)
    }

    pub fn checkpoint_oracle(&self) -> Arc<ManualCheckpointOracle> {
        Arc::clone(&self.checkpoint_oracle)
    }

    /// 运行直到收到关闭信号或终止请求，返回进程退出码
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<i32> {
        let Self {
            config,
            service,
            scanner,
            failure_tracker,
            terminator,
            events_rx,
            mut termination_rx,
            ..
        } = self;

        info!("启动Master协调服务");
        let scanner_handle = scanner.start();

        let (event_stop_tx, event_stop_rx) = broadcast::channel(1);
        let event_loop = tokio::spawn(run_event_loop(
            events_rx,
            event_stop_rx,
            service,
            failure_tracker,
            terminator,
        ));

        let exit_status = tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Master收到关闭信号");
                0
            }
            request = termination_rx.recv() => match request {
                Some(request) => {
                    warn!(
                        "收到终止请求 (退出码: {}, 原因: {})",
                        request.exit_status, request.reason
                    );
                    request.exit_status
                }
                None => 0,
            }
        };

        if !scanner_handle
            .shutdown(config.heartbeat.scanner_join_timeout())
            .await
        {
            warn!("心跳超时扫描器未能正常退出");
        }

        stop_event_loop(event_loop, event_stop_tx).await;

        info!("Master协调服务已停止");
        Ok(exit_status)
    }
}

async fn stop_event_loop(mut event_loop: JoinHandle<()>, stop_tx: broadcast::Sender<()>) {
    let _ = stop_tx.send(());
    match tokio::time::timeout(EVENT_DRAIN_TIMEOUT, &mut event_loop).await {
        Ok(Ok(())) => debug!("事件循环已退出"),
        Ok(Err(e)) => error!("事件循环异常退出: {}", e),
        Err(_) => {
            warn!("事件循环排空超时，强制中止");
            event_loop.abort();
        }
    }
}

/// 消费Master事件
///
/// 没有外部状态机时只记录日志；应用级事件转换为进程终止请求。
async fn run_event_loop(
    mut events_rx: mpsc::UnboundedReceiver<MasterEvent>,
    mut stop_rx: broadcast::Receiver<()>,
    service: Arc<MasterService>,
    failure_tracker: Arc<PsFailureTracker>,
    terminator: ChannelTerminator,
) {
    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(event) => handle_event(event, &service, &failure_tracker, &terminator),
                None => break,
            },
            _ = stop_rx.recv() => {
                while let Ok(event) = events_rx.try_recv() {
                    handle_event(event, &service, &failure_tracker, &terminator);
                }
                break;
            }
        }
    }
}

fn handle_event(
    event: MasterEvent,
    service: &MasterService,
    failure_tracker: &PsFailureTracker,
    terminator: &dyn ProcessTerminator,
) {
    match &event {
        MasterEvent::App(app_event) => {
            info!("应用结束: {:?}", app_event);
            terminator.terminate(app_event.exit_status(), "application stopped by client");
        }
        MasterEvent::Ps(id, AttemptEvent::Registered { .. }) => {
            // 新的PS Attempt上线，之前的失败观测作废
            failure_tracker.reset(id.ps);
            info!("事件: {:?}", event);
        }
        _ => match event.attempt_event() {
            Some(AttemptEvent::Failed(reason)) => {
                if reason == HEARTBEAT_TIMEOUT {
                    let pruned = service.prune_locations();
                    debug!("清理了 {} 条过期地址记录", pruned);
                }
                warn!("事件: {:?}", event);
                let suspects = failure_tracker.suspects();
                if !suspects.is_empty() {
                    warn!("失败观测超过阈值的PS: {:?}", suspects);
                }
            }
            Some(AttemptEvent::StateUpdate(_)) => debug!("事件: {:?}", event),
            _ => info!("事件: {:?}", event),
        },
    }
}
