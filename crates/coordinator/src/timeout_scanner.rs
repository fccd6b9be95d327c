use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use psmaster_core::{
    AttemptEvent, AttemptRole, ClientId, Clock, EventSink, HeartbeatConfig, ProcessTerminator,
    PsAgentAttemptId, PsAttemptId, Role, WorkerAttemptId,
};

use crate::liveness_registry::{LivenessRegistry, Registries};

/// 超时剔除时的诊断与失败信息
pub const HEARTBEAT_TIMEOUT: &str = "heartbeat timeout";

/// 所有客户端失联时的进程退出码
pub const ALL_CLIENTS_LOST_EXIT_STATUS: i32 = 1;

/// 单次扫描结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub workers: Vec<WorkerAttemptId>,
    pub ps: Vec<PsAttemptId>,
    pub ps_agents: Vec<PsAgentAttemptId>,
    pub clients: Vec<ClientId>,
    pub all_clients_lost: bool,
}

impl ScanReport {
    pub fn evicted_count(&self) -> usize {
        self.workers.len() + self.ps.len() + self.ps_agents.len() + self.clients.len()
    }
}

/// 心跳超时扫描器
///
/// 周期性地检查四张存活表，剔除超时条目。Worker/PS/PS-Agent被剔除时先投递诊断事件，
/// 再投递失败事件；客户端表因剔除而变空时触发进程退出。
pub struct TimeoutScanner {
    registries: Arc<Registries>,
    config: HeartbeatConfig,
    clock: Arc<dyn Clock>,
    event_sink: Arc<dyn EventSink>,
    terminator: Arc<dyn ProcessTerminator>,
}

impl TimeoutScanner {
    pub fn new(
        registries: Arc<Registries>,
        config: HeartbeatConfig,
        clock: Arc<dyn Clock>,
        event_sink: Arc<dyn EventSink>,
        terminator: Arc<dyn ProcessTerminator>,
    ) -> Self {
        Self {
            registries,
            config,
            clock,
            event_sink,
            terminator,
        }
    }

    /// 执行一次完整扫描，单个条目或单张表的错误不会影响其余部分
    pub fn scan_once(&self, now: u64) -> ScanReport {
        debug!("开始心跳超时扫描 (t={})", now);

        let workers = self.evict_attempts(&self.registries.workers, now);
        let ps = self.evict_attempts(&self.registries.ps, now);
        let ps_agents = self.evict_attempts(&self.registries.ps_agents, now);
        let (clients, all_clients_lost) = self.evict_clients(now);

        let report = ScanReport {
            workers,
            ps,
            ps_agents,
            clients,
            all_clients_lost,
        };

        if report.evicted_count() > 0 {
            info!("本轮扫描剔除了 {} 个超时参与方", report.evicted_count());
        }

        self.record_live_gauges();
        report
    }

    fn evict_attempts<K: AttemptRole>(&self, registry: &LivenessRegistry<K>, now: u64) -> Vec<K> {
        let timeout_ms = self.config.timeout_ms(K::ROLE);
        let evicted = registry.evict_expired(now, timeout_ms);

        for id in &evicted {
            warn!(
                "{} {} 心跳超时 (超时阈值: {}ms)，已移出存活表",
                K::ROLE,
                id,
                timeout_ms
            );
            counter!("psmaster_heartbeat_timeouts_total", "role" => K::ROLE.as_str()).increment(1);

            let events = [
                AttemptEvent::Diagnostics(HEARTBEAT_TIMEOUT.to_string()),
                AttemptEvent::Failed(HEARTBEAT_TIMEOUT.to_string()),
            ];
            for event in events {
                if let Err(e) = self.event_sink.emit(id.clone().into_event(event)) {
                    error!("投递 {} 的超时事件失败: {}", id, e);
                }
            }
        }

        evicted
    }

    fn evict_clients(&self, now: u64) -> (Vec<ClientId>, bool) {
        let timeout_ms = self.config.timeout_ms(Role::Client);
        let evicted = self.registries.clients.evict_expired(now, timeout_ms);

        for id in &evicted {
            warn!("客户端 {} 心跳超时 (超时阈值: {}ms)", id, timeout_ms);
            counter!("psmaster_heartbeat_timeouts_total", "role" => Role::Client.as_str())
                .increment(1);
        }

        let all_clients_lost = !evicted.is_empty() && self.registries.clients.is_empty();
        if all_clients_lost {
            error!("所有客户端均已失联，Master进程即将退出");
            self.terminator
                .terminate(ALL_CLIENTS_LOST_EXIT_STATUS, "all clients lost");
        }

        (evicted, all_clients_lost)
    }

    fn record_live_gauges(&self) {
        gauge!("psmaster_live_attempts", "role" => Role::Worker.as_str())
            .set(self.registries.workers.len() as f64);
        gauge!("psmaster_live_attempts", "role" => Role::Ps.as_str())
            .set(self.registries.ps.len() as f64);
        gauge!("psmaster_live_attempts", "role" => Role::PsAgent.as_str())
            .set(self.registries.ps_agents.len() as f64);
        gauge!("psmaster_live_attempts", "role" => Role::Client.as_str())
            .set(self.registries.clients.len() as f64);
    }

    /// 启动后台扫描循环
    pub fn start(self: Arc<Self>) -> ScannerHandle {
        let (stop_tx, mut stop_rx) = broadcast::channel::<()>(1);
        let stopped = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stopped);
        let period = self.config.scan_interval();

        let join = tokio::spawn(async move {
            info!("启动心跳超时扫描循环 (扫描间隔: {:?})", period);

            // 先睡眠一个周期再扫描
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if stop_flag.load(Ordering::SeqCst) {
                            break;
                        }
                        let now = self.clock.now_millis();
                        let scanner = Arc::clone(&self);
                        // 协作方在单个周期内panic时只丢弃这一轮，扫描循环继续
                        let cycle = tokio::spawn(async move { scanner.scan_once(now) });
                        if let Err(e) = cycle.await {
                            error!("心跳超时扫描周期异常终止: {}", e);
                        }
                    }
                    _ = stop_rx.recv() => {
                        break;
                    }
                }
            }

            info!("收到停止信号，退出心跳超时扫描循环");
        });

        ScannerHandle {
            stop_tx,
            stopped,
            join,
        }
    }
}

/// 后台扫描任务句柄
pub struct ScannerHandle {
    stop_tx: broadcast::Sender<()>,
    stopped: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl ScannerHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// 设置停止标志、通知扫描循环并在 `join_timeout` 内等待其退出
    ///
    /// 返回扫描任务是否在限定时间内正常退出；超时则强制中止任务。
    pub async fn shutdown(mut self, join_timeout: Duration) -> bool {
        info!("停止心跳超时扫描器");
        self.stopped.store(true, Ordering::SeqCst);
        // 扫描循环可能已经退出，忽略发送错误
        let _ = self.stop_tx.send(());

        match tokio::time::timeout(join_timeout, &mut self.join).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!("心跳超时扫描任务异常退出: {}", e);
                false
            }
            Err(_) => {
                warn!("等待扫描任务退出超时 ({:?})，强制中止", join_timeout);
                self.join.abort();
                false
            }
        }
    }
}
