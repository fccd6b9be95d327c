//! Master对外的RPC处理入口
//!
//! 传输层与消息编解码不在此处；每个方法对应一个RPC，直接返回回复给远端的指令。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use psmaster_core::{
    AppEvent, AttemptLocation, CheckpointOracle, ClientId, EventSink, Location, MasterCommand,
    MasterEvent, MasterResult, MatrixId, MatrixMeta, MatrixMetaManager, MatrixSpec,
    PsAgentAttemptId, PsAgentReport, PsAttemptId, PsFailureReporter, PsId, PsReport,
    PsReportResponse, WorkerAttemptId, WorkerReport, WorkerReportResponse,
};

use crate::attempt_lifecycle::AttemptLifecycle;
use crate::commit_coordinator::CommitCoordinator;
use crate::liveness_registry::{LivenessRegistry, Registries};
use crate::metadata_reconciler::reconcile;

/// Master依赖的外部协作方
pub struct MasterCollaborators {
    pub event_sink: Arc<dyn EventSink>,
    pub matrix_meta: Arc<dyn MatrixMetaManager>,
    pub checkpoint_oracle: Arc<dyn CheckpointOracle>,
    pub failure_reporter: Arc<dyn PsFailureReporter>,
}

/// 各类参与方当前存活数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveAttempts {
    pub workers: usize,
    pub ps: usize,
    pub ps_agents: usize,
    pub clients: usize,
}

pub struct MasterService {
    workers: AttemptLifecycle<WorkerAttemptId>,
    ps: AttemptLifecycle<PsAttemptId>,
    ps_agents: AttemptLifecycle<PsAgentAttemptId>,
    clients: Arc<LivenessRegistry<ClientId>>,
    commit_coordinator: CommitCoordinator,
    matrix_meta: Arc<dyn MatrixMetaManager>,
    event_sink: Arc<dyn EventSink>,
}

impl MasterService {
    pub fn new(registries: &Registries, collaborators: MasterCollaborators) -> Self {
        let MasterCollaborators {
            event_sink,
            matrix_meta,
            checkpoint_oracle,
            failure_reporter,
        } = collaborators;

        Self {
            workers: AttemptLifecycle::new(
                Arc::clone(&registries.workers),
                Arc::clone(&event_sink),
            ),
            ps: AttemptLifecycle::new(Arc::clone(&registries.ps), Arc::clone(&event_sink)),
            ps_agents: AttemptLifecycle::new(
                Arc::clone(&registries.ps_agents),
                Arc::clone(&event_sink),
            ),
            clients: Arc::clone(&registries.clients),
            commit_coordinator: CommitCoordinator::new(checkpoint_oracle, failure_reporter),
            matrix_meta,
            event_sink,
        }
    }

    // ---- 外部状态机钩子 ----

    pub fn admit_worker(&self, id: WorkerAttemptId) {
        self.workers.admit(id);
    }

    pub fn admit_ps(&self, id: PsAttemptId) {
        self.ps.admit(id);
    }

    pub fn admit_ps_agent(&self, id: PsAgentAttemptId) {
        self.ps_agents.admit(id);
    }

    // ---- Worker ----

    #[instrument(skip(self, location), fields(attempt = %id))]
    pub async fn register_worker(&self, id: WorkerAttemptId, location: Location) -> MasterCommand {
        self.workers.register(id, location)
    }

    #[instrument(skip(self, report), fields(attempt = %id))]
    pub async fn worker_report(
        &self,
        id: WorkerAttemptId,
        report: WorkerReport,
    ) -> WorkerReportResponse {
        let command = self.workers.report(id, report.payload);
        let active_task_num = match command {
            MasterCommand::Shutdown => 0,
            _ => self.workers.live_count(),
        };
        WorkerReportResponse {
            command,
            active_task_num,
        }
    }

    #[instrument(skip(self), fields(attempt = %id))]
    pub async fn worker_done(&self, id: WorkerAttemptId) -> MasterCommand {
        self.workers.done(id)
    }

    #[instrument(skip(self, msg), fields(attempt = %id))]
    pub async fn worker_error(&self, id: WorkerAttemptId, msg: String) -> MasterCommand {
        self.workers.error(id, msg)
    }

    // ---- PS ----

    #[instrument(skip(self, location), fields(attempt = %id))]
    pub async fn register_ps(&self, id: PsAttemptId, location: Location) -> MasterCommand {
        self.ps.register(id, location)
    }

    /// PS心跳：未知Attempt直接回复SHUTDOWN，不查询checkpoint状态也不做对账
    #[instrument(skip(self, report), fields(attempt = %id))]
    pub async fn ps_report(
        &self,
        id: PsAttemptId,
        report: PsReport,
    ) -> MasterResult<PsReportResponse> {
        let PsReport {
            payload,
            matrices,
            failed_ps_reports,
        } = report;

        if !self.ps.is_alive(&id) {
            self.ps.reject(&id, "report");
            return Ok(PsReportResponse::shutdown());
        }

        // 先取矩阵表快照，取表失败时不刷新心跳也不产生事件
        let master_table = self.matrix_meta.all_matrix_meta().await?;

        // 取表期间可能已被超时剔除
        if self.ps.report(id, payload) == MasterCommand::Shutdown {
            return Ok(PsReportResponse::shutdown());
        }

        self.commit_coordinator
            .forward_failure_reports(&id.to_string(), &failed_ps_reports);

        let decision = self.commit_coordinator.decide(id.ps, &master_table);
        let delta = reconcile(&master_table, id.ps, &matrices);

        if !delta.is_empty() {
            info!(
                "{} 矩阵对账: 待创建 {}, 待释放 {}, 待恢复 {}",
                id,
                delta.need_create.len(),
                delta.need_release.len(),
                delta.need_recover.len()
            );
        }

        let inventory: Vec<MatrixId> = matrices.iter().map(|m| m.matrix_id).collect();
        if let Err(e) = self.matrix_meta.record_ps_inventory(id.ps, inventory).await {
            warn!("记录 {} 的矩阵清单失败: {}", id, e);
        }

        Ok(PsReportResponse {
            command: decision.command,
            commit: decision.commit,
            delta,
        })
    }

    #[instrument(skip(self), fields(attempt = %id))]
    pub async fn ps_done(&self, id: PsAttemptId) -> MasterCommand {
        self.ps.done(id)
    }

    #[instrument(skip(self, msg), fields(attempt = %id))]
    pub async fn ps_error(&self, id: PsAttemptId, msg: String) -> MasterCommand {
        self.ps.error(id, msg)
    }

    /// 心跳之外单独上报的PS失败计数
    #[instrument(skip(self, counters))]
    pub async fn ps_failed_reports(
        &self,
        reporter: &str,
        counters: BTreeMap<PsId, u32>,
    ) -> MasterCommand {
        self.commit_coordinator
            .forward_failure_reports(reporter, &counters);
        MasterCommand::Ok
    }

    /// 某个PS当前存活Attempt的地址
    pub fn ps_location(&self, ps: PsId) -> Option<(PsAttemptId, AttemptLocation)> {
        self.ps.find_location(|id| id.ps == ps)
    }

    // ---- PS-Agent ----

    #[instrument(skip(self, location), fields(attempt = %id))]
    pub async fn register_ps_agent(
        &self,
        id: PsAgentAttemptId,
        location: Location,
    ) -> MasterCommand {
        self.ps_agents.register(id, location)
    }

    #[instrument(skip(self, report), fields(attempt = %id))]
    pub async fn ps_agent_report(&self, id: PsAgentAttemptId, report: PsAgentReport) -> MasterCommand {
        self.ps_agents.report(id, report.payload)
    }

    #[instrument(skip(self), fields(attempt = %id))]
    pub async fn ps_agent_done(&self, id: PsAgentAttemptId) -> MasterCommand {
        self.ps_agents.done(id)
    }

    #[instrument(skip(self, msg), fields(attempt = %id))]
    pub async fn ps_agent_error(&self, id: PsAgentAttemptId, msg: String) -> MasterCommand {
        self.ps_agents.error(id, msg)
    }

    // ---- 客户端 ----

    /// 总是加入（或覆盖）客户端存活表
    #[instrument(skip(self), fields(client = %id))]
    pub async fn client_register(&self, id: ClientId) -> MasterCommand {
        info!("客户端 {} 注册", id);
        self.clients.register(id);
        MasterCommand::Ok
    }

    /// 只刷新已存在的客户端，从不自动注册
    #[instrument(skip(self), fields(client = %id))]
    pub async fn keep_alive(&self, id: &ClientId) -> bool {
        let alive = self.clients.touch(id);
        if !alive {
            debug!("客户端 {} 不在存活表中，忽略keep alive", id);
        }
        alive
    }

    // ---- 矩阵元数据 ----

    #[instrument(skip(self, specs), fields(count = specs.len()))]
    pub async fn create_matrices(&self, specs: Vec<MatrixSpec>) -> MasterResult<Vec<MatrixMeta>> {
        self.matrix_meta.create_matrices(specs).await
    }

    #[instrument(skip(self))]
    pub async fn get_matrices(&self, names: &[String]) -> MasterResult<Vec<MatrixMeta>> {
        self.matrix_meta.get_matrices(names).await
    }

    #[instrument(skip(self))]
    pub async fn release_matrices(&self, names: &[String]) -> MasterResult<()> {
        self.matrix_meta.release_matrices(names).await
    }

    #[instrument(skip(self))]
    pub async fn get_all_matrix_meta(&self) -> MasterResult<BTreeMap<MatrixId, MatrixMeta>> {
        self.matrix_meta.all_matrix_meta().await
    }

    #[instrument(skip(self))]
    pub async fn check_matrices_created(&self, names: &[String]) -> MasterResult<bool> {
        self.matrix_meta.check_matrices_created(names).await
    }

    // ---- 应用生命周期 ----

    /// 客户端请求停止整个应用
    #[instrument(skip(self))]
    pub async fn stop(&self, exit_status: i32) -> MasterResult<()> {
        let event = AppEvent::from_exit_status(exit_status);
        info!("客户端请求停止应用 (退出码: {}, 事件: {:?})", exit_status, event);
        self.event_sink.emit(MasterEvent::App(event))
    }

    pub fn live_attempts(&self) -> LiveAttempts {
        LiveAttempts {
            workers: self.workers.live_count(),
            ps: self.ps.live_count(),
            ps_agents: self.ps_agents.live_count(),
            clients: self.clients.len(),
        }
    }

    /// 清理已不在存活表中的Attempt的地址记录
    pub fn prune_locations(&self) -> usize {
        self.workers.prune_locations() + self.ps.prune_locations() + self.ps_agents.prune_locations()
    }
}
