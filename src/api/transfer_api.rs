// ==========================================
// 组织架构管理系统 - 导入导出 API
// ==========================================
// 职责: 面向宿主(桌面/HTTP/CLI)的服务门面
// 并发口径: 运行以后台任务派发,Semaphore 限定并发上限(默认 3);
//           每次运行独占连接/引用映射/事务域,运行之间无共享可变状态
// ==========================================

use crate::api::error::ApiError;
use crate::config::{ConfigManager, ExchangeConfigReader};
use crate::domain::transfer::{
    ExportOptions, ExportResult, ImportOptions, ImportResult, RunAudit, RunProgress,
};
use crate::domain::types::RunKind;
use crate::engine::{RunControl, TransferOrchestrator};
use crate::repository::audit_repo::{RunAuditStore, SqliteRunAuditStore};
use crate::repository::sqlite::SqliteStores;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info};
use uuid::Uuid;

/// 运行结果(导入或导出)
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Import(ImportResult),
    Export(ExportResult),
}

/// 后台运行登记项
struct RunEntry {
    control: Arc<RunControl>,
    outcome: Arc<Mutex<Option<RunOutcome>>>,
    failed: Arc<AtomicBool>, // 基础设施失败(无结果可取)
}

// ==========================================
// TransferApi
// ==========================================
pub struct TransferApi {
    db_path: String,
    semaphore: Arc<Semaphore>,
    runs: Arc<Mutex<HashMap<String, RunEntry>>>,
}

impl TransferApi {
    /// 创建新的 TransferApi 实例
    ///
    /// 打开数据库(幂等建表)并按配置确定并发上限
    pub async fn new(db_path: String) -> Result<Self, ApiError> {
        let stores = SqliteStores::new(&db_path)
            .map_err(|e| ApiError::InternalError(format!("数据库初始化失败: {}", e)))?;
        let config = ConfigManager::from_connection(stores.connection());
        let limit = config
            .get_max_concurrent_runs()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        info!(db_path = %db_path, concurrency = limit, "TransferApi 初始化完成");
        Ok(Self {
            db_path,
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
            runs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// 为一次运行装配编排器(独占连接)
    fn build_orchestrator(db_path: &str) -> Result<TransferOrchestrator<ConfigManager>, ApiError> {
        let stores = SqliteStores::new(db_path)
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let conn = stores.connection();
        let audit = Arc::new(SqliteRunAuditStore::new(conn.clone()));
        let config = Arc::new(ConfigManager::from_connection(conn));
        Ok(TransferOrchestrator::new(Arc::new(stores), audit, config))
    }

    fn register_run(&self, run_id: &str, kind: RunKind) -> Result<RunEntry, ApiError> {
        let entry = RunEntry {
            control: Arc::new(RunControl::new(run_id.to_string(), kind)),
            outcome: Arc::new(Mutex::new(None)),
            failed: Arc::new(AtomicBool::new(false)),
        };
        let cloned = RunEntry {
            control: entry.control.clone(),
            outcome: entry.outcome.clone(),
            failed: entry.failed.clone(),
        };
        self.runs
            .lock()
            .map_err(|e| ApiError::InternalError(e.to_string()))?
            .insert(run_id.to_string(), entry);
        Ok(cloned)
    }

    /// 发起后台导入运行
    ///
    /// # 返回
    /// - Ok(String): run_id,供进度轮询/取消/取结果
    pub fn start_import(
        &self,
        source: PathBuf,
        options: ImportOptions,
        initiated_by: impl Into<String>,
    ) -> Result<String, ApiError> {
        let run_id = Uuid::new_v4().to_string();
        let entry = self.register_run(&run_id, RunKind::Import)?;

        let semaphore = self.semaphore.clone();
        let db_path = self.db_path.clone();
        let initiated_by = initiated_by.into();
        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    entry.failed.store(true, Ordering::Relaxed);
                    entry.control.mark_finished();
                    return;
                }
            };
            let orchestrator = match Self::build_orchestrator(&db_path) {
                Ok(orchestrator) => orchestrator,
                Err(e) => {
                    error!(error = %e, "编排器装配失败");
                    entry.failed.store(true, Ordering::Relaxed);
                    entry.control.mark_finished();
                    return;
                }
            };
            match orchestrator
                .import(&source, &options, entry.control.clone(), &initiated_by)
                .await
            {
                Ok(result) => {
                    if let Ok(mut guard) = entry.outcome.lock() {
                        *guard = Some(RunOutcome::Import(result));
                    }
                }
                Err(e) => {
                    error!(error = %e, "导入运行异常终止");
                    entry.failed.store(true, Ordering::Relaxed);
                    entry.control.mark_finished();
                }
            }
        });

        Ok(run_id)
    }

    /// 发起后台导出运行
    pub fn start_export(
        &self,
        dest: PathBuf,
        options: ExportOptions,
        initiated_by: impl Into<String>,
    ) -> Result<String, ApiError> {
        let run_id = Uuid::new_v4().to_string();
        let entry = self.register_run(&run_id, RunKind::Export)?;

        let semaphore = self.semaphore.clone();
        let db_path = self.db_path.clone();
        let initiated_by = initiated_by.into();
        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    entry.failed.store(true, Ordering::Relaxed);
                    entry.control.mark_finished();
                    return;
                }
            };
            let orchestrator = match Self::build_orchestrator(&db_path) {
                Ok(orchestrator) => orchestrator,
                Err(e) => {
                    error!(error = %e, "编排器装配失败");
                    entry.failed.store(true, Ordering::Relaxed);
                    entry.control.mark_finished();
                    return;
                }
            };
            match orchestrator
                .export(&dest, &options, entry.control.clone(), &initiated_by)
                .await
            {
                Ok(result) => {
                    if let Ok(mut guard) = entry.outcome.lock() {
                        *guard = Some(RunOutcome::Export(result));
                    }
                }
                Err(e) => {
                    error!(error = %e, "导出运行异常终止");
                    entry.failed.store(true, Ordering::Relaxed);
                    entry.control.mark_finished();
                }
            }
        });

        Ok(run_id)
    }

    /// 同步导入预演(不落库,结果形态与正式导入一致)
    pub async fn preview_import(
        &self,
        source: &Path,
        options: &ImportOptions,
        initiated_by: &str,
    ) -> Result<ImportResult, ApiError> {
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let orchestrator = Self::build_orchestrator(&self.db_path)?;
        let control = Arc::new(RunControl::new(
            Uuid::new_v4().to_string(),
            RunKind::Import,
        ));
        orchestrator
            .preview(source, options, control, initiated_by)
            .await
            .map_err(|e| ApiError::ImportError(e.to_string()))
    }

    /// 进度快照(轮询,不打断运行)
    pub fn progress(&self, run_id: &str) -> Result<RunProgress, ApiError> {
        let runs = self
            .runs
            .lock()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        runs.get(run_id)
            .map(|entry| entry.control.snapshot())
            .ok_or_else(|| ApiError::RunNotFound(run_id.to_string()))
    }

    /// 请求取消运行(块/类型边界生效,结果为 ROLLED_BACK)
    pub fn cancel(&self, run_id: &str) -> Result<(), ApiError> {
        let runs = self
            .runs
            .lock()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        match runs.get(run_id) {
            Some(entry) => {
                entry.control.cancel();
                Ok(())
            }
            None => Err(ApiError::RunNotFound(run_id.to_string())),
        }
    }

    /// 取运行结果(未结束返回 None)
    pub fn result(&self, run_id: &str) -> Result<Option<RunOutcome>, ApiError> {
        let runs = self
            .runs
            .lock()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let entry = runs
            .get(run_id)
            .ok_or_else(|| ApiError::RunNotFound(run_id.to_string()))?;
        let guard = entry
            .outcome
            .lock()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        Ok(guard.clone())
    }

    /// 等待运行结束并取结果
    pub async fn wait(&self, run_id: &str) -> Result<RunOutcome, ApiError> {
        loop {
            {
                let runs = self
                    .runs
                    .lock()
                    .map_err(|e| ApiError::InternalError(e.to_string()))?;
                let entry = runs
                    .get(run_id)
                    .ok_or_else(|| ApiError::RunNotFound(run_id.to_string()))?;
                if let Ok(guard) = entry.outcome.lock() {
                    if let Some(outcome) = guard.clone() {
                        return Ok(outcome);
                    }
                }
                if entry.failed.load(Ordering::Relaxed) {
                    return Err(ApiError::InternalError(format!(
                        "运行异常终止: {}",
                        run_id
                    )));
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// 最近运行审计(追溯/排障)
    pub async fn recent_runs(&self, limit: usize) -> Result<Vec<RunAudit>, ApiError> {
        let stores = SqliteStores::new(&self.db_path)
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let audit = SqliteRunAuditStore::new(stores.connection());
        audit
            .recent(limit)
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))
    }
}
