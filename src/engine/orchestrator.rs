// ==========================================
// 组织架构管理系统 - 导入导出编排器
// ==========================================
// 职责: 顶层状态机,串联 依赖解析 → 引用解析 → 冲突决策 → 批量执行
// 状态: STARTED → VALIDATING → (FAILED_VALIDATION)
//              → RESOLVING_DEPENDENCIES → (FAILED_FATAL)
//              → PROCESSING[type]* → COMPLETED | ROLLED_BACK
// 事务口径: 整个运行一个事务,任何 FATAL 回滚全部已提交写入
// ==========================================

use crate::config::ExchangeConfigReader;
use crate::domain::transfer::{
    EntityCounts, ExportOptions, ExportResult, ImportOptions, ImportResult, RunAudit,
    ValidationError,
};
use crate::domain::types::{EntityType, ErrorKind, RunKind, RunPhase, Severity};
use crate::engine::batch_executor::{BatchExecutor, ExecuteParams};
use crate::engine::dependency_graph::DependencyGraphResolver;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::reference_resolver::{PreparedRecord, ReferenceMap, ReferenceResolver};
use crate::engine::run_control::RunControl;
use crate::importer::field_mapper::FieldMapper;
use crate::importer::format::{processor_for, source_size_bytes, ExportDataset, ExportMetadata};
use crate::importer::validator::StructureValidator;
use crate::repository::audit_repo::RunAuditStore;
use crate::repository::entity_store::{
    EntityStore as _, EntityStoreProvider, ExportFilter, TransactionScope,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

// ==========================================
// TransferOrchestrator
// ==========================================
pub struct TransferOrchestrator<C>
where
    C: ExchangeConfigReader,
{
    provider: Arc<dyn EntityStoreProvider>,
    audit: Arc<dyn RunAuditStore>,
    config: Arc<C>,
    graph_resolver: DependencyGraphResolver,
    reference_resolver: ReferenceResolver,
    executor: BatchExecutor,
    mapper: FieldMapper,
    validator: StructureValidator,
}

impl<C> TransferOrchestrator<C>
where
    C: ExchangeConfigReader,
{
    /// 创建新的编排器实例
    ///
    /// # 参数
    /// - provider: 实体存储提供者(运行独占连接)
    /// - audit: 运行审计仓储
    /// - config: 配置读取器
    pub fn new(provider: Arc<dyn EntityStoreProvider>, audit: Arc<dyn RunAuditStore>, config: Arc<C>) -> Self {
        Self {
            provider,
            audit,
            config,
            graph_resolver: DependencyGraphResolver::new(),
            reference_resolver: ReferenceResolver::new(),
            executor: BatchExecutor::new(),
            mapper: FieldMapper,
            validator: StructureValidator,
        }
    }

    // ==========================================
    // 导入
    // ==========================================

    /// 执行导入运行
    ///
    /// 业务性失败(FATAL 校验/回滚/取消)以 success=false 的
    /// ImportResult 返回; Err 仅表示基础设施失败。
    #[instrument(skip_all, fields(run_id = %control.run_id()))]
    pub async fn import(
        &self,
        source: &Path,
        options: &ImportOptions,
        control: Arc<RunControl>,
        initiated_by: &str,
    ) -> EngineResult<ImportResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let validate_only = options.validate_only;
        let requested =
            DependencyGraphResolver::normalize_requested(options.entity_types.as_deref());

        info!(
            source = %source.display(),
            strategy = %options.conflict_resolution,
            validate_only = validate_only,
            types = requested.len(),
            "开始导入运行"
        );

        let mut errors: Vec<ValidationError> = Vec::new();
        let mut warnings: Vec<ValidationError> = Vec::new();
        let mut counts: Vec<EntityCounts> = Vec::new();

        // === 阶段 1: 结构校验 ===
        control.set_phase(RunPhase::Validating);

        let limit_mb = self
            .config
            .get_max_file_size_mb()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;
        match source_size_bytes(source) {
            Ok(size) if size > limit_mb * 1024 * 1024 => {
                errors.push(ValidationError::fatal(
                    ErrorKind::FileFormatError,
                    format!(
                        "源文件超出大小限制: {} 字节 > {} MB",
                        size, limit_mb
                    ),
                ));
                return self
                    .finish_import(
                        &control, RunPhase::FailedValidation, started_at, start, source,
                        initiated_by, validate_only, counts, errors, warnings,
                    )
                    .await;
            }
            Err(e) => {
                errors.push(ValidationError::fatal(ErrorKind::FileFormatError, e.to_string()));
                return self
                    .finish_import(
                        &control, RunPhase::FailedValidation, started_at, start, source,
                        initiated_by, validate_only, counts, errors, warnings,
                    )
                    .await;
            }
            Ok(_) => {}
        }

        let parsed = match processor_for(source).and_then(|p| p.parse(source, &requested)) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(error = %e, "源文件解析失败");
                errors.push(ValidationError::fatal(ErrorKind::FileFormatError, e.to_string()));
                return self
                    .finish_import(
                        &control, RunPhase::FailedValidation, started_at, start, source,
                        initiated_by, validate_only, counts, errors, warnings,
                    )
                    .await;
            }
        };

        let header_errors = self.validator.validate_headers(&parsed);
        if !header_errors.is_empty() {
            errors.extend(header_errors);
            return self
                .finish_import(
                    &control, RunPhase::FailedValidation, started_at, start, source,
                    initiated_by, validate_only, counts, errors, warnings,
                )
                .await;
        }

        for entity in &parsed.missing {
            warnings.push(ValidationError::warning(
                ErrorKind::FileFormatError,
                Some(*entity),
                None,
                None,
                format!("请求的实体类型 {} 在源中缺席,已跳过", entity),
            ));
        }

        control.set_total(parsed.records.len());
        info!(records = parsed.records.len(), "源文件解析完成");

        // === 阶段 2: 依赖解析 ===
        control.set_phase(RunPhase::ResolvingDependencies);
        let resolution = match self.graph_resolver.resolve(&requested) {
            Ok(resolution) => resolution,
            Err(fatal) => {
                errors.push(fatal);
                return self
                    .finish_import(
                        &control, RunPhase::FailedFatal, started_at, start, source,
                        initiated_by, validate_only, counts, errors, warnings,
                    )
                    .await;
            }
        };
        warnings.extend(resolution.warnings);
        debug!(order = ?resolution.order, "依赖顺序解析完成");

        // === 阶段 3: 字段映射 + 行级校验 ===
        let mut grouped: HashMap<EntityType, Vec<PreparedRecord>> = HashMap::new();
        let mut dropped: HashMap<EntityType, usize> = HashMap::new();
        for record in &parsed.records {
            match self.mapper.map_record(record) {
                Err(e) => {
                    warn!(row = record.source_row_index, entity = %record.entity_type, "字段映射失败");
                    errors.push(e);
                    *dropped.entry(record.entity_type).or_default() += 1;
                    control.add_processed(1);
                }
                Ok(fields) => {
                    let row_errors = self.validator.validate_record(
                        record.entity_type,
                        record.source_row_index,
                        &fields,
                    );
                    if row_errors.is_empty() {
                        grouped
                            .entry(record.entity_type)
                            .or_default()
                            .push(PreparedRecord {
                                source_row_index: record.source_row_index,
                                fields,
                            });
                    } else {
                        errors.extend(row_errors);
                        *dropped.entry(record.entity_type).or_default() += 1;
                        control.add_processed(1);
                    }
                }
            }
        }

        // === 阶段 4: 逐类型执行(运行级事务) ===
        let batch_size = match options.batch_size {
            Some(n) => n,
            None => self
                .config
                .get_default_batch_size()
                .await
                .map_err(|e| EngineError::Config(e.to_string()))?,
        };

        let tx: Option<Box<dyn TransactionScope>> = if validate_only {
            None
        } else {
            match self.provider.begin_run().await {
                Ok(tx) => Some(tx),
                Err(e) => {
                    errors.push(ValidationError::fatal(
                        ErrorKind::BusinessRuleViolation,
                        format!("运行事务开启失败: {}", e),
                    ));
                    return self
                        .finish_import(
                            &control, RunPhase::FailedFatal, started_at, start, source,
                            initiated_by, validate_only, counts, errors, warnings,
                        )
                        .await;
                }
            }
        };

        let mut reference_map = ReferenceMap::new();
        let mut fatal: Option<ValidationError> = None;

        for entity in &resolution.order {
            control.set_phase(RunPhase::Processing(*entity));

            // 取消检查(实体类型边界)
            if control.is_cancelled() {
                fatal = Some(ValidationError::fatal(ErrorKind::Cancelled, "运行已被取消"));
                break;
            }

            let records = grouped.remove(entity).unwrap_or_default();
            let ordered = match self
                .reference_resolver
                .order_self_references(*entity, records)
            {
                Ok(ordered) => ordered,
                Err(cycle) => {
                    fatal = Some(cycle);
                    break;
                }
            };

            let exec_result = {
                let mut params = ExecuteParams {
                    provider: self.provider.as_ref(),
                    tx: tx.as_deref(),
                    reference_map: &mut reference_map,
                    control: &control,
                    strategy: options.conflict_resolution,
                    validate_only,
                    batch_size,
                };
                self.executor.execute(*entity, ordered, &mut params).await
            };

            match exec_result {
                Ok(outcome) => {
                    let pre = dropped.remove(entity).unwrap_or(0);
                    counts.push(EntityCounts {
                        entity_type: Some(*entity),
                        processed: outcome.result.processed + pre,
                        created: outcome.result.created,
                        updated: outcome.result.updated,
                        skipped: outcome.result.skipped,
                    });
                    errors.extend(outcome.result.errors);
                    warnings.extend(outcome.warnings);
                }
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            }
        }

        // === 阶段 5: 终结(提交或整体回滚) ===
        if let Some(fatal) = fatal {
            if let Some(tx) = tx {
                if let Err(e) = tx.rollback().await {
                    error!(error = %e, "运行回滚失败");
                }
            }
            warn!(reason = %fatal.message, "运行中止,所有已提交写入已回滚");
            errors.push(fatal);
            return self
                .finish_import(
                    &control, RunPhase::RolledBack, started_at, start, source,
                    initiated_by, validate_only, counts, errors, warnings,
                )
                .await;
        }

        if let Some(tx) = tx {
            if let Err(e) = tx.commit().await {
                errors.push(ValidationError::fatal(
                    ErrorKind::BusinessRuleViolation,
                    format!("运行提交失败: {}", e),
                ));
                return self
                    .finish_import(
                        &control, RunPhase::FailedFatal, started_at, start, source,
                        initiated_by, validate_only, counts, errors, warnings,
                    )
                    .await;
            }
        }

        self.finish_import(
            &control, RunPhase::Completed, started_at, start, source, initiated_by,
            validate_only, counts, errors, warnings,
        )
        .await
    }

    /// 导入预演: 走完整管道但不落库,结果形态与正式导入一致
    pub async fn preview(
        &self,
        source: &Path,
        options: &ImportOptions,
        control: Arc<RunControl>,
        initiated_by: &str,
    ) -> EngineResult<ImportResult> {
        let mut preview_options = options.clone();
        preview_options.validate_only = true;
        self.import(source, &preview_options, control, initiated_by).await
    }

    /// 组装导入结果 + 写审计 + 终态迁移
    #[allow(clippy::too_many_arguments)]
    async fn finish_import(
        &self,
        control: &RunControl,
        phase: RunPhase,
        started_at: DateTime<Utc>,
        start: Instant,
        source: &Path,
        initiated_by: &str,
        validate_only: bool,
        counts: Vec<EntityCounts>,
        errors: Vec<ValidationError>,
        warnings: Vec<ValidationError>,
    ) -> EngineResult<ImportResult> {
        control.set_phase(phase);
        let success = !errors.iter().any(|e| e.severity == Severity::Fatal);
        let result = ImportResult {
            run_id: control.run_id().to_string(),
            success,
            validate_only,
            counts,
            errors,
            warnings,
            execution_time_ms: start.elapsed().as_millis() as i64,
        };

        self.record_audit(
            control,
            RunKind::Import,
            initiated_by,
            &source.display().to_string(),
            started_at,
            result.success,
            result.counts.iter().map(|c| c.processed as i64).sum(),
            serde_json::to_string(&result)
                .unwrap_or_else(|e| format!("{{\"serialize_error\":\"{}\"}}", e)),
        )
        .await;

        control.mark_finished();
        info!(
            phase = %phase,
            success = result.success,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            elapsed_ms = result.execution_time_ms,
            "导入运行结束"
        );
        Ok(result)
    }

    // ==========================================
    // 导出
    // ==========================================

    /// 执行导出运行
    ///
    /// 与导入走同一依赖顺序; CSV 每实体类型一个文件,JSON 单文档
    #[instrument(skip_all, fields(run_id = %control.run_id()))]
    pub async fn export(
        &self,
        dest: &Path,
        options: &ExportOptions,
        control: Arc<RunControl>,
        initiated_by: &str,
    ) -> EngineResult<ExportResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let requested =
            DependencyGraphResolver::normalize_requested(options.entity_types.as_deref());

        info!(
            dest = %dest.display(),
            include_historical = options.include_historical,
            types = requested.len(),
            "开始导出运行"
        );

        let mut errors: Vec<ValidationError> = Vec::new();
        let mut warnings: Vec<ValidationError> = Vec::new();
        let mut counts: Vec<EntityCounts> = Vec::new();
        let mut files: Vec<String> = Vec::new();
        let mut total = 0usize;

        control.set_phase(RunPhase::ResolvingDependencies);
        let resolution = match self.graph_resolver.resolve(&requested) {
            Ok(resolution) => resolution,
            Err(fatal) => {
                errors.push(fatal);
                return self
                    .finish_export(
                        &control, RunPhase::FailedFatal, started_at, start, dest,
                        initiated_by, counts, total, files, errors, warnings,
                    )
                    .await;
            }
        };
        warnings.extend(resolution.warnings);

        let filter = ExportFilter {
            include_historical: options.include_historical,
            date_range: options.date_range,
        };

        let mut sections = Vec::new();
        for entity in &resolution.order {
            control.set_phase(RunPhase::Processing(*entity));

            if control.is_cancelled() {
                errors.push(ValidationError::fatal(ErrorKind::Cancelled, "运行已被取消"));
                return self
                    .finish_export(
                        &control, RunPhase::RolledBack, started_at, start, dest,
                        initiated_by, counts, total, files, errors, warnings,
                    )
                    .await;
            }

            let rows = match self.provider.store(*entity).list(&filter).await {
                Ok(rows) => rows,
                Err(e) => {
                    errors.push(ValidationError::fatal(
                        ErrorKind::BusinessRuleViolation,
                        format!("读取 {} 失败: {}", entity, e),
                    ));
                    return self
                        .finish_export(
                            &control, RunPhase::FailedFatal, started_at, start, dest,
                            initiated_by, counts, total, files, errors, warnings,
                        )
                        .await;
                }
            };

            control.add_processed(rows.len());
            total += rows.len();
            counts.push(EntityCounts {
                entity_type: Some(*entity),
                processed: rows.len(),
                created: 0,
                updated: 0,
                skipped: 0,
            });
            sections.push((*entity, rows));
        }
        control.set_total(total);

        let dataset = ExportDataset {
            metadata: ExportMetadata {
                export_date: Utc::now(),
                version: "1.0".to_string(),
                total_records: total,
            },
            sections,
        };

        let written = processor_for(dest)
            .and_then(|p| p.write(dest, &dataset, &options.format_options));
        match written {
            Ok(paths) => {
                files = paths
                    .into_iter()
                    .map(|p| p.display().to_string())
                    .collect();
            }
            Err(e) => {
                error!(error = %e, "导出写盘失败");
                errors.push(ValidationError::fatal(ErrorKind::FileFormatError, e.to_string()));
                return self
                    .finish_export(
                        &control, RunPhase::FailedFatal, started_at, start, dest,
                        initiated_by, counts, total, files, errors, warnings,
                    )
                    .await;
            }
        }

        self.finish_export(
            &control, RunPhase::Completed, started_at, start, dest, initiated_by,
            counts, total, files, errors, warnings,
        )
        .await
    }

    /// 组装导出结果 + 写审计 + 终态迁移
    #[allow(clippy::too_many_arguments)]
    async fn finish_export(
        &self,
        control: &RunControl,
        phase: RunPhase,
        started_at: DateTime<Utc>,
        start: Instant,
        dest: &Path,
        initiated_by: &str,
        counts: Vec<EntityCounts>,
        total: usize,
        files: Vec<String>,
        errors: Vec<ValidationError>,
        warnings: Vec<ValidationError>,
    ) -> EngineResult<ExportResult> {
        control.set_phase(phase);
        let success = !errors.iter().any(|e| e.severity == Severity::Fatal);
        let result = ExportResult {
            run_id: control.run_id().to_string(),
            success,
            counts,
            total_records: total,
            files,
            errors,
            warnings,
            execution_time_ms: start.elapsed().as_millis() as i64,
        };

        self.record_audit(
            control,
            RunKind::Export,
            initiated_by,
            &dest.display().to_string(),
            started_at,
            result.success,
            result.total_records as i64,
            serde_json::to_string(&result)
                .unwrap_or_else(|e| format!("{{\"serialize_error\":\"{}\"}}", e)),
        )
        .await;

        control.mark_finished();
        info!(
            phase = %phase,
            success = result.success,
            total = result.total_records,
            elapsed_ms = result.execution_time_ms,
            "导出运行结束"
        );
        Ok(result)
    }

    /// 审计留痕(失败只告警,不影响运行结果)
    #[allow(clippy::too_many_arguments)]
    async fn record_audit(
        &self,
        control: &RunControl,
        kind: RunKind,
        initiated_by: &str,
        source: &str,
        started_at: DateTime<Utc>,
        success: bool,
        processed_records: i64,
        result_json: String,
    ) {
        let audit = RunAudit {
            run_id: control.run_id().to_string(),
            kind,
            initiated_by: initiated_by.to_string(),
            source: source.to_string(),
            started_at,
            finished_at: Utc::now(),
            success,
            processed_records,
            result_json,
        };
        if let Err(e) = self.audit.record(&audit).await {
            error!(run_id = %audit.run_id, error = %e, "审计记录写入失败");
        }
    }
}
