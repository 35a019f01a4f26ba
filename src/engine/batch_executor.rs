// ==========================================
// 组织架构管理系统 - 批量事务执行器
// ==========================================
// 职责: 单实体类型的分块持久化
// 事务口径: 整个运行一个事务; 块为保存点(取消检查边界);
//           行为嵌套保存点(单行持久化失败可恢复)
// validate_only: 不发起任何持久化调用,只报告决策
// ==========================================

use crate::domain::registry::natural_key;
use crate::domain::transfer::{BatchResult, ResolvedRecord, ValidationError};
use crate::domain::types::{ConflictStrategy, EntityType, ErrorKind, RecordAction};
use crate::engine::conflict_resolver::ConflictResolver;
use crate::engine::reference_resolver::{PreparedRecord, ReferenceMap, ReferenceResolver};
use crate::engine::run_control::RunControl;
use crate::repository::entity_store::{EntityStore, EntityStoreProvider, TransactionScope};
use crate::repository::error::RepositoryError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 一次批处理调用的环境
pub struct ExecuteParams<'a> {
    pub provider: &'a dyn EntityStoreProvider,
    /// validate_only 运行没有事务
    pub tx: Option<&'a dyn TransactionScope>,
    pub reference_map: &'a mut ReferenceMap,
    pub control: &'a RunControl,
    pub strategy: ConflictStrategy,
    pub validate_only: bool,
    pub batch_size: usize,
}

/// 批处理产物(计数 + 行级错误 + 警告)
#[derive(Debug)]
pub struct BatchOutcome {
    pub result: BatchResult,
    pub warnings: Vec<ValidationError>,
}

// ==========================================
// BatchExecutor
// ==========================================
pub struct BatchExecutor {
    reference_resolver: ReferenceResolver,
    conflict_resolver: ConflictResolver,
}

impl BatchExecutor {
    pub fn new() -> Self {
        Self {
            reference_resolver: ReferenceResolver::new(),
            conflict_resolver: ConflictResolver::new(),
        }
    }

    /// 执行单实体类型的记录批
    ///
    /// 记录必须已完成字段映射/行级校验/类型内排序;
    /// 逐条完成 外键解析 → 冲突决策 → 持久化,
    /// 提交后立即登记引用映射,供同批后续行引用。
    ///
    /// # 返回
    /// - Ok(BatchOutcome): 行级错误已收敛在内,运行继续
    /// - Err(ValidationError): FATAL(取消/完整性/事务失败),调用方整体回滚
    pub async fn execute(
        &self,
        entity_type: EntityType,
        records: Vec<PreparedRecord>,
        params: &mut ExecuteParams<'_>,
    ) -> Result<BatchOutcome, ValidationError> {
        let mut result = BatchResult::new(entity_type);
        let mut warnings = Vec::new();
        let store = params.provider.store(entity_type);

        debug!(
            entity = %entity_type,
            records = records.len(),
            batch_size = params.batch_size,
            validate_only = params.validate_only,
            "开始批量执行"
        );

        for (chunk_idx, chunk) in records.chunks(params.batch_size.max(1)).enumerate() {
            // 取消检查(块边界; 进行中的块不可单条撤销)
            if params.control.is_cancelled() {
                return Err(ValidationError::fatal(ErrorKind::Cancelled, "运行已被取消"));
            }

            let chunk_sp = format!("chunk_{}", chunk_idx);
            if let Some(tx) = params.tx {
                tx.savepoint(&chunk_sp).await.map_err(fatal_from_repo)?;
            }

            for record in chunk {
                result.processed += 1;
                params.control.add_processed(1);

                let mut fields = record.fields.clone();

                // === 外键解析 ===
                let outcome = self
                    .reference_resolver
                    .resolve_foreign_keys(
                        entity_type,
                        record.source_row_index,
                        &mut fields,
                        params.reference_map,
                        params.provider,
                    )
                    .await
                    .map_err(fatal_from_repo)?;
                warnings.extend(outcome.warnings);
                if !outcome.errors.is_empty() {
                    result.errors.extend(outcome.errors);
                    continue;
                }

                // === 冲突决策 ===
                // 运行内刚登记的自然键优先(validate_only 下存储不可见新建记录)
                let run_scoped = natural_key(entity_type, &fields).and_then(|key| {
                    params
                        .reference_map
                        .resolve(entity_type, &key)
                        .map(|id| (key, id.clone()))
                });
                let decision = match run_scoped {
                    Some((key, id)) => {
                        let mut decision =
                            ConflictResolver::apply_strategy(entity_type, id, params.strategy);
                        decision.natural_key = Some(key);
                        decision
                    }
                    None => {
                        match self
                            .conflict_resolver
                            .decide(entity_type, &fields, params.strategy, store.as_ref())
                            .await
                        {
                            Ok(decision) => decision,
                            Err(e) if e.is_fatal() => return Err(fatal_from_repo(e)),
                            Err(e) => {
                                result.errors.push(row_error_from_repo(
                                    entity_type,
                                    record.source_row_index,
                                    &e,
                                ));
                                continue;
                            }
                        }
                    }
                };

                if decision.existing_id.is_some() {
                    debug!(
                        entity = %entity_type,
                        row = record.source_row_index,
                        action = %decision.action,
                        "检测到重复记录,按策略处理"
                    );
                }

                let resolved = ResolvedRecord {
                    entity_type,
                    source_row_index: record.source_row_index,
                    source_id: record.source_id(),
                    fields,
                    action: decision.action,
                    existing_id: decision.existing_id,
                    natural_key: decision.natural_key,
                };

                // === 持久化分发 ===
                let persisted_id = if params.validate_only {
                    // 预演: 不落库,合成 id 仅用于后续引用解析
                    match resolved.action {
                        RecordAction::Skip | RecordAction::Update => resolved.existing_id.clone(),
                        RecordAction::Create | RecordAction::CreateVersion => {
                            Some(Uuid::new_v4().to_string())
                        }
                    }
                } else {
                    match self.persist(store.as_ref(), &resolved, params.tx).await {
                        Ok(id) => id,
                        Err(e) if e.is_fatal() => return Err(fatal_from_repo(e)),
                        Err(e) => {
                            warn!(
                                entity = %entity_type,
                                row = resolved.source_row_index,
                                error = %e,
                                "单行持久化失败,跳过该行"
                            );
                            result.errors.push(row_error_from_repo(
                                entity_type,
                                resolved.source_row_index,
                                &e,
                            ));
                            continue;
                        }
                    }
                };

                // === 计数与引用登记 ===
                match resolved.action {
                    RecordAction::Create => result.created += 1,
                    RecordAction::Update => result.updated += 1,
                    RecordAction::CreateVersion => result.created += 1,
                    RecordAction::Skip => result.skipped += 1,
                }
                if let Some(id) = persisted_id {
                    if let Some(source_id) = &resolved.source_id {
                        params
                            .reference_map
                            .register(entity_type, source_id.clone(), &id);
                    }
                    if let Some(key) = &resolved.natural_key {
                        params.reference_map.register(entity_type, key.clone(), &id);
                    }
                }
            }

            if let Some(tx) = params.tx {
                tx.release(&chunk_sp).await.map_err(fatal_from_repo)?;
            }
        }

        info!(
            entity = %entity_type,
            processed = result.processed,
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            errors = result.errors.len(),
            "批量执行完成"
        );

        Ok(BatchOutcome { result, warnings })
    }

    /// 单行持久化(行保存点内)
    async fn persist(
        &self,
        store: &dyn EntityStore,
        record: &ResolvedRecord,
        tx: Option<&dyn TransactionScope>,
    ) -> Result<Option<String>, RepositoryError> {
        if record.action == RecordAction::Skip {
            return Ok(record.existing_id.clone());
        }

        if let Some(tx) = tx {
            tx.savepoint("rec").await?;
        }

        let attempt = match record.action {
            RecordAction::Create => store.create(&record.fields).await.map(Some),
            RecordAction::CreateVersion => store.create_new_version(&record.fields).await.map(Some),
            RecordAction::Update => {
                // existing_id 在 Update 决策下必然存在
                let id = record.existing_id.clone().ok_or_else(|| {
                    RepositoryError::InternalError("UPDATE 决策缺少已存在记录 id".to_string())
                })?;
                store.update(&id, &record.fields).await.map(|_| Some(id))
            }
            RecordAction::Skip => unreachable!(),
        };

        if let Some(tx) = tx {
            match &attempt {
                Ok(_) => tx.release("rec").await?,
                Err(_) => {
                    tx.rollback_to("rec").await?;
                    tx.release("rec").await?;
                }
            }
        }

        attempt
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// 仓储错误 → 行级 ValidationError
fn row_error_from_repo(
    entity_type: EntityType,
    source_row_index: usize,
    error: &RepositoryError,
) -> ValidationError {
    let kind = match error {
        RepositoryError::ForeignKeyViolation(_) => ErrorKind::ForeignKeyViolation,
        RepositoryError::FieldValueError { .. } => ErrorKind::InvalidDataType,
        _ => ErrorKind::BusinessRuleViolation,
    };
    let field = match error {
        RepositoryError::FieldValueError { field, .. } => Some(field.as_str()),
        _ => None,
    };
    ValidationError::row_error(kind, entity_type, source_row_index, field, error.to_string())
}

/// 仓储致命错误 → 运行级 FATAL
fn fatal_from_repo(error: RepositoryError) -> ValidationError {
    ValidationError::fatal(ErrorKind::BusinessRuleViolation, error.to_string())
}
