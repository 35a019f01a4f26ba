// ==========================================
// 组织架构管理系统 - 冲突决策引擎
// ==========================================
// 职责: 按自然键检测重复,依策略裁定 RecordAction
// 红线: 纯决策,不做任何持久化(落库在批量执行器)
// ==========================================

use crate::domain::registry::natural_key;
use crate::domain::types::{ConflictStrategy, EntityType, RecordAction};
use crate::repository::entity_store::EntityStore;
use crate::repository::error::RepositoryResult;
use serde_json::{Map, Value};
use tracing::debug;

/// 冲突决策产物
#[derive(Debug, Clone)]
pub struct ConflictDecision {
    pub action: RecordAction,
    pub existing_id: Option<String>, // 重复命中的已持久化 id
    pub natural_key: Option<String>,
}

// ==========================================
// ConflictResolver
// ==========================================
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    /// 已知重复时按策略直接裁定(批量执行器在运行内映射命中时走此口)
    pub fn apply_strategy(
        entity_type: EntityType,
        existing_id: String,
        strategy: ConflictStrategy,
    ) -> ConflictDecision {
        let action = match strategy {
            ConflictStrategy::Skip => RecordAction::Skip,
            ConflictStrategy::Update => RecordAction::Update,
            ConflictStrategy::CreateVersion => {
                if entity_type.descriptor().supports_versioning {
                    RecordAction::CreateVersion
                } else {
                    // 非版本化实体退化为 update 口径
                    debug!(entity = %entity_type, "create_version 对该实体退化为 update");
                    RecordAction::Update
                }
            }
        };
        ConflictDecision {
            action,
            existing_id: Some(existing_id),
            natural_key: None,
        }
    }

    /// 裁定单条(外键已解析的)记录的动作
    ///
    /// # 策略口径
    /// - skip: 重复 → SKIP,否则 CREATE
    /// - update: 重复 → UPDATE(覆盖非键字段),否则 CREATE
    /// - create_version: 仅对支持版本化的实体生效(任职记录);
    ///   其余类型退化为 update 口径
    pub async fn decide(
        &self,
        entity_type: EntityType,
        fields: &Map<String, Value>,
        strategy: ConflictStrategy,
        store: &dyn EntityStore,
    ) -> RepositoryResult<ConflictDecision> {
        let key = match natural_key(entity_type, fields) {
            Some(key) => key,
            // 自然键字段缺失: 必填校验已拦截,这里按新建处理
            None => {
                return Ok(ConflictDecision {
                    action: RecordAction::Create,
                    existing_id: None,
                    natural_key: None,
                })
            }
        };

        let existing = store.find_id_by_natural_key(&key).await?;
        let decision = match existing {
            None => ConflictDecision {
                action: RecordAction::Create,
                existing_id: None,
                natural_key: Some(key),
            },
            Some(existing_id) => {
                let mut decision = Self::apply_strategy(entity_type, existing_id, strategy);
                decision.natural_key = Some(key);

                // 内容未变化的重复不产生覆盖/新版本,按 SKIP 处理
                // (避免重复导入同一文件时刷新全表或制造虚假版本)
                if matches!(
                    decision.action,
                    RecordAction::Update | RecordAction::CreateVersion
                ) {
                    if let Some(id) = &decision.existing_id {
                        if let Some(existing_fields) = store.get_by_id(id).await? {
                            if Self::fields_equivalent(entity_type, fields, &existing_fields) {
                                decision.action = RecordAction::Skip;
                            }
                        }
                    }
                }
                decision
            }
        };

        Ok(decision)
    }
}

impl ConflictResolver {
    /// 判断来料字段与已存在记录是否等价
    ///
    /// 只比较来料中实际给出的业务字段;
    /// id / version / is_current 属于存储管理字段,不参与比较
    fn fields_equivalent(
        entity_type: EntityType,
        incoming: &Map<String, Value>,
        existing: &Map<String, Value>,
    ) -> bool {
        for field in entity_type.descriptor().fields {
            if matches!(*field, "id" | "version" | "is_current") {
                continue;
            }
            let incoming_value = match incoming.get(*field) {
                None | Some(Value::Null) => continue, // 未给出 → 不构成差异
                Some(value) => value,
            };
            let existing_value = existing.get(*field).unwrap_or(&Value::Null);
            if !Self::values_equal(incoming_value, existing_value) {
                return false;
            }
        }
        true
    }

    /// 数值按 f64 比较,其余按结构相等
    fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
            _ => a == b,
        }
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new()
    }
}
