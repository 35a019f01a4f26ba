// ==========================================
// 组织架构管理系统 - 引用解析器
// ==========================================
// 职责: 外键字段的源引用 → 持久化 id
// 解析顺序: (a) 运行内 ReferenceMap(覆盖同文件引用,含自引用)
//           (b) 存储层自然键/id 存在性检查
//           (c) 必填 → FOREIGN_KEY_VIOLATION(ERROR,跳行);
//               可选 → 置空 + WARNING
// 附带: 类型内自引用(单元父子)的二次拓扑排序
// ==========================================

use crate::domain::registry::natural_key;
use crate::domain::transfer::ValidationError;
use crate::domain::types::{EntityType, ErrorKind};
use crate::engine::dependency_graph::topo_sort;
use crate::repository::entity_store::{EntityStore as _, EntityStoreProvider};
use crate::repository::error::RepositoryResult;
use serde_json::{Map, Value};
use std::collections::HashMap;

// ==========================================
// ReferenceMap - 运行域引用映射
// ==========================================
// (实体类型, 源 id 或自然键) → 持久化 id
// 红线: 每次运行独立构造,运行结束即丢弃;
//       条目一经写入不再覆盖(幂等查找)
#[derive(Debug, Default)]
pub struct ReferenceMap {
    entries: HashMap<(EntityType, String), String>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一条映射(已存在的条目保持不变)
    pub fn register(&mut self, entity_type: EntityType, key: impl Into<String>, id: &str) {
        self.entries
            .entry((entity_type, key.into()))
            .or_insert_with(|| id.to_string());
    }

    pub fn resolve(&self, entity_type: EntityType, key: &str) -> Option<&String> {
        self.entries.get(&(entity_type, key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ==========================================
// PreparedRecord - 待执行记录
// ==========================================
// 字段映射与行级校验之后、外键解析之前的形态
#[derive(Debug, Clone)]
pub struct PreparedRecord {
    pub source_row_index: usize,
    pub fields: Map<String, Value>,
}

impl PreparedRecord {
    /// 源文件 id 列(仅作引用登记,不进入存储)
    pub fn source_id(&self) -> Option<String> {
        self.fields
            .get("id")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// 单条记录的外键解析结果
#[derive(Debug, Default)]
pub struct ResolveOutcome {
    pub errors: Vec<ValidationError>,   // 非空 → 该行跳过
    pub warnings: Vec<ValidationError>,
}

// ==========================================
// ReferenceResolver
// ==========================================
pub struct ReferenceResolver;

impl ReferenceResolver {
    pub fn new() -> Self {
        Self
    }

    /// 就地解析一条记录的全部外键字段
    ///
    /// 必须在该记录落库之前、其父记录落库之后调用
    /// (跨类型由依赖顺序保证,同类型由 order_self_references 保证)
    pub async fn resolve_foreign_keys(
        &self,
        entity_type: EntityType,
        source_row_index: usize,
        fields: &mut Map<String, Value>,
        reference_map: &ReferenceMap,
        provider: &dyn EntityStoreProvider,
    ) -> RepositoryResult<ResolveOutcome> {
        let mut outcome = ResolveOutcome::default();

        for fk in entity_type.descriptor().foreign_keys {
            let raw = match fields.get(fk.field).and_then(Value::as_str) {
                Some(s) if !s.trim().is_empty() => s.trim().to_string(),
                // 空值: 必填缺失已由结构校验拦截,可选直接略过
                _ => continue,
            };

            // (a) 运行内映射(含本运行刚提交的记录)
            if let Some(id) = reference_map.resolve(fk.target, &raw) {
                fields.insert(fk.field.to_string(), Value::String(id.clone()));
                continue;
            }

            // (b) 存储层: 先按自然键,再按持久化 id
            let store = provider.store(fk.target);
            let persisted = match store.find_id_by_natural_key(&raw).await? {
                Some(id) => Some(id),
                None => store.get_by_id(&raw).await?.map(|_| raw.clone()),
            };
            if let Some(id) = persisted {
                fields.insert(fk.field.to_string(), Value::String(id));
                continue;
            }

            // (c) 不可达
            if fk.required {
                outcome.errors.push(ValidationError::row_error(
                    ErrorKind::ForeignKeyViolation,
                    entity_type,
                    source_row_index,
                    Some(fk.field),
                    format!("引用的 {} 不存在: {}", fk.target, raw),
                ));
            } else {
                fields.insert(fk.field.to_string(), Value::Null);
                outcome.warnings.push(ValidationError::warning(
                    ErrorKind::ForeignKeyViolation,
                    Some(entity_type),
                    Some(source_row_index),
                    Some(fk.field),
                    format!("可选引用的 {} 不存在,已置空: {}", fk.target, raw),
                ));
            }
        }

        Ok(outcome)
    }

    /// 类型内自引用二次拓扑排序
    ///
    /// 以批内记录为节点、"子行引用父行"为边,复用依赖图的环检测;
    /// 父行引用可写源 id 或自然键,指向批外记录时不构成边。
    ///
    /// # 返回
    /// - Ok(Vec<PreparedRecord>): 父行先于子行的顺序
    /// - Err(ValidationError): CIRCULAR_REFERENCE(FATAL,限于该实体类型)
    pub fn order_self_references(
        &self,
        entity_type: EntityType,
        records: Vec<PreparedRecord>,
    ) -> Result<Vec<PreparedRecord>, ValidationError> {
        let self_field = match entity_type.descriptor().self_reference {
            Some(field) => field,
            None => return Ok(records),
        };

        // 批内可被引用的键: 源 id 与自然键
        let mut key_to_index: HashMap<String, usize> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            if let Some(source_id) = record.source_id() {
                key_to_index.entry(source_id).or_insert(idx);
            }
            if let Some(key) = natural_key(entity_type, &record.fields) {
                key_to_index.entry(key).or_insert(idx);
            }
        }

        let mut edges = Vec::new();
        for (child_idx, record) in records.iter().enumerate() {
            let parent_ref = record
                .fields
                .get(self_field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty());
            if let Some(parent_key) = parent_ref {
                if let Some(&parent_idx) = key_to_index.get(parent_key) {
                    edges.push((parent_idx, child_idx));
                }
            }
        }

        match topo_sort(records.len(), &edges) {
            Ok(order) => {
                let mut slots: Vec<Option<PreparedRecord>> =
                    records.into_iter().map(Some).collect();
                Ok(order
                    .into_iter()
                    .filter_map(|idx| slots[idx].take())
                    .collect())
            }
            Err(remaining) => {
                let rows: Vec<String> = remaining
                    .iter()
                    .filter_map(|&idx| records.get(idx))
                    .map(|r| r.source_row_index.to_string())
                    .collect();
                Err(ValidationError::entity_fatal(
                    ErrorKind::CircularReference,
                    entity_type,
                    format!("批内父子引用成环,涉及行: {}", rows.join(", ")),
                ))
            }
        }
    }
}

impl Default for ReferenceResolver {
    fn default() -> Self {
        Self::new()
    }
}
