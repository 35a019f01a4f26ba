// ==========================================
// 组织架构管理系统 - 导入导出领域模型
// ==========================================
// 职责: 导入导出管道的中间产物与结果模型
// 生命周期: ImportRecord/ResolvedRecord/BatchResult 仅存活于单次运行;
//           ImportResult/ExportResult/RunAudit 作为审计产物保留
// ==========================================

use crate::domain::types::{
    ConflictStrategy, EntityType, ErrorKind, RecordAction, RunKind, Severity,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ==========================================
// ImportRecord - 原始导入记录
// ==========================================
// 格式处理器输出,解析完成后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub entity_type: EntityType,
    pub source_row_index: usize,          // 源文件行号(1 起,CSV 含表头偏移)
    pub raw_fields: Map<String, Value>,   // 字段名 → 原始值
}

// ==========================================
// ResolvedRecord - 已解析记录
// ==========================================
// 外键已替换为持久化 id,并带冲突决策动作
#[derive(Debug, Clone)]
pub struct ResolvedRecord {
    pub entity_type: EntityType,
    pub source_row_index: usize,
    pub source_id: Option<String>,      // 源文件 id 列(仅作引用登记)
    pub fields: Map<String, Value>,     // 类型化 + 外键已解析的字段集
    pub action: RecordAction,
    pub existing_id: Option<String>,    // 重复检测命中的已持久化 id
    pub natural_key: Option<String>,    // 提取到的自然键
}

// ==========================================
// ValidationError - 校验错误
// ==========================================
// 携带行号/实体/字段,供调用方逐行诊断
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub entity_type: Option<EntityType>,
    pub source_row_index: Option<usize>,
    pub field: Option<String>,
    pub message: String,
}

impl ValidationError {
    /// 运行级 FATAL 错误(中止并回滚)
    pub fn fatal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Fatal,
            entity_type: None,
            source_row_index: None,
            field: None,
            message: message.into(),
        }
    }

    /// 行级 ERROR(跳过该行,运行继续)
    pub fn row_error(
        kind: ErrorKind,
        entity_type: EntityType,
        source_row_index: usize,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            entity_type: Some(entity_type),
            source_row_index: Some(source_row_index),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    /// WARNING(不影响行处理)
    pub fn warning(
        kind: ErrorKind,
        entity_type: Option<EntityType>,
        source_row_index: Option<usize>,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            entity_type,
            source_row_index,
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    /// 指定实体的 FATAL(如类型内循环引用)
    pub fn entity_fatal(
        kind: ErrorKind,
        entity_type: EntityType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity: Severity::Fatal,
            entity_type: Some(entity_type),
            source_row_index: None,
            field: None,
            message: message.into(),
        }
    }
}

// ==========================================
// EntityCounts - 单实体类型计数
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityCounts {
    pub entity_type: Option<EntityType>,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

// ==========================================
// BatchResult - 单实体类型批处理结果
// ==========================================
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub entity_type: EntityType,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<ValidationError>,
}

impl BatchResult {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            processed: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            errors: Vec::new(),
        }
    }
}

// ==========================================
// ImportResult - 导入运行结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub run_id: String,
    pub success: bool,
    pub validate_only: bool,
    pub counts: Vec<EntityCounts>,          // 规范顺序,仅含实际处理的类型
    pub errors: Vec<ValidationError>,       // FATAL + ERROR
    pub warnings: Vec<ValidationError>,
    pub execution_time_ms: i64,
}

impl ImportResult {
    /// 按实体类型取计数(测试与调用方便捷口)
    pub fn counts_for(&self, entity_type: EntityType) -> EntityCounts {
        self.counts
            .iter()
            .find(|c| c.entity_type == Some(entity_type))
            .cloned()
            .unwrap_or_default()
    }

    /// 是否存在 FATAL 错误
    pub fn has_fatal(&self) -> bool {
        self.errors.iter().any(|e| e.severity == Severity::Fatal)
    }
}

// ==========================================
// ExportResult - 导出运行结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    pub run_id: String,
    pub success: bool,
    pub counts: Vec<EntityCounts>,   // processed = 导出记录数
    pub total_records: usize,
    pub files: Vec<String>,          // 写出的文件(CSV 每类型一个,JSON 单文件)
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
    pub execution_time_ms: i64,
}

impl ExportResult {
    pub fn counts_for(&self, entity_type: EntityType) -> EntityCounts {
        self.counts
            .iter()
            .find(|c| c.entity_type == Some(entity_type))
            .cloned()
            .unwrap_or_default()
    }
}

// ==========================================
// 导入/导出选项
// ==========================================

/// 导入选项
///
/// entity_types 为 None 时处理全部六类
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOptions {
    pub entity_types: Option<Vec<EntityType>>,
    pub conflict_resolution: ConflictStrategy,
    pub validate_only: bool,
    pub batch_size: Option<usize>, // None → 取配置缺省(100)
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            entity_types: None,
            conflict_resolution: ConflictStrategy::Skip,
            validate_only: false,
            batch_size: None,
        }
    }
}

/// 日期范围(闭区间)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// 格式细节选项
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FormatOptions {
    pub pretty: bool, // JSON 缩进输出
}

/// 导出选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    pub entity_types: Option<Vec<EntityType>>,
    pub include_historical: bool, // 含任职历史版本
    pub date_range: Option<DateRange>,
    pub format_options: FormatOptions,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            entity_types: None,
            include_historical: false,
            date_range: None,
            format_options: FormatOptions::default(),
        }
    }
}

// ==========================================
// RunAudit - 运行审计记录
// ==========================================
// 每次运行(成功或失败)必须留痕,事务回滚不影响审计写入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAudit {
    pub run_id: String,
    pub kind: RunKind,
    pub initiated_by: String,
    pub source: String,                    // 文件/目录标识
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub processed_records: i64,
    pub result_json: String,               // 完整 ImportResult/ExportResult
}

// ==========================================
// RunProgress - 进度快照
// ==========================================
// 轮询接口返回,不打断运行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    pub run_id: String,
    pub kind: RunKind,
    pub phase: String,       // RunPhase 的展示形式
    pub processed: usize,
    pub total: usize,
    pub cancelled: bool,
    pub finished: bool,
}
