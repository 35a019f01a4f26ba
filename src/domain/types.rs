// ==========================================
// 组织架构管理系统 - 领域类型定义
// ==========================================
// 职责: 导入导出引擎的封闭枚举体系
// 红线: 实体类型为封闭集合,禁止字符串散落分发
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 实体类型 (Entity Type)
// ==========================================
// 红线: 固定六类,处理顺序必须与依赖图一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    UnitType,      // 单元类型
    UnitTypeTheme, // 类型主题(配色)
    Unit,          // 组织单元
    JobTitle,      // 职务
    Person,        // 人员
    Assignment,    // 任职记录(时间版本化)
}

impl EntityType {
    /// 规范声明顺序(并列时的稳定排序依据,同时是全量处理顺序)
    pub const CANONICAL_ORDER: [EntityType; 6] = [
        EntityType::UnitType,
        EntityType::UnitTypeTheme,
        EntityType::Unit,
        EntityType::JobTitle,
        EntityType::Person,
        EntityType::Assignment,
    ];

    /// 声明顺序下标(用于确定性排序)
    pub fn ordinal(&self) -> usize {
        Self::CANONICAL_ORDER
            .iter()
            .position(|t| t == self)
            .unwrap_or(usize::MAX)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::UnitType => write!(f, "UNIT_TYPE"),
            EntityType::UnitTypeTheme => write!(f, "UNIT_TYPE_THEME"),
            EntityType::Unit => write!(f, "UNIT"),
            EntityType::JobTitle => write!(f, "JOB_TITLE"),
            EntityType::Person => write!(f, "PERSON"),
            EntityType::Assignment => write!(f, "ASSIGNMENT"),
        }
    }
}

// ==========================================
// 冲突处理策略 (Conflict Strategy)
// ==========================================
// 与导入选项 conflict_resolution 对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    Skip,          // 存在重复则跳过
    Update,        // 存在重复则覆盖非键字段
    CreateVersion, // 任职记录创建新版本,其余类型退化为 Update
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictStrategy::Skip => write!(f, "skip"),
            ConflictStrategy::Update => write!(f, "update"),
            ConflictStrategy::CreateVersion => write!(f, "create_version"),
        }
    }
}

// ==========================================
// 记录动作 (Record Action)
// ==========================================
// 冲突决策引擎输出,批量执行器据此分发持久化调用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordAction {
    Create,        // 新建
    Update,        // 覆盖已存在记录
    CreateVersion, // 关闭旧版本并创建新版本(仅任职记录)
    Skip,          // 跳过(计入 skipped)
}

impl fmt::Display for RecordAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordAction::Create => write!(f, "CREATE"),
            RecordAction::Update => write!(f, "UPDATE"),
            RecordAction::CreateVersion => write!(f, "CREATE_VERSION"),
            RecordAction::Skip => write!(f, "SKIP"),
        }
    }
}

// ==========================================
// 校验错误级别 (Severity)
// ==========================================
// FATAL 中止整个运行并回滚; ERROR 跳过该行; WARNING 仅提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Fatal,
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "FATAL"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

// ==========================================
// 校验错误类别 (Error Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    FileFormatError,       // 文件结构不可读(FATAL)
    CircularReference,     // 依赖图/批内父子引用成环(FATAL)
    MissingRequiredField,  // 必填字段缺失(ERROR,跳行)
    InvalidDataType,       // 类型转换失败(ERROR,跳行)
    ForeignKeyViolation,   // 外键不可达(ERROR,跳行)
    DuplicateRecord,       // 重复记录(信息性,由策略消解)
    BusinessRuleViolation, // 业务规则违反(默认 ERROR,存储层可升级为 FATAL)
    Cancelled,             // 运行被取消(FATAL,状态转 ROLLED_BACK)
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::FileFormatError => write!(f, "FILE_FORMAT_ERROR"),
            ErrorKind::CircularReference => write!(f, "CIRCULAR_REFERENCE"),
            ErrorKind::MissingRequiredField => write!(f, "MISSING_REQUIRED_FIELD"),
            ErrorKind::InvalidDataType => write!(f, "INVALID_DATA_TYPE"),
            ErrorKind::ForeignKeyViolation => write!(f, "FOREIGN_KEY_VIOLATION"),
            ErrorKind::DuplicateRecord => write!(f, "DUPLICATE_RECORD"),
            ErrorKind::BusinessRuleViolation => write!(f, "BUSINESS_RULE_VIOLATION"),
            ErrorKind::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

// ==========================================
// 运行类别 (Run Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunKind {
    Import,
    Export,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Import => write!(f, "IMPORT"),
            RunKind::Export => write!(f, "EXPORT"),
        }
    }
}

// ==========================================
// 运行状态机 (Run Phase)
// ==========================================
// STARTED → VALIDATING → (FAILED_VALIDATION)
//         → RESOLVING_DEPENDENCIES → (FAILED_FATAL)
//         → PROCESSING[type]* → COMPLETED | ROLLED_BACK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Started,
    Validating,
    ResolvingDependencies,
    Processing(EntityType),
    Completed,
    FailedValidation,
    FailedFatal,
    RolledBack,
}

impl RunPhase {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::Completed
                | RunPhase::FailedValidation
                | RunPhase::FailedFatal
                | RunPhase::RolledBack
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Started => write!(f, "STARTED"),
            RunPhase::Validating => write!(f, "VALIDATING"),
            RunPhase::ResolvingDependencies => write!(f, "RESOLVING_DEPENDENCIES"),
            RunPhase::Processing(entity) => write!(f, "PROCESSING[{}]", entity),
            RunPhase::Completed => write!(f, "COMPLETED"),
            RunPhase::FailedValidation => write!(f, "FAILED_VALIDATION"),
            RunPhase::FailedFatal => write!(f, "FAILED_FATAL"),
            RunPhase::RolledBack => write!(f, "ROLLED_BACK"),
        }
    }
}
