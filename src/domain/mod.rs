// ==========================================
// 组织架构管理系统 - 领域层
// ==========================================
// 职责: 实体模型 / 封闭类型体系 / 导入导出模型
// ==========================================

pub mod org;
pub mod registry;
pub mod transfer;
pub mod types;

// 重导出领域实体
pub use org::{Assignment, FieldConvertError, JobTitle, Person, Unit, UnitType, UnitTypeTheme};

// 重导出导入导出模型
pub use transfer::{
    BatchResult, DateRange, EntityCounts, ExportOptions, ExportResult, FormatOptions,
    ImportOptions, ImportRecord, ImportResult, ResolvedRecord, RunAudit, RunProgress,
    ValidationError,
};

// 重导出类型体系
pub use registry::{natural_key, EntityDescriptor, ForeignKeyField};
pub use types::{
    ConflictStrategy, EntityType, ErrorKind, RecordAction, RunKind, RunPhase, Severity,
};
