// ==========================================
// 组织架构管理系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 组织单元/职务/人员/任职记录的管理工具,
//           核心为批量数据导入导出引擎
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 导入导出核心
pub mod engine;

// 导入层 - 外部文件格式
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施(连接初始化/PRAGMA 统一)
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ConflictStrategy, EntityType, ErrorKind, RecordAction, RunKind, RunPhase, Severity,
};

// 领域实体
pub use domain::{
    Assignment, JobTitle, Person, Unit, UnitType, UnitTypeTheme,
};

// 导入导出模型
pub use domain::{
    ExportOptions, ExportResult, ImportOptions, ImportResult, RunAudit, RunProgress,
    ValidationError,
};

// 引擎
pub use engine::{
    BatchExecutor, ConflictResolver, DependencyGraphResolver, ReferenceMap, ReferenceResolver,
    RunControl, TransferOrchestrator,
};

// API
pub use api::{RunOutcome, TransferApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "组织架构管理系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
