// ==========================================
// 组织架构管理系统 - 引擎层错误类型
// ==========================================
// 说明: 业务性失败(FATAL 校验/回滚)以 ImportResult/ExportResult
//       形式返回调用方; EngineError 只承载基础设施层面的失败
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("仓储错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
