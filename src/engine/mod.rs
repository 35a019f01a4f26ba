// ==========================================
// 组织架构管理系统 - 引擎层
// ==========================================
// 职责: 导入导出核心引擎(依赖图/引用解析/冲突决策/批量事务/编排)
// 红线: Engine 不拼 SQL,数据访问一律经由 EntityStore
// ==========================================

pub mod batch_executor;
pub mod conflict_resolver;
pub mod dependency_graph;
pub mod error;
pub mod orchestrator;
pub mod reference_resolver;
pub mod run_control;

// 重导出核心引擎
pub use batch_executor::{BatchExecutor, BatchOutcome, ExecuteParams};
pub use conflict_resolver::{ConflictDecision, ConflictResolver};
pub use dependency_graph::{topo_sort, DependencyGraphResolver, DependencyResolution};
pub use error::{EngineError, EngineResult};
pub use orchestrator::TransferOrchestrator;
pub use reference_resolver::{PreparedRecord, ReferenceMap, ReferenceResolver, ResolveOutcome};
pub use run_control::RunControl;
