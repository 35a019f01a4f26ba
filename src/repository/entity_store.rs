// ==========================================
// 组织架构管理系统 - 实体存储 Trait
// ==========================================
// 职责: 定义导入导出引擎所需的数据访问接口(不含业务逻辑)
// 红线: Store 不含冲突策略,只做 CRUD + 存在性检查
// ==========================================

use crate::domain::transfer::DateRange;
use crate::domain::types::EntityType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// 导出查询过滤条件
///
/// date_range 按记录创建时间过滤;
/// include_historical 仅对任职记录有意义(false → 只取当前版本)
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportFilter {
    pub include_historical: bool,
    pub date_range: Option<DateRange>,
}

// ==========================================
// EntityStore Trait
// ==========================================
// 用途: 单实体类型的数据访问,每类型一个实现
// 实现者: repository::sqlite 下的六个 Store
//
// 记录以解析后的字段集(serde_json Map)出入,
// 类型化转换在实现内部完成。
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// 本 Store 负责的实体类型
    fn entity_type(&self) -> EntityType;

    /// 按自然键检查记录是否存在
    async fn exists(&self, key: &str) -> RepositoryResult<bool> {
        Ok(self.find_id_by_natural_key(key).await?.is_some())
    }

    /// 按自然键查持久化 id
    ///
    /// # 参数
    /// - key: registry::natural_key 的输出
    ///   (任职记录为 person|unit|job_title 复合键,只比对当前版本)
    async fn find_id_by_natural_key(&self, key: &str) -> RepositoryResult<Option<String>>;

    /// 按持久化 id 取记录(字段集形式)
    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<Map<String, Value>>>;

    /// 新建记录
    ///
    /// # 返回
    /// - Ok(String): 新分配的持久化 id(UUID)
    async fn create(&self, fields: &Map<String, Value>) -> RepositoryResult<String>;

    /// 覆盖已存在记录的非键字段
    async fn update(&self, id: &str, fields: &Map<String, Value>) -> RepositoryResult<()>;

    /// 创建新版本(仅任职记录)
    ///
    /// 原子完成: 旧当前版本 is_current=0 且关闭有效期,
    /// 新行 version = 旧 version + 1 且 is_current=1。
    ///
    /// # 返回
    /// - Ok(String): 新版本的持久化 id
    /// - Err(VersioningUnsupported): 非版本化实体(缺省实现)
    async fn create_new_version(&self, _fields: &Map<String, Value>) -> RepositoryResult<String> {
        Err(RepositoryError::VersioningUnsupported(
            self.entity_type().to_string(),
        ))
    }

    /// 按过滤条件列出记录(创建时间升序),用于导出
    async fn list(&self, filter: &ExportFilter) -> RepositoryResult<Vec<Map<String, Value>>>;

    /// 记录总数
    async fn count(&self) -> RepositoryResult<usize>;
}

// ==========================================
// EntityStoreProvider Trait
// ==========================================
// 用途: 按实体类型取 Store + 运行级事务控制
#[async_trait]
pub trait EntityStoreProvider: Send + Sync {
    /// 取指定实体类型的 Store
    fn store(&self, entity_type: EntityType) -> Arc<dyn EntityStore>;

    /// 开启运行级事务(整个运行一个事务边界)
    async fn begin_run(&self) -> RepositoryResult<Box<dyn TransactionScope>>;
}

// ==========================================
// TransactionScope Trait
// ==========================================
// 用途: 运行级事务 + 块/行保存点
// 语义: 运行是唯一的提交单元; 块是取消检查边界;
//       行保存点让单条持久化失败可恢复
#[async_trait]
pub trait TransactionScope: Send + Sync {
    /// 建立保存点
    async fn savepoint(&self, name: &str) -> RepositoryResult<()>;

    /// 释放保存点(保留其中的写入)
    async fn release(&self, name: &str) -> RepositoryResult<()>;

    /// 回滚到保存点(撤销其中的写入,保存点保留)
    async fn rollback_to(&self, name: &str) -> RepositoryResult<()>;

    /// 提交整个运行
    async fn commit(self: Box<Self>) -> RepositoryResult<()>;

    /// 回滚整个运行(撤销所有实体类型的全部写入)
    async fn rollback(self: Box<Self>) -> RepositoryResult<()>;
}
