// ==========================================
// 组织架构管理系统 - SQLite 存储实现
// ==========================================
// 职责: 六类实体 Store + 运行级事务
// 说明: 所有 Store 共享同一连接,运行级事务才能覆盖全部实体类型
// ==========================================

pub mod assignment_store;
pub mod job_title_store;
pub mod person_store;
pub mod unit_store;
pub mod unit_type_store;
pub mod unit_type_theme_store;

pub use assignment_store::AssignmentStore;
pub use job_title_store::JobTitleStore;
pub use person_store::PersonStore;
pub use unit_store::UnitStore;
pub use unit_type_store::UnitTypeStore;
pub use unit_type_theme_store::UnitTypeThemeStore;

use crate::db::open_sqlite_connection;
use crate::domain::types::EntityType;
use crate::repository::entity_store::{EntityStore, EntityStoreProvider, TransactionScope};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::schema::init_schema;
use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};

/// 锁定共享连接(锁中毒 → LockError)
pub(crate) fn lock_conn(
    conn: &Arc<Mutex<Connection>>,
) -> RepositoryResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))
}

/// 实体结构 → 字段集(serde 序列化必然产出对象)
pub(crate) fn to_field_map<T: serde::Serialize>(entity: &T) -> RepositoryResult<Map<String, Value>> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RepositoryError::InternalError(
            "实体序列化结果不是对象".to_string(),
        )),
        Err(e) => Err(RepositoryError::InternalError(e.to_string())),
    }
}

// ==========================================
// SqliteStores - Store 工厂
// ==========================================
// 每次运行持有独立实例(独立连接),运行之间无共享可变状态
pub struct SqliteStores {
    conn: Arc<Mutex<Connection>>,
    unit_type: Arc<UnitTypeStore>,
    unit_type_theme: Arc<UnitTypeThemeStore>,
    unit: Arc<UnitStore>,
    job_title: Arc<JobTitleStore>,
    person: Arc<PersonStore>,
    assignment: Arc<AssignmentStore>,
}

impl SqliteStores {
    /// 打开数据库并初始化 schema(幂等)
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// 从已配置好的连接构造(测试用)
    pub fn from_connection(conn: Connection) -> Self {
        let conn = Arc::new(Mutex::new(conn));
        Self {
            unit_type: Arc::new(UnitTypeStore::new(conn.clone())),
            unit_type_theme: Arc::new(UnitTypeThemeStore::new(conn.clone())),
            unit: Arc::new(UnitStore::new(conn.clone())),
            job_title: Arc::new(JobTitleStore::new(conn.clone())),
            person: Arc::new(PersonStore::new(conn.clone())),
            assignment: Arc::new(AssignmentStore::new(conn.clone())),
            conn,
        }
    }

    /// 共享连接句柄(审计仓储复用同一连接)
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}

#[async_trait]
impl EntityStoreProvider for SqliteStores {
    fn store(&self, entity_type: EntityType) -> Arc<dyn EntityStore> {
        match entity_type {
            EntityType::UnitType => self.unit_type.clone(),
            EntityType::UnitTypeTheme => self.unit_type_theme.clone(),
            EntityType::Unit => self.unit.clone(),
            EntityType::JobTitle => self.job_title.clone(),
            EntityType::Person => self.person.clone(),
            EntityType::Assignment => self.assignment.clone(),
        }
    }

    async fn begin_run(&self) -> RepositoryResult<Box<dyn TransactionScope>> {
        {
            let conn = lock_conn(&self.conn)?;
            conn.execute_batch("BEGIN IMMEDIATE")
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        }
        Ok(Box::new(RunTransaction {
            conn: self.conn.clone(),
            finished: false,
        }))
    }
}

// ==========================================
// RunTransaction - 运行级事务
// ==========================================
// 整个运行一个 BEGIN IMMEDIATE;
// 块/行粒度通过保存点实现部分恢复
pub struct RunTransaction {
    conn: Arc<Mutex<Connection>>,
    finished: bool,
}

impl RunTransaction {
    fn exec(&self, sql: &str) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute_batch(sql)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }
}

#[async_trait]
impl TransactionScope for RunTransaction {
    async fn savepoint(&self, name: &str) -> RepositoryResult<()> {
        self.exec(&format!("SAVEPOINT {}", name))
    }

    async fn release(&self, name: &str) -> RepositoryResult<()> {
        self.exec(&format!("RELEASE SAVEPOINT {}", name))
    }

    async fn rollback_to(&self, name: &str) -> RepositoryResult<()> {
        self.exec(&format!("ROLLBACK TO SAVEPOINT {}", name))
    }

    async fn commit(mut self: Box<Self>) -> RepositoryResult<()> {
        self.finished = true;
        self.exec("COMMIT")
    }

    async fn rollback(mut self: Box<Self>) -> RepositoryResult<()> {
        self.finished = true;
        self.exec("ROLLBACK")
    }
}

impl Drop for RunTransaction {
    fn drop(&mut self) {
        // 未显式终结的事务兜底回滚,避免连接滞留在事务态
        if !self.finished {
            if let Ok(conn) = self.conn.lock() {
                let _ = conn.execute_batch("ROLLBACK");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_stores() -> SqliteStores {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        SqliteStores::from_connection(conn)
    }

    #[tokio::test]
    async fn test_run_transaction_rollback_discards_writes() {
        let stores = open_test_stores();
        let tx = stores.begin_run().await.unwrap();

        let store = stores.store(EntityType::JobTitle);
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String("处长".to_string()));
        store.create(&fields).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        tx.rollback().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_savepoint_partial_rollback() {
        let stores = open_test_stores();
        let tx = stores.begin_run().await.unwrap();
        let store = stores.store(EntityType::JobTitle);

        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String("科长".to_string()));
        store.create(&fields).await.unwrap();

        tx.savepoint("chunk_1").await.unwrap();
        let mut fields2 = Map::new();
        fields2.insert("name".to_string(), Value::String("组长".to_string()));
        store.create(&fields2).await.unwrap();
        tx.rollback_to("chunk_1").await.unwrap();
        tx.release("chunk_1").await.unwrap();

        tx.commit().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
