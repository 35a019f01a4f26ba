// ==========================================
// 组织架构管理系统 - 运行审计仓储
// ==========================================
// 职责: 导入导出运行的留痕与追溯查询
// 红线: 审计写入发生在运行事务终结(提交/回滚)之后,
//       回滚不得吞掉审计记录
// ==========================================

use crate::domain::transfer::RunAudit;
use crate::domain::types::RunKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sqlite::lock_conn;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// RunAuditStore Trait
// ==========================================
#[async_trait]
pub trait RunAuditStore: Send + Sync {
    /// 写入一条运行审计记录
    async fn record(&self, audit: &RunAudit) -> RepositoryResult<()>;

    /// 查询最近的运行(按结束时间倒序)
    async fn recent(&self, limit: usize) -> RepositoryResult<Vec<RunAudit>>;

    /// 按 run_id 取审计记录
    async fn get(&self, run_id: &str) -> RepositoryResult<Option<RunAudit>>;
}

// ==========================================
// SqliteRunAuditStore
// ==========================================
pub struct SqliteRunAuditStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRunAuditStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RunAudit> {
        let kind: String = row.get(1)?;
        Ok(RunAudit {
            run_id: row.get(0)?,
            kind: if kind == "EXPORT" {
                RunKind::Export
            } else {
                RunKind::Import
            },
            initiated_by: row.get(2)?,
            source: row.get(3)?,
            started_at: row.get::<_, DateTime<Utc>>(4)?,
            finished_at: row.get::<_, DateTime<Utc>>(5)?,
            success: row.get::<_, i64>(6)? != 0,
            processed_records: row.get(7)?,
            result_json: row.get(8)?,
        })
    }
}

const SELECT_COLS: &str = "run_id, kind, initiated_by, source, started_at, finished_at, \
     success, processed_records, result_json";

#[async_trait]
impl RunAuditStore for SqliteRunAuditStore {
    async fn record(&self, audit: &RunAudit) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"INSERT INTO transfer_run_audit (
                run_id, kind, initiated_by, source, started_at, finished_at,
                success, processed_records, result_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                audit.run_id,
                audit.kind.to_string(),
                audit.initiated_by,
                audit.source,
                audit.started_at,
                audit.finished_at,
                audit.success as i64,
                audit.processed_records,
                audit.result_json,
            ],
        )
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> RepositoryResult<Vec<RunAudit>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!(
            "SELECT {} FROM transfer_run_audit ORDER BY finished_at DESC LIMIT ?1",
            SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], Self::map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn get(&self, run_id: &str) -> RepositoryResult<Option<RunAudit>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!(
            "SELECT {} FROM transfer_run_audit WHERE run_id = ?1",
            SELECT_COLS
        );
        match conn.query_row(&sql, params![run_id], Self::map_row) {
            Ok(audit) => Ok(Some(audit)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::schema::init_schema;

    #[tokio::test]
    async fn test_record_and_recent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let store = SqliteRunAuditStore::new(Arc::new(Mutex::new(conn)));

        let audit = RunAudit {
            run_id: "run-1".to_string(),
            kind: RunKind::Import,
            initiated_by: "system".to_string(),
            source: "/tmp/import.json".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            success: false,
            processed_records: 42,
            result_json: "{}".to_string(),
        };
        store.record(&audit).await.unwrap();

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].run_id, "run-1");
        assert!(!recent[0].success);

        let fetched = store.get("run-1").await.unwrap().unwrap();
        assert_eq!(fetched.processed_records, 42);
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
