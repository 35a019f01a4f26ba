// ==========================================
// 组织架构管理系统 - 任职记录 Store
// ==========================================
// 唯一支持时间版本化的实体:
// create_new_version 原子完成"关旧开新",
// 不变式由 idx_assignment_current 部分唯一索引兜底
// ==========================================

use crate::domain::org::Assignment;
use crate::domain::registry::NATURAL_KEY_SEP;
use crate::domain::types::EntityType;
use crate::repository::entity_store::{EntityStore, ExportFilter};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sqlite::{lock_conn, to_field_map};
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use rusqlite::{params, Connection, Row};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub struct AssignmentStore {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
        Ok(Assignment {
            id: row.get(0)?,
            person_id: row.get(1)?,
            unit_id: row.get(2)?,
            job_title_id: row.get(3)?,
            percentage: row.get(4)?,
            valid_from: row.get(5)?,
            valid_to: row.get(6)?,
            is_current: row.get::<_, i64>(7)? != 0,
            version: row.get(8)?,
            created_at: row.get::<_, DateTime<Utc>>(9)?,
            updated_at: row.get::<_, DateTime<Utc>>(10)?,
        })
    }

    /// 解析复合自然键(person|unit|job_title)
    fn split_key(key: &str) -> RepositoryResult<(String, String, String)> {
        let parts: Vec<&str> = key.split(NATURAL_KEY_SEP).collect();
        if parts.len() != 3 {
            return Err(RepositoryError::FieldValueError {
                field: "natural_key".to_string(),
                message: format!("任职记录自然键应为三段复合键,实际 {} 段", parts.len()),
            });
        }
        Ok((
            parts[0].to_string(),
            parts[1].to_string(),
            parts[2].to_string(),
        ))
    }

    fn check_percentage(assignment: &Assignment) -> RepositoryResult<()> {
        if !(0.0..=100.0).contains(&assignment.percentage) {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "任职比例超出范围 [0, 100]: {}",
                assignment.percentage
            )));
        }
        Ok(())
    }

    fn insert_row(conn: &Connection, assignment: &Assignment) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO assignment (
                id, person_id, unit_id, job_title_id, percentage,
                valid_from, valid_to, is_current, version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                assignment.id,
                assignment.person_id,
                assignment.unit_id,
                assignment.job_title_id,
                assignment.percentage,
                assignment.valid_from,
                assignment.valid_to,
                assignment.is_current as i64,
                assignment.version,
                assignment.created_at,
                assignment.updated_at,
            ],
        )?;
        Ok(())
    }
}

const SELECT_COLS: &str = "id, person_id, unit_id, job_title_id, percentage, \
     valid_from, valid_to, is_current, version, created_at, updated_at";

#[async_trait]
impl EntityStore for AssignmentStore {
    fn entity_type(&self) -> EntityType {
        EntityType::Assignment
    }

    async fn find_id_by_natural_key(&self, key: &str) -> RepositoryResult<Option<String>> {
        let (person_id, unit_id, job_title_id) = Self::split_key(key)?;
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(
            r#"SELECT id FROM assignment
               WHERE person_id = ?1 AND unit_id = ?2 AND job_title_id = ?3
                 AND is_current = 1"#,
        )?;
        let mut rows = stmt.query(params![person_id, unit_id, job_title_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<Map<String, Value>>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("SELECT {} FROM assignment WHERE id = ?1", SELECT_COLS);
        match conn.query_row(&sql, params![id], Self::map_row) {
            Ok(assignment) => Ok(Some(to_field_map(&assignment)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, fields: &Map<String, Value>) -> RepositoryResult<String> {
        let run_date = Local::now().date_naive();
        let assignment = Assignment::from_fields(Uuid::new_v4().to_string(), fields, run_date)?;
        Self::check_percentage(&assignment)?;
        let conn = lock_conn(&self.conn)?;
        Self::insert_row(&conn, &assignment)?;
        Ok(assignment.id)
    }

    /// 覆盖非键字段(person/unit/job_title 三元组身份保持不变)
    async fn update(&self, id: &str, fields: &Map<String, Value>) -> RepositoryResult<()> {
        let run_date = Local::now().date_naive();
        let assignment = Assignment::from_fields(id.to_string(), fields, run_date)?;
        Self::check_percentage(&assignment)?;
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"UPDATE assignment
               SET percentage = ?2, valid_from = ?3, valid_to = ?4, updated_at = ?5
               WHERE id = ?1"#,
            params![
                id,
                assignment.percentage,
                assignment.valid_from,
                assignment.valid_to,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    /// 创建新版本
    ///
    /// 原子步骤(保存点内):
    /// 1. 查同三元组的当前版本
    /// 2. 旧版本 is_current=0, valid_to=新版本生效日
    /// 3. 新行 version=旧+1, is_current=1
    async fn create_new_version(&self, fields: &Map<String, Value>) -> RepositoryResult<String> {
        let run_date = Local::now().date_naive();
        let mut assignment = Assignment::from_fields(Uuid::new_v4().to_string(), fields, run_date)?;
        Self::check_percentage(&assignment)?;

        let conn = lock_conn(&self.conn)?;
        conn.execute_batch("SAVEPOINT sp_new_version")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let result = (|| -> RepositoryResult<String> {
            let prior: Option<(String, i64)> = {
                let mut stmt = conn.prepare(
                    r#"SELECT id, version FROM assignment
                       WHERE person_id = ?1 AND unit_id = ?2 AND job_title_id = ?3
                         AND is_current = 1"#,
                )?;
                let mut rows = stmt.query(params![
                    assignment.person_id,
                    assignment.unit_id,
                    assignment.job_title_id
                ])?;
                match rows.next()? {
                    Some(row) => Some((row.get(0)?, row.get(1)?)),
                    None => None,
                }
            };

            if let Some((prior_id, prior_version)) = prior {
                conn.execute(
                    r#"UPDATE assignment
                       SET is_current = 0, valid_to = ?2, updated_at = ?3
                       WHERE id = ?1"#,
                    params![prior_id, assignment.valid_from, Utc::now()],
                )?;
                assignment.version = prior_version + 1;
            } else {
                assignment.version = 1;
            }
            assignment.is_current = true;
            assignment.valid_to = None;

            Self::insert_row(&conn, &assignment)?;
            Ok(assignment.id.clone())
        })();

        match &result {
            Ok(_) => conn
                .execute_batch("RELEASE SAVEPOINT sp_new_version")
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?,
            Err(_) => {
                let _ = conn.execute_batch(
                    "ROLLBACK TO SAVEPOINT sp_new_version; RELEASE SAVEPOINT sp_new_version",
                );
            }
        }
        result
    }

    async fn list(&self, filter: &ExportFilter) -> RepositoryResult<Vec<Map<String, Value>>> {
        let conn = lock_conn(&self.conn)?;
        let mut sql = format!("SELECT {} FROM assignment", SELECT_COLS);
        let mut clauses: Vec<String> = Vec::new();
        let mut bind: Vec<String> = Vec::new();

        if !filter.include_historical {
            clauses.push("is_current = 1".to_string());
        }
        if let Some(range) = filter.date_range {
            bind.push(range.from.to_string());
            bind.push(range.to.to_string());
            clauses.push(format!(
                "date(created_at) BETWEEN date(?{}) AND date(?{})",
                bind.len() - 1,
                bind.len()
            ));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at, id");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(bind), Self::map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(to_field_map(&row?)?);
        }
        Ok(out)
    }

    async fn count(&self) -> RepositoryResult<usize> {
        let conn = lock_conn(&self.conn)?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM assignment", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::schema::init_schema;
    use serde_json::json;

    fn store_with_refs() -> (AssignmentStore, String, String, String) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();

        let now = Utc::now();
        conn.execute(
            "INSERT INTO person (id, first_name, last_name, email, created_at, updated_at)
             VALUES ('p1', '华', '李', 'li.hua@example.com', ?1, ?1)",
            params![now],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO unit_type (id, name, created_at, updated_at)
             VALUES ('ut1', '行政机构', ?1, ?1)",
            params![now],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO org_unit (id, name, unit_type_id, created_at, updated_at)
             VALUES ('u1', '人事处', 'ut1', ?1, ?1)",
            params![now],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO job_title (id, name, created_at, updated_at)
             VALUES ('j1', '处长', ?1, ?1)",
            params![now],
        )
        .unwrap();

        (
            AssignmentStore::new(Arc::new(Mutex::new(conn))),
            "p1".to_string(),
            "u1".to_string(),
            "j1".to_string(),
        )
    }

    fn fields(person: &str, unit: &str, job: &str, percentage: f64) -> Map<String, Value> {
        match json!({
            "person_id": person,
            "unit_id": unit,
            "job_title_id": job,
            "percentage": percentage,
            "valid_from": "2026-01-01"
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_create_new_version_closes_prior() {
        let (store, p, u, j) = store_with_refs();

        let first = store.create(&fields(&p, &u, &j, 100.0)).await.unwrap();
        let second = store
            .create_new_version(&fields(&p, &u, &j, 60.0))
            .await
            .unwrap();
        assert_ne!(first, second);

        let old = store.get_by_id(&first).await.unwrap().unwrap();
        assert_eq!(old.get("is_current"), Some(&Value::Bool(false)));
        assert!(old.get("valid_to").map(|v| !v.is_null()).unwrap_or(false));

        let new = store.get_by_id(&second).await.unwrap().unwrap();
        assert_eq!(new.get("is_current"), Some(&Value::Bool(true)));
        assert_eq!(new.get("version"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_percentage_business_rule() {
        let (store, p, u, j) = store_with_refs();
        let err = store.create(&fields(&p, &u, &j, 150.0)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::BusinessRuleViolation(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_natural_key_matches_current_only() {
        let (store, p, u, j) = store_with_refs();
        store.create(&fields(&p, &u, &j, 100.0)).await.unwrap();
        let new_id = store
            .create_new_version(&fields(&p, &u, &j, 50.0))
            .await
            .unwrap();

        let key = format!("{p}{sep}{u}{sep}{j}", sep = NATURAL_KEY_SEP);
        let found = store.find_id_by_natural_key(&key).await.unwrap();
        assert_eq!(found, Some(new_id));
    }

    #[tokio::test]
    async fn test_historical_filter_on_list() {
        let (store, p, u, j) = store_with_refs();
        store.create(&fields(&p, &u, &j, 100.0)).await.unwrap();
        store
            .create_new_version(&fields(&p, &u, &j, 50.0))
            .await
            .unwrap();

        let current_only = store.list(&ExportFilter::default()).await.unwrap();
        assert_eq!(current_only.len(), 1);

        let all = store
            .list(&ExportFilter {
                include_historical: true,
                date_range: None,
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
