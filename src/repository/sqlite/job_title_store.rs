// ==========================================
// 组织架构管理系统 - 职务 Store
// ==========================================

use crate::domain::org::JobTitle;
use crate::domain::types::EntityType;
use crate::repository::entity_store::{EntityStore, ExportFilter};
use crate::repository::error::RepositoryResult;
use crate::repository::sqlite::{lock_conn, to_field_map};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub struct JobTitleStore {
    conn: Arc<Mutex<Connection>>,
}

impl JobTitleStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<JobTitle> {
        Ok(JobTitle {
            id: row.get(0)?,
            name: row.get(1)?,
            abbreviation: row.get(2)?,
            sort_order: row.get(3)?,
            created_at: row.get::<_, DateTime<Utc>>(4)?,
            updated_at: row.get::<_, DateTime<Utc>>(5)?,
        })
    }
}

const SELECT_COLS: &str = "id, name, abbreviation, sort_order, created_at, updated_at";

#[async_trait]
impl EntityStore for JobTitleStore {
    fn entity_type(&self) -> EntityType {
        EntityType::JobTitle
    }

    async fn find_id_by_natural_key(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare("SELECT id FROM job_title WHERE name = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<Map<String, Value>>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("SELECT {} FROM job_title WHERE id = ?1", SELECT_COLS);
        match conn.query_row(&sql, params![id], Self::map_row) {
            Ok(job_title) => Ok(Some(to_field_map(&job_title)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, fields: &Map<String, Value>) -> RepositoryResult<String> {
        let job_title = JobTitle::from_fields(Uuid::new_v4().to_string(), fields)?;
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"INSERT INTO job_title (
                id, name, abbreviation, sort_order, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                job_title.id,
                job_title.name,
                job_title.abbreviation,
                job_title.sort_order,
                job_title.created_at,
                job_title.updated_at,
            ],
        )?;
        Ok(job_title.id)
    }

    async fn update(&self, id: &str, fields: &Map<String, Value>) -> RepositoryResult<()> {
        let job_title = JobTitle::from_fields(id.to_string(), fields)?;
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"UPDATE job_title
               SET abbreviation = ?2, sort_order = ?3, updated_at = ?4
               WHERE id = ?1"#,
            params![id, job_title.abbreviation, job_title.sort_order, Utc::now()],
        )?;
        Ok(())
    }

    async fn list(&self, filter: &ExportFilter) -> RepositoryResult<Vec<Map<String, Value>>> {
        let conn = lock_conn(&self.conn)?;
        let mut sql = format!("SELECT {} FROM job_title", SELECT_COLS);
        let mut bind: Vec<String> = Vec::new();
        if let Some(range) = filter.date_range {
            sql.push_str(" WHERE date(created_at) BETWEEN date(?1) AND date(?2)");
            bind.push(range.from.to_string());
            bind.push(range.to.to_string());
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
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM job_title", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
