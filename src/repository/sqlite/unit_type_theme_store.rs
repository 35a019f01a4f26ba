// ==========================================
// 组织架构管理系统 - 类型主题 Store
// ==========================================

use crate::domain::org::UnitTypeTheme;
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

pub struct UnitTypeThemeStore {
    conn: Arc<Mutex<Connection>>,
}

impl UnitTypeThemeStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<UnitTypeTheme> {
        Ok(UnitTypeTheme {
            id: row.get(0)?,
            name: row.get(1)?,
            primary_color: row.get(2)?,
            secondary_color: row.get(3)?,
            text_color: row.get(4)?,
            created_at: row.get::<_, DateTime<Utc>>(5)?,
            updated_at: row.get::<_, DateTime<Utc>>(6)?,
        })
    }
}

const SELECT_COLS: &str =
    "id, name, primary_color, secondary_color, text_color, created_at, updated_at";

#[async_trait]
impl EntityStore for UnitTypeThemeStore {
    fn entity_type(&self) -> EntityType {
        EntityType::UnitTypeTheme
    }

    async fn find_id_by_natural_key(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare("SELECT id FROM unit_type_theme WHERE name = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<Map<String, Value>>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("SELECT {} FROM unit_type_theme WHERE id = ?1", SELECT_COLS);
        match conn.query_row(&sql, params![id], Self::map_row) {
            Ok(theme) => Ok(Some(to_field_map(&theme)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, fields: &Map<String, Value>) -> RepositoryResult<String> {
        let theme = UnitTypeTheme::from_fields(Uuid::new_v4().to_string(), fields)?;
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"INSERT INTO unit_type_theme (
                id, name, primary_color, secondary_color, text_color, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                theme.id,
                theme.name,
                theme.primary_color,
                theme.secondary_color,
                theme.text_color,
                theme.created_at,
                theme.updated_at,
            ],
        )?;
        Ok(theme.id)
    }

    async fn update(&self, id: &str, fields: &Map<String, Value>) -> RepositoryResult<()> {
        let theme = UnitTypeTheme::from_fields(id.to_string(), fields)?;
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"UPDATE unit_type_theme
               SET primary_color = ?2, secondary_color = ?3, text_color = ?4, updated_at = ?5
               WHERE id = ?1"#,
            params![
                id,
                theme.primary_color,
                theme.secondary_color,
                theme.text_color,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    async fn list(&self, filter: &ExportFilter) -> RepositoryResult<Vec<Map<String, Value>>> {
        let conn = lock_conn(&self.conn)?;
        let mut sql = format!("SELECT {} FROM unit_type_theme", SELECT_COLS);
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
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM unit_type_theme", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
