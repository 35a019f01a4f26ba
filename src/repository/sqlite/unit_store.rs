// ==========================================
// 组织架构管理系统 - 组织单元 Store
// ==========================================
// 说明: aliases 以 JSON 文本落库; parent_unit_id 自引用,
//       导入顺序由引擎的类型内拓扑排序保证
// ==========================================

use crate::domain::org::Unit;
use crate::domain::types::EntityType;
use crate::repository::entity_store::{EntityStore, ExportFilter};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sqlite::{lock_conn, to_field_map};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub struct UnitStore {
    conn: Arc<Mutex<Connection>>,
}

impl UnitStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Unit> {
        let aliases_json: String = row.get(3)?;
        Ok(Unit {
            id: row.get(0)?,
            name: row.get(1)?,
            short_name: row.get(2)?,
            aliases: serde_json::from_str(&aliases_json).unwrap_or_default(),
            unit_type_id: row.get(4)?,
            parent_unit_id: row.get(5)?,
            created_at: row.get::<_, DateTime<Utc>>(6)?,
            updated_at: row.get::<_, DateTime<Utc>>(7)?,
        })
    }

    fn aliases_json(unit: &Unit) -> RepositoryResult<String> {
        serde_json::to_string(&unit.aliases)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))
    }
}

const SELECT_COLS: &str =
    "id, name, short_name, aliases_json, unit_type_id, parent_unit_id, created_at, updated_at";

#[async_trait]
impl EntityStore for UnitStore {
    fn entity_type(&self) -> EntityType {
        EntityType::Unit
    }

    async fn find_id_by_natural_key(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare("SELECT id FROM org_unit WHERE name = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<Map<String, Value>>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("SELECT {} FROM org_unit WHERE id = ?1", SELECT_COLS);
        match conn.query_row(&sql, params![id], Self::map_row) {
            Ok(unit) => Ok(Some(to_field_map(&unit)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, fields: &Map<String, Value>) -> RepositoryResult<String> {
        let unit = Unit::from_fields(Uuid::new_v4().to_string(), fields)?;
        let aliases = Self::aliases_json(&unit)?;
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"INSERT INTO org_unit (
                id, name, short_name, aliases_json, unit_type_id, parent_unit_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                unit.id,
                unit.name,
                unit.short_name,
                aliases,
                unit.unit_type_id,
                unit.parent_unit_id,
                unit.created_at,
                unit.updated_at,
            ],
        )?;
        Ok(unit.id)
    }

    async fn update(&self, id: &str, fields: &Map<String, Value>) -> RepositoryResult<()> {
        let unit = Unit::from_fields(id.to_string(), fields)?;
        let aliases = Self::aliases_json(&unit)?;
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"UPDATE org_unit
               SET short_name = ?2, aliases_json = ?3, unit_type_id = ?4,
                   parent_unit_id = ?5, updated_at = ?6
               WHERE id = ?1"#,
            params![
                id,
                unit.short_name,
                aliases,
                unit.unit_type_id,
                unit.parent_unit_id,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    async fn list(&self, filter: &ExportFilter) -> RepositoryResult<Vec<Map<String, Value>>> {
        let conn = lock_conn(&self.conn)?;
        let mut sql = format!("SELECT {} FROM org_unit", SELECT_COLS);
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
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM org_unit", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
