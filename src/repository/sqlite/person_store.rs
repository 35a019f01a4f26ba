// ==========================================
// 组织架构管理系统 - 人员 Store
// ==========================================
// 说明: 自然键为邮箱,查询与落库均小写归一
// ==========================================

use crate::domain::org::Person;
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

pub struct PersonStore {
    conn: Arc<Mutex<Connection>>,
}

impl PersonStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Person> {
        Ok(Person {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            employee_number: row.get(5)?,
            created_at: row.get::<_, DateTime<Utc>>(6)?,
            updated_at: row.get::<_, DateTime<Utc>>(7)?,
        })
    }
}

const SELECT_COLS: &str =
    "id, first_name, last_name, email, phone, employee_number, created_at, updated_at";

#[async_trait]
impl EntityStore for PersonStore {
    fn entity_type(&self) -> EntityType {
        EntityType::Person
    }

    async fn find_id_by_natural_key(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare("SELECT id FROM person WHERE email = ?1")?;
        let mut rows = stmt.query(params![key.to_lowercase()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<Map<String, Value>>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("SELECT {} FROM person WHERE id = ?1", SELECT_COLS);
        match conn.query_row(&sql, params![id], Self::map_row) {
            Ok(person) => Ok(Some(to_field_map(&person)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, fields: &Map<String, Value>) -> RepositoryResult<String> {
        let person = Person::from_fields(Uuid::new_v4().to_string(), fields)?;
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"INSERT INTO person (
                id, first_name, last_name, email, phone, employee_number,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                person.id,
                person.first_name,
                person.last_name,
                person.email,
                person.phone,
                person.employee_number,
                person.created_at,
                person.updated_at,
            ],
        )?;
        Ok(person.id)
    }

    async fn update(&self, id: &str, fields: &Map<String, Value>) -> RepositoryResult<()> {
        let person = Person::from_fields(id.to_string(), fields)?;
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"UPDATE person
               SET first_name = ?2, last_name = ?3, phone = ?4,
                   employee_number = ?5, updated_at = ?6
               WHERE id = ?1"#,
            params![
                id,
                person.first_name,
                person.last_name,
                person.phone,
                person.employee_number,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    async fn list(&self, filter: &ExportFilter) -> RepositoryResult<Vec<Map<String, Value>>> {
        let conn = lock_conn(&self.conn)?;
        let mut sql = format!("SELECT {} FROM person", SELECT_COLS);
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
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM person", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
