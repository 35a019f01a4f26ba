// ==========================================
// 组织架构管理系统 - 内嵌数据库 Schema
// ==========================================
// 职责: 建表 DDL 与初始化
// 对齐: db.rs CURRENT_SCHEMA_VERSION
// ==========================================

use rusqlite::Connection;

/// 初始化数据库 schema(幂等)
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS unit_type_theme (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            primary_color TEXT,
            secondary_color TEXT,
            text_color TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS unit_type (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            sort_order INTEGER,
            theme_id TEXT REFERENCES unit_type_theme(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS org_unit (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            short_name TEXT,
            aliases_json TEXT NOT NULL DEFAULT '[]',
            unit_type_id TEXT NOT NULL REFERENCES unit_type(id),
            parent_unit_id TEXT REFERENCES org_unit(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS job_title (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            abbreviation TEXT,
            sort_order INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS person (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            employee_number TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS assignment (
            id TEXT PRIMARY KEY,
            person_id TEXT NOT NULL REFERENCES person(id),
            unit_id TEXT NOT NULL REFERENCES org_unit(id),
            job_title_id TEXT NOT NULL REFERENCES job_title(id),
            percentage REAL NOT NULL DEFAULT 100,
            valid_from TEXT NOT NULL,
            valid_to TEXT,
            is_current INTEGER NOT NULL DEFAULT 1,
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- 不变式: 同一三元组至多一条当前版本
        CREATE UNIQUE INDEX IF NOT EXISTS idx_assignment_current
            ON assignment(person_id, unit_id, job_title_id)
            WHERE is_current = 1;

        CREATE INDEX IF NOT EXISTS idx_assignment_person ON assignment(person_id);
        CREATE INDEX IF NOT EXISTS idx_org_unit_parent ON org_unit(parent_unit_id);

        CREATE TABLE IF NOT EXISTS transfer_run_audit (
            run_id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            initiated_by TEXT NOT NULL,
            source TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            success INTEGER NOT NULL,
            processed_records INTEGER NOT NULL DEFAULT 0,
            result_json TEXT NOT NULL
        );

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);
        "#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='assignment'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
