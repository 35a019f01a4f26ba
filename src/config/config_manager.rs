// ==========================================
// 组织架构管理系统 - 配置管理器
// ==========================================
// 职责: 从 config_kv 表读取配置,缺失/非法值回落默认
// ==========================================

use crate::config::exchange_config_trait::ExchangeConfigReader;
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sqlite::lock_conn;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// 缺省批量块大小
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// 缺省文件大小上限(MB)
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;
/// 缺省并发运行上限
pub const DEFAULT_MAX_CONCURRENT_RUNS: usize = 3;

pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 打开独立连接的配置管理器
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 复用既有连接(与运行共享连接时使用)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 读取原始配置值
    fn get_raw(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = lock_conn(&self.conn)?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置值(管理/测试用)
    pub fn set(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"INSERT INTO config_kv (key, value, updated_at)
               VALUES (?1, ?2, datetime('now'))
               ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                              updated_at = excluded.updated_at"#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 解析数值配置,缺失或非法回落默认
    fn parse_or_default<T: std::str::FromStr>(&self, key: &str, default: T) -> anyhow::Result<T> {
        match self.get_raw(key)? {
            None => Ok(default),
            Some(raw) => match raw.parse::<T>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    warn!(key = key, value = %raw, "配置值非法,回落默认值");
                    Ok(default)
                }
            },
        }
    }
}

#[async_trait]
impl ExchangeConfigReader for ConfigManager {
    async fn get_default_batch_size(&self) -> anyhow::Result<usize> {
        self.parse_or_default("transfer.batch_size", DEFAULT_BATCH_SIZE)
    }

    async fn get_max_file_size_mb(&self) -> anyhow::Result<u64> {
        self.parse_or_default("transfer.max_file_size_mb", DEFAULT_MAX_FILE_SIZE_MB)
    }

    async fn get_max_concurrent_runs(&self) -> anyhow::Result<usize> {
        self.parse_or_default("transfer.max_concurrent_runs", DEFAULT_MAX_CONCURRENT_RUNS)
    }
}
