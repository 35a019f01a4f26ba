// ==========================================
// 组织架构管理系统 - 组织领域模型
// ==========================================
// 职责: 六类组织实体的类型化结构
// 用途: 存储层行映射 + 导出序列化
// 红线: 持久化 id 一律为 UUID 字符串,源文件 id 只作引用解析
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ==========================================
// 字段转换错误
// ==========================================
// 解析后的字段集 → 类型化实体失败时抛出,
// 由存储层映射为 FieldValueError
#[derive(Debug, Clone)]
pub struct FieldConvertError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "字段 {} 转换失败: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldConvertError {}

// ===== 字段访问辅助 =====

fn opt_text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn req_text(fields: &Map<String, Value>, key: &str) -> Result<String, FieldConvertError> {
    opt_text(fields, key).ok_or_else(|| FieldConvertError {
        field: key.to_string(),
        message: "必填字段为空".to_string(),
    })
}

fn opt_i64(fields: &Map<String, Value>, key: &str) -> Result<Option<i64>, FieldConvertError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_i64()),
        Some(other) => Err(FieldConvertError {
            field: key.to_string(),
            message: format!("期望整数,实际 {}", other),
        }),
    }
}

fn opt_f64(fields: &Map<String, Value>, key: &str) -> Result<Option<f64>, FieldConvertError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(FieldConvertError {
            field: key.to_string(),
            message: format!("期望数值,实际 {}", other),
        }),
    }
}

fn opt_bool(fields: &Map<String, Value>, key: &str) -> Result<Option<bool>, FieldConvertError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(FieldConvertError {
            field: key.to_string(),
            message: format!("期望布尔,实际 {}", other),
        }),
    }
}

fn opt_date(fields: &Map<String, Value>, key: &str) -> Result<Option<NaiveDate>, FieldConvertError> {
    match opt_text(fields, key) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| FieldConvertError {
                field: key.to_string(),
                message: format!("期望 YYYY-MM-DD,实际 {}", raw),
            }),
    }
}

fn string_array(fields: &Map<String, Value>, key: &str) -> Result<Vec<String>, FieldConvertError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(|s| s.to_string()).ok_or_else(|| FieldConvertError {
                    field: key.to_string(),
                    message: "数组元素必须为字符串".to_string(),
                })
            })
            .collect(),
        Some(other) => Err(FieldConvertError {
            field: key.to_string(),
            message: format!("期望字符串数组,实际 {}", other),
        }),
    }
}

// ==========================================
// UnitTypeTheme - 类型主题
// ==========================================
// 单元类型的展示配色,仅被 unit_type.theme_id 可选引用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitTypeTheme {
    pub id: String,                     // 主题 ID(UUID)
    pub name: String,                   // 主题名称(自然键)
    pub primary_color: Option<String>,  // 主色
    pub secondary_color: Option<String>, // 辅色
    pub text_color: Option<String>,     // 文字色
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UnitTypeTheme {
    pub fn from_fields(id: String, fields: &Map<String, Value>) -> Result<Self, FieldConvertError> {
        let now = Utc::now();
        Ok(Self {
            id,
            name: req_text(fields, "name")?,
            primary_color: opt_text(fields, "primary_color"),
            secondary_color: opt_text(fields, "secondary_color"),
            text_color: opt_text(fields, "text_color"),
            created_at: now,
            updated_at: now,
        })
    }
}

// ==========================================
// UnitType - 单元类型
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitType {
    pub id: String,                  // 类型 ID(UUID)
    pub name: String,                // 类型名称(自然键)
    pub description: Option<String>, // 描述
    pub sort_order: Option<i64>,     // 展示排序
    pub theme_id: Option<String>,    // 可选主题引用(已解析为持久化 id)
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UnitType {
    pub fn from_fields(id: String, fields: &Map<String, Value>) -> Result<Self, FieldConvertError> {
        let now = Utc::now();
        Ok(Self {
            id,
            name: req_text(fields, "name")?,
            description: opt_text(fields, "description"),
            sort_order: opt_i64(fields, "sort_order")?,
            theme_id: opt_text(fields, "theme_id"),
            created_at: now,
            updated_at: now,
        })
    }
}

// ==========================================
// Unit - 组织单元
// ==========================================
// parent_unit_id 自引用,导入时需要类型内拓扑排序
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,                     // 单元 ID(UUID)
    pub name: String,                   // 单元名称(自然键)
    pub short_name: Option<String>,     // 简称
    pub aliases: Vec<String>,           // 别名(CSV 中为内嵌 JSON 文本)
    pub unit_type_id: String,           // 单元类型(必填外键,已解析)
    pub parent_unit_id: Option<String>, // 上级单元(可选自引用,已解析)
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Unit {
    pub fn from_fields(id: String, fields: &Map<String, Value>) -> Result<Self, FieldConvertError> {
        let now = Utc::now();
        Ok(Self {
            id,
            name: req_text(fields, "name")?,
            short_name: opt_text(fields, "short_name"),
            aliases: string_array(fields, "aliases")?,
            unit_type_id: req_text(fields, "unit_type_id")?,
            parent_unit_id: opt_text(fields, "parent_unit_id"),
            created_at: now,
            updated_at: now,
        })
    }
}

// ==========================================
// JobTitle - 职务
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTitle {
    pub id: String,                   // 职务 ID(UUID)
    pub name: String,                 // 职务名称(自然键)
    pub abbreviation: Option<String>, // 缩写
    pub sort_order: Option<i64>,      // 展示排序
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobTitle {
    pub fn from_fields(id: String, fields: &Map<String, Value>) -> Result<Self, FieldConvertError> {
        let now = Utc::now();
        Ok(Self {
            id,
            name: req_text(fields, "name")?,
            abbreviation: opt_text(fields, "abbreviation"),
            sort_order: opt_i64(fields, "sort_order")?,
            created_at: now,
            updated_at: now,
        })
    }
}

// ==========================================
// Person - 人员
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,                      // 人员 ID(UUID)
    pub first_name: String,              // 名
    pub last_name: String,               // 姓
    pub email: String,                   // 邮箱(自然键,小写归一)
    pub phone: Option<String>,           // 电话
    pub employee_number: Option<String>, // 工号
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    pub fn from_fields(id: String, fields: &Map<String, Value>) -> Result<Self, FieldConvertError> {
        let now = Utc::now();
        Ok(Self {
            id,
            first_name: req_text(fields, "first_name")?,
            last_name: req_text(fields, "last_name")?,
            email: req_text(fields, "email")?.to_lowercase(),
            phone: opt_text(fields, "phone"),
            employee_number: opt_text(fields, "employee_number"),
            created_at: now,
            updated_at: now,
        })
    }
}

// ==========================================
// Assignment - 任职记录
// ==========================================
// 不变式: 同一 (person, unit, job_title) 任意时刻至多一条当前版本;
//         新版本落库时旧版本 is_current=0 且关闭有效期
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,                  // 记录 ID(UUID)
    pub person_id: String,           // 人员(必填外键,已解析)
    pub unit_id: String,             // 组织单元(必填外键,已解析)
    pub job_title_id: String,        // 职务(必填外键,已解析)
    pub percentage: f64,             // 任职比例(0-100,缺省 100)
    pub valid_from: NaiveDate,       // 生效日期
    pub valid_to: Option<NaiveDate>, // 失效日期(当前版本为 NULL)
    pub is_current: bool,            // 是否当前版本
    pub version: i64,                // 版本号(从 1 递增)
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// 从解析后的字段集构造
    ///
    /// # 缺省口径
    /// - percentage 缺省 100
    /// - valid_from 缺省运行日期
    /// - is_current 缺省 true, version 缺省 1(创建新版本时由存储层改写)
    pub fn from_fields(
        id: String,
        fields: &Map<String, Value>,
        run_date: NaiveDate,
    ) -> Result<Self, FieldConvertError> {
        let now = Utc::now();
        Ok(Self {
            id,
            person_id: req_text(fields, "person_id")?,
            unit_id: req_text(fields, "unit_id")?,
            job_title_id: req_text(fields, "job_title_id")?,
            percentage: opt_f64(fields, "percentage")?.unwrap_or(100.0),
            valid_from: opt_date(fields, "valid_from")?.unwrap_or(run_date),
            valid_to: opt_date(fields, "valid_to")?,
            is_current: opt_bool(fields, "is_current")?.unwrap_or(true),
            version: opt_i64(fields, "version")?.unwrap_or(1),
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_unit_from_fields_with_aliases() {
        let fields = as_map(json!({
            "name": "人事处",
            "aliases": ["HR", "人事"],
            "unit_type_id": "ut-1"
        }));
        let unit = Unit::from_fields("u-1".to_string(), &fields).unwrap();
        assert_eq!(unit.aliases, vec!["HR", "人事"]);
        assert!(unit.parent_unit_id.is_none());
    }

    #[test]
    fn test_unit_missing_required_field() {
        let fields = as_map(json!({"name": "人事处"}));
        let err = Unit::from_fields("u-1".to_string(), &fields).unwrap_err();
        assert_eq!(err.field, "unit_type_id");
    }

    #[test]
    fn test_assignment_defaults() {
        let fields = as_map(json!({
            "person_id": "p1", "unit_id": "u1", "job_title_id": "j1"
        }));
        let run_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let a = Assignment::from_fields("a-1".to_string(), &fields, run_date).unwrap();
        assert_eq!(a.percentage, 100.0);
        assert_eq!(a.valid_from, run_date);
        assert!(a.is_current);
        assert_eq!(a.version, 1);
    }

    #[test]
    fn test_assignment_bad_date() {
        let fields = as_map(json!({
            "person_id": "p1", "unit_id": "u1", "job_title_id": "j1",
            "valid_from": "15.01.2026"
        }));
        let run_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let err = Assignment::from_fields("a-1".to_string(), &fields, run_date).unwrap_err();
        assert_eq!(err.field, "valid_from");
    }

    #[test]
    fn test_person_email_normalized() {
        let fields = as_map(json!({
            "first_name": "华", "last_name": "李", "email": "Li.Hua@Example.com"
        }));
        let p = Person::from_fields("p-1".to_string(), &fields).unwrap();
        assert_eq!(p.email, "li.hua@example.com");
    }
}
