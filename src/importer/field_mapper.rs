// ==========================================
// 组织架构管理系统 - 字段映射器
// ==========================================
// 职责: 原始字段集 → 类型化字段集
//       (TRIM / 空值标准化 / 数值 / 布尔 / 日期 / 数组转换)
// 说明: CSV 单元格一律以字符串进入,JSON 已带类型,
//       两种来源在此收敛为同一套类型口径
// ==========================================

use crate::domain::transfer::{ImportRecord, ValidationError};
use crate::domain::types::ErrorKind;
use chrono::NaiveDate;
use serde_json::{Map, Number, Value};

pub struct FieldMapper;

impl FieldMapper {
    /// 将单条原始记录映射为类型化字段集
    ///
    /// # 返回
    /// - Ok(Map): 映射成功
    /// - Err(ValidationError): INVALID_DATA_TYPE(该行跳过)
    pub fn map_record(&self, record: &ImportRecord) -> Result<Map<String, Value>, ValidationError> {
        let descriptor = record.entity_type.descriptor();
        let mut out = Map::new();

        for (key, value) in &record.raw_fields {
            // 基础清洗: TRIM + 空串归一为 NULL
            let cleaned = Self::normalize_null(value.clone());

            let converted = if descriptor.integer_fields.contains(&key.as_str()) {
                self.to_integer(cleaned, key)
            } else if descriptor.number_fields.contains(&key.as_str()) {
                self.to_number(cleaned, key)
            } else if descriptor.bool_fields.contains(&key.as_str()) {
                self.to_bool(cleaned, key)
            } else if descriptor.date_fields.contains(&key.as_str()) {
                self.to_date(cleaned, key)
            } else if descriptor.array_fields.contains(&key.as_str()) {
                self.to_string_array(cleaned, key)
            } else {
                Ok(cleaned)
            };

            match converted {
                Ok(value) => {
                    out.insert(key.clone(), value);
                }
                Err(message) => {
                    return Err(ValidationError::row_error(
                        ErrorKind::InvalidDataType,
                        record.entity_type,
                        record.source_row_index,
                        Some(key),
                        message,
                    ))
                }
            }
        }

        Ok(out)
    }

    /// 空值标准化: 空白字符串 → NULL,其余字符串 TRIM
    fn normalize_null(value: Value) -> Value {
        match value {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Value::Null
                } else {
                    Value::String(trimmed.to_string())
                }
            }
            other => other,
        }
    }

    fn to_integer(&self, value: Value, field: &str) -> Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
            Value::String(s) => s
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|_| format!("字段 {} 期望整数,实际 {}", field, s)),
            other => Err(format!("字段 {} 期望整数,实际 {}", field, other)),
        }
    }

    fn to_number(&self, value: Value, field: &str) -> Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Number(n) => Ok(Value::Number(n)),
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("字段 {} 期望数值,实际 {}", field, s)),
            other => Err(format!("字段 {} 期望数值,实际 {}", field, other)),
        }
    }

    fn to_bool(&self, value: Value, field: &str) -> Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(format!("字段 {} 期望布尔,实际 {}", field, n)),
            },
            Value::String(s) => match s.to_lowercase().as_str() {
                "1" | "true" | "y" | "yes" | "是" => Ok(Value::Bool(true)),
                "0" | "false" | "n" | "no" | "否" => Ok(Value::Bool(false)),
                other => Err(format!("字段 {} 期望布尔,实际 {}", field, other)),
            },
            other => Err(format!("字段 {} 期望布尔,实际 {}", field, other)),
        }
    }

    fn to_date(&self, value: Value, field: &str) -> Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map(|_| Value::String(s.clone()))
                .map_err(|_| format!("字段 {} 期望 YYYY-MM-DD,实际 {}", field, s)),
            other => Err(format!("字段 {} 期望日期文本,实际 {}", field, other)),
        }
    }

    /// 数组字段: JSON 数组直接通过,CSV 单元格内的 JSON 文本解析
    fn to_string_array(&self, value: Value, field: &str) -> Result<Value, String> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => {
                if items.iter().all(Value::is_string) {
                    Ok(Value::Array(items))
                } else {
                    Err(format!("字段 {} 的数组元素必须为字符串", field))
                }
            }
            Value::String(s) => match serde_json::from_str::<Value>(&s) {
                Ok(Value::Array(items)) if items.iter().all(Value::is_string) => {
                    Ok(Value::Array(items))
                }
                _ => Err(format!("字段 {} 期望 JSON 字符串数组,实际 {}", field, s)),
            },
            other => Err(format!("字段 {} 期望数组,实际 {}", field, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::EntityType;
    use serde_json::json;

    fn record(entity_type: EntityType, fields: Value) -> ImportRecord {
        ImportRecord {
            entity_type,
            source_row_index: 2,
            raw_fields: match fields {
                Value::Object(map) => map,
                _ => panic!("expected object"),
            },
        }
    }

    #[test]
    fn test_csv_strings_coerced() {
        let mapper = FieldMapper;
        let mapped = mapper
            .map_record(&record(
                EntityType::Assignment,
                json!({
                    "person_id": " p1 ",
                    "unit_id": "u1",
                    "job_title_id": "j1",
                    "percentage": "60.5",
                    "is_current": "1",
                    "version": "2",
                    "valid_from": "2026-01-01",
                    "valid_to": ""
                }),
            ))
            .unwrap();

        assert_eq!(mapped["person_id"], json!("p1"));
        assert_eq!(mapped["percentage"], json!(60.5));
        assert_eq!(mapped["is_current"], json!(true));
        assert_eq!(mapped["version"], json!(2));
        assert_eq!(mapped["valid_to"], Value::Null);
    }

    #[test]
    fn test_invalid_number_rejected() {
        let mapper = FieldMapper;
        let err = mapper
            .map_record(&record(
                EntityType::Assignment,
                json!({
                    "person_id": "p1", "unit_id": "u1", "job_title_id": "j1",
                    "percentage": "abc"
                }),
            ))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidDataType);
        assert_eq!(err.field.as_deref(), Some("percentage"));
        assert_eq!(err.source_row_index, Some(2));
    }

    #[test]
    fn test_alias_cell_as_embedded_json() {
        let mapper = FieldMapper;
        let mapped = mapper
            .map_record(&record(
                EntityType::Unit,
                json!({
                    "name": "人事处",
                    "unit_type_id": "ut1",
                    "aliases": "[\"HR\", \"人事\"]"
                }),
            ))
            .unwrap();
        assert_eq!(mapped["aliases"], json!(["HR", "人事"]));
    }

    #[test]
    fn test_bad_date_rejected() {
        let mapper = FieldMapper;
        let err = mapper
            .map_record(&record(
                EntityType::Assignment,
                json!({
                    "person_id": "p1", "unit_id": "u1", "job_title_id": "j1",
                    "valid_from": "01/15/2026"
                }),
            ))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidDataType);
    }

    #[test]
    fn test_typed_json_passthrough() {
        let mapper = FieldMapper;
        let mapped = mapper
            .map_record(&record(
                EntityType::Unit,
                json!({
                    "name": "人事处",
                    "unit_type_id": "ut1",
                    "aliases": ["HR"]
                }),
            ))
            .unwrap();
        assert_eq!(mapped["aliases"], json!(["HR"]));
    }
}
