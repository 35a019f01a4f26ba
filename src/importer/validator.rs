// ==========================================
// 组织架构管理系统 - 结构校验器
// ==========================================
// 职责: 表头必填列检查(FATAL) + 行级必填/范围校验
// 口径: FATAL 在任何持久化发生前拦截; 行级违规只跳过该行
// ==========================================

use crate::domain::transfer::ValidationError;
use crate::domain::types::{EntityType, ErrorKind};
use crate::importer::format::ParsedSource;
use serde_json::{Map, Value};

pub struct StructureValidator;

impl StructureValidator {
    /// 表头必填列检查(仅 CSV 源有表头)
    ///
    /// 某个被请求实体的文件缺少必填列 → FILE_FORMAT_ERROR(FATAL)
    pub fn validate_headers(&self, parsed: &ParsedSource) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (entity_type, headers) in &parsed.headers {
            let descriptor = entity_type.descriptor();
            for required in descriptor.required_fields {
                if !headers.iter().any(|h| h == required) {
                    errors.push(ValidationError {
                        kind: ErrorKind::FileFormatError,
                        severity: crate::domain::types::Severity::Fatal,
                        entity_type: Some(*entity_type),
                        source_row_index: None,
                        field: Some(required.to_string()),
                        message: format!(
                            "{} 文件表头缺少必填列 {}",
                            descriptor.json_key, required
                        ),
                    });
                }
            }
        }

        errors
    }

    /// 行级校验(映射后的类型化字段集)
    ///
    /// - 必填字段为空 → MISSING_REQUIRED_FIELD(ERROR)
    /// - percentage 超出 [0, 100] → BUSINESS_RULE_VIOLATION(ERROR)
    pub fn validate_record(
        &self,
        entity_type: EntityType,
        source_row_index: usize,
        fields: &Map<String, Value>,
    ) -> Vec<ValidationError> {
        let descriptor = entity_type.descriptor();
        let mut errors = Vec::new();

        for required in descriptor.required_fields {
            let missing = match fields.get(*required) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            };
            if missing {
                errors.push(ValidationError::row_error(
                    ErrorKind::MissingRequiredField,
                    entity_type,
                    source_row_index,
                    Some(required),
                    format!("必填字段 {} 缺失", required),
                ));
            }
        }

        if let Some(percentage) = fields.get("percentage").and_then(Value::as_f64) {
            if !(0.0..=100.0).contains(&percentage) {
                errors.push(ValidationError::row_error(
                    ErrorKind::BusinessRuleViolation,
                    entity_type,
                    source_row_index,
                    Some("percentage"),
                    format!("任职比例超出范围 [0, 100]: {}", percentage),
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Severity;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_missing_header_column_is_fatal() {
        let mut parsed = ParsedSource::default();
        parsed.headers.insert(
            EntityType::Person,
            vec!["first_name".to_string(), "last_name".to_string()],
        );

        let validator = StructureValidator;
        let errors = validator.validate_headers(&parsed);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::FileFormatError);
        assert_eq!(errors[0].severity, Severity::Fatal);
        assert_eq!(errors[0].field.as_deref(), Some("email"));
    }

    #[test]
    fn test_complete_header_passes() {
        let mut parsed = ParsedSource::default();
        parsed.headers.insert(
            EntityType::JobTitle,
            vec!["id".to_string(), "name".to_string()],
        );
        let validator = StructureValidator;
        assert!(validator.validate_headers(&parsed).is_empty());
    }

    #[test]
    fn test_missing_required_field_is_row_error() {
        let validator = StructureValidator;
        let fields = as_map(json!({"name": "", "unit_type_id": "ut1"}));
        let errors = validator.validate_record(EntityType::Unit, 3, &fields);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::MissingRequiredField);
        assert_eq!(errors[0].severity, Severity::Error);
        assert_eq!(errors[0].source_row_index, Some(3));
    }

    #[test]
    fn test_percentage_range_checked() {
        let validator = StructureValidator;
        let fields = as_map(json!({
            "person_id": "p1", "unit_id": "u1", "job_title_id": "j1",
            "percentage": 120.0
        }));
        let errors = validator.validate_record(EntityType::Assignment, 5, &fields);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::BusinessRuleViolation);
    }
}
