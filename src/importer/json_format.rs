// ==========================================
// 组织架构管理系统 - JSON 格式处理器
// ==========================================
// 口径: 单文档,metadata 头 + 每实体类型一个数组
// ==========================================

use crate::domain::transfer::{FormatOptions, ImportRecord};
use crate::domain::types::EntityType;
use crate::importer::error::{ImportError, ImportFileResult};
use crate::importer::format::{ExportDataset, FormatProcessor, ParsedSource};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

pub struct JsonProcessor;

impl FormatProcessor for JsonProcessor {
    fn parse(&self, source: &Path, requested: &[EntityType]) -> ImportFileResult<ParsedSource> {
        if !source.exists() {
            return Err(ImportError::FileNotFound(source.display().to_string()));
        }

        let text = std::fs::read_to_string(source)?;
        let doc: Value = serde_json::from_str(&text)?;
        let root = doc.as_object().ok_or_else(|| {
            ImportError::DocumentStructureError("文档根节点必须是对象".to_string())
        })?;

        let mut parsed = ParsedSource::default();

        for &entity_type in requested {
            let key = entity_type.descriptor().json_key;
            match root.get(key) {
                None | Some(Value::Null) => parsed.missing.push(entity_type),
                Some(Value::Array(items)) => {
                    for (idx, item) in items.iter().enumerate() {
                        let raw_fields = match item {
                            Value::Object(map) => map.clone(),
                            other => {
                                return Err(ImportError::DocumentStructureError(format!(
                                    "{} 第 {} 个元素必须是对象,实际 {}",
                                    key,
                                    idx + 1,
                                    other
                                )))
                            }
                        };
                        parsed.records.push(ImportRecord {
                            entity_type,
                            source_row_index: idx + 1,
                            raw_fields,
                        });
                    }
                }
                Some(other) => {
                    return Err(ImportError::DocumentStructureError(format!(
                        "{} 必须是数组,实际 {}",
                        key, other
                    )))
                }
            }
        }

        Ok(parsed)
    }

    fn write(
        &self,
        dest: &Path,
        dataset: &ExportDataset,
        options: &FormatOptions,
    ) -> ImportFileResult<Vec<PathBuf>> {
        let mut root = Map::new();
        root.insert(
            "metadata".to_string(),
            json!({
                "export_date": dataset.metadata.export_date,
                "version": dataset.metadata.version,
                "total_records": dataset.metadata.total_records,
            }),
        );
        for (entity_type, records) in &dataset.sections {
            root.insert(
                entity_type.descriptor().json_key.to_string(),
                Value::Array(records.iter().cloned().map(Value::Object).collect()),
            );
        }

        let doc = Value::Object(root);
        let text = if options.pretty {
            serde_json::to_string_pretty(&doc)
        } else {
            serde_json::to_string(&doc)
        }
        .map_err(|e| ImportError::InternalError(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ImportError::FileWriteError(e.to_string()))?;
            }
        }
        std::fs::write(dest, text).map_err(|e| ImportError::FileWriteError(e.to_string()))?;

        Ok(vec![dest.to_path_buf()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::format::ExportMetadata;

    #[test]
    fn test_parse_document_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(
            &path,
            r#"{
                "metadata": {"export_date": "2026-08-04T00:00:00Z", "version": "1.0", "total_records": 2},
                "persons": [
                    {"first_name": "华", "last_name": "李", "email": "li@example.com"},
                    {"first_name": "敏", "last_name": "王", "email": "wang@example.com"}
                ]
            }"#,
        )
        .unwrap();

        let processor = JsonProcessor;
        let parsed = processor
            .parse(&path, &[EntityType::Person, EntityType::Unit])
            .unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].entity_type, EntityType::Person);
        assert_eq!(parsed.records[1].source_row_index, 2);
        assert_eq!(parsed.missing, vec![EntityType::Unit]);
    }

    #[test]
    fn test_parse_rejects_non_array_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"persons": {"oops": true}}"#).unwrap();

        let processor = JsonProcessor;
        let err = processor.parse(&path, &[EntityType::Person]).unwrap_err();
        assert!(matches!(err, ImportError::DocumentStructureError(_)));
    }

    #[test]
    fn test_write_round_trips_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String("处长".to_string()));
        let dataset = ExportDataset {
            metadata: ExportMetadata {
                export_date: chrono::Utc::now(),
                version: "1.0".to_string(),
                total_records: 1,
            },
            sections: vec![(EntityType::JobTitle, vec![fields])],
        };

        let processor = JsonProcessor;
        let files = processor
            .write(&path, &dataset, &FormatOptions { pretty: true })
            .unwrap();
        assert_eq!(files, vec![path.clone()]);

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["metadata"]["total_records"], json!(1));
        assert_eq!(doc["job_titles"][0]["name"], json!("处长"));
    }
}
