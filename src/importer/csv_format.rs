// ==========================================
// 组织架构管理系统 - CSV 格式处理器
// ==========================================
// 口径: 每实体类型一个文件(<json_key>.csv),首行表头;
//       数组字段(aliases)以内嵌 JSON 文本存放在单元格中
// ==========================================

use crate::domain::transfer::{FormatOptions, ImportRecord};
use crate::domain::types::EntityType;
use crate::importer::error::{ImportError, ImportFileResult};
use crate::importer::format::{ExportDataset, FormatProcessor, ParsedSource};
use csv::{ReaderBuilder, WriterBuilder};
use serde_json::{Map, Value};
use std::fs::File;
use std::path::{Path, PathBuf};

pub struct CsvProcessor;

impl CsvProcessor {
    /// 解析单个实体文件
    ///
    /// 行号从 2 起(首行为表头),与源文件行号一致
    fn parse_entity_file(
        &self,
        entity_type: EntityType,
        path: &Path,
        out: &mut ParsedSource,
    ) -> ImportFileResult<()> {
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        out.headers.insert(entity_type, headers.clone());

        for (row_idx, result) in reader.records().enumerate() {
            let record = result?;
            let mut raw_fields = Map::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    raw_fields.insert(
                        header.clone(),
                        Value::String(value.trim().to_string()),
                    );
                }
            }

            // 跳过完全空白的行
            if raw_fields
                .values()
                .all(|v| v.as_str().map(str::is_empty).unwrap_or(false))
            {
                continue;
            }

            out.records.push(ImportRecord {
                entity_type,
                source_row_index: row_idx + 2,
                raw_fields,
            });
        }

        Ok(())
    }

    /// 单元格渲染: 标量转文本,数组/对象转 JSON 文本
    fn render_cell(value: Option<&Value>) -> ImportFileResult<String> {
        Ok(match value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(b)) => if *b { "true" } else { "false" }.to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => serde_json::to_string(other)
                .map_err(|e| ImportError::InternalError(e.to_string()))?,
        })
    }
}

impl FormatProcessor for CsvProcessor {
    fn parse(&self, source: &Path, requested: &[EntityType]) -> ImportFileResult<ParsedSource> {
        if !source.exists() {
            return Err(ImportError::FileNotFound(source.display().to_string()));
        }

        let mut parsed = ParsedSource::default();

        if source.is_dir() {
            // 目录模式: 每类型找 <json_key>.csv,缺席记入 missing
            for &entity_type in requested {
                let path = source.join(format!("{}.csv", entity_type.descriptor().json_key));
                if path.exists() {
                    self.parse_entity_file(entity_type, &path, &mut parsed)?;
                } else {
                    parsed.missing.push(entity_type);
                }
            }
        } else {
            // 单文件模式: 文件名主干必须对应一个实体类型
            let stem = source
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let entity_type = EntityType::from_json_key(stem).ok_or_else(|| {
                ImportError::DocumentStructureError(format!(
                    "无法从文件名识别实体类型: {}",
                    source.display()
                ))
            })?;
            if requested.contains(&entity_type) {
                self.parse_entity_file(entity_type, source, &mut parsed)?;
            }
            for &other in requested {
                if other != entity_type {
                    parsed.missing.push(other);
                }
            }
        }

        Ok(parsed)
    }

    fn write(
        &self,
        dest: &Path,
        dataset: &ExportDataset,
        _options: &FormatOptions,
    ) -> ImportFileResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dest)
            .map_err(|e| ImportError::FileWriteError(e.to_string()))?;

        let mut files = Vec::new();
        for (entity_type, records) in &dataset.sections {
            let descriptor = entity_type.descriptor();
            let path = dest.join(format!("{}.csv", descriptor.json_key));
            let file = File::create(&path)
                .map_err(|e| ImportError::FileWriteError(e.to_string()))?;
            let mut writer = WriterBuilder::new().from_writer(file);

            writer.write_record(descriptor.fields)?;
            for record in records {
                let mut row = Vec::with_capacity(descriptor.fields.len());
                for field in descriptor.fields {
                    row.push(Self::render_cell(record.get(*field))?);
                }
                writer.write_record(&row)?;
            }
            writer
                .flush()
                .map_err(|e| ImportError::FileWriteError(e.to_string()))?;
            files.push(path);
        }

        Ok(files)
    }
}
