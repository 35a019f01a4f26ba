// ==========================================
// 组织架构管理系统 - 格式处理器接口
// ==========================================
// 职责: 可插拔文件格式(CSV / JSON)的统一抽象
// 红线: 编排器不得出现格式分支,格式选择只在工厂内发生
// ==========================================

use crate::domain::transfer::FormatOptions;
use crate::domain::transfer::ImportRecord;
use crate::domain::types::EntityType;
use crate::importer::csv_format::CsvProcessor;
use crate::importer::error::{ImportError, ImportFileResult};
use crate::importer::json_format::JsonProcessor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 解析产物
///
/// headers 仅 CSV 填充(表头必填列检查用);
/// missing 为"请求了但源中缺席"的类型(WARNING,不是错误)
#[derive(Debug, Default)]
pub struct ParsedSource {
    pub records: Vec<ImportRecord>,
    pub headers: HashMap<EntityType, Vec<String>>,
    pub missing: Vec<EntityType>,
}

/// 导出文档元信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub export_date: DateTime<Utc>,
    pub version: String,
    pub total_records: usize,
}

/// 导出数据集(已按规范顺序排列的分节)
#[derive(Debug)]
pub struct ExportDataset {
    pub metadata: ExportMetadata,
    pub sections: Vec<(EntityType, Vec<Map<String, Value>>)>,
}

// ==========================================
// FormatProcessor Trait
// ==========================================
// 实现者: CsvProcessor(每实体类型一个文件), JsonProcessor(单文档)
pub trait FormatProcessor: Send + Sync {
    /// 解析源为原始导入记录
    ///
    /// # 参数
    /// - source: JSON 文件路径,或 CSV 目录/单文件路径
    /// - requested: 请求的实体类型(决定读取哪些分节/文件)
    fn parse(&self, source: &Path, requested: &[EntityType]) -> ImportFileResult<ParsedSource>;

    /// 写出导出数据集
    ///
    /// # 返回
    /// - Ok(Vec<PathBuf>): 实际写出的文件(CSV 每类型一个,JSON 单文件)
    fn write(
        &self,
        dest: &Path,
        dataset: &ExportDataset,
        options: &FormatOptions,
    ) -> ImportFileResult<Vec<PathBuf>>;
}

/// 按路径形态选择格式处理器
///
/// - `*.json` → JSON 单文档
/// - 目录或 `*.csv` → CSV(每实体类型一个文件)
pub fn processor_for(path: &Path) -> ImportFileResult<Box<dyn FormatProcessor>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "json" => Ok(Box::new(JsonProcessor)),
        "csv" => Ok(Box::new(CsvProcessor)),
        "" if path.is_dir() || !path.exists() => Ok(Box::new(CsvProcessor)),
        _ => Err(ImportError::UnsupportedFormat(ext)),
    }
}

/// 源文件总大小(字节)
///
/// CSV 目录取各实体文件之和,单文件取其自身
pub fn source_size_bytes(path: &Path) -> ImportFileResult<u64> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    if path.is_dir() {
        let mut total = 0u64;
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) == Some("csv") {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    } else {
        Ok(std::fs::metadata(path)?.len())
    }
}
