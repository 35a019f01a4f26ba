// ==========================================
// 组织架构管理系统 - 导入层
// ==========================================
// 职责: 外部文件 ↔ 原始记录
// 支持: CSV(每实体类型一个文件), JSON(单文档)
// ==========================================

// 模块声明
pub mod csv_format;
pub mod error;
pub mod field_mapper;
pub mod format;
pub mod json_format;
pub mod validator;

// 重导出核心类型
pub use csv_format::CsvProcessor;
pub use error::{ImportError, ImportFileResult};
pub use field_mapper::FieldMapper;
pub use format::{
    processor_for, source_size_bytes, ExportDataset, ExportMetadata, FormatProcessor, ParsedSource,
};
pub use json_format::JsonProcessor;
pub use validator::StructureValidator;
