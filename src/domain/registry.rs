// ==========================================
// 组织架构管理系统 - 实体描述表
// ==========================================
// 职责: 每个实体类型的静态处理描述
//       (自然键提取/外键清单/字段类型/版本化能力)
// 红线: 引擎各环节统一从这里取元数据,不做字符串分支
// ==========================================

use crate::domain::types::EntityType;
use serde_json::{Map, Value};

/// 外键字段描述
#[derive(Debug, Clone, Copy)]
pub struct ForeignKeyField {
    pub field: &'static str,  // 字段名(解析后持有持久化 id)
    pub target: EntityType,   // 引用的实体类型
    pub required: bool,       // 必填外键缺失/不可达 → 跳行; 可选外键 → 置空+警告
}

/// 实体静态描述
///
/// 字段类型清单驱动字段映射器的类型转换;
/// required_fields 驱动结构校验(表头缺列 → FATAL, 行内缺值 → ERROR)。
#[derive(Debug, Clone, Copy)]
pub struct EntityDescriptor {
    pub entity_type: EntityType,
    pub json_key: &'static str,   // JSON 文档键 / CSV 文件名主干
    pub table: &'static str,      // 存储表名
    /// 导出时的列顺序(同时是 CSV 表头),不含存储审计列
    pub fields: &'static [&'static str],
    pub required_fields: &'static [&'static str],
    pub integer_fields: &'static [&'static str],
    pub number_fields: &'static [&'static str],
    pub bool_fields: &'static [&'static str],
    pub date_fields: &'static [&'static str],
    pub array_fields: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKeyField],
    /// 批内自引用字段(父子关系),需要类型内拓扑二次排序
    pub self_reference: Option<&'static str>,
    /// 是否支持时间版本化(目前仅任职记录)
    pub supports_versioning: bool,
}

// ===== 六类实体的固定描述 =====

static UNIT_TYPE: EntityDescriptor = EntityDescriptor {
    entity_type: EntityType::UnitType,
    json_key: "unit_types",
    table: "unit_type",
    fields: &["id", "name", "description", "sort_order", "theme_id"],
    required_fields: &["name"],
    integer_fields: &["sort_order"],
    number_fields: &[],
    bool_fields: &[],
    date_fields: &[],
    array_fields: &[],
    foreign_keys: &[ForeignKeyField {
        field: "theme_id",
        target: EntityType::UnitTypeTheme,
        required: false,
    }],
    self_reference: None,
    supports_versioning: false,
};

static UNIT_TYPE_THEME: EntityDescriptor = EntityDescriptor {
    entity_type: EntityType::UnitTypeTheme,
    json_key: "unit_type_themes",
    table: "unit_type_theme",
    fields: &["id", "name", "primary_color", "secondary_color", "text_color"],
    required_fields: &["name"],
    integer_fields: &[],
    number_fields: &[],
    bool_fields: &[],
    date_fields: &[],
    array_fields: &[],
    foreign_keys: &[],
    self_reference: None,
    supports_versioning: false,
};

static UNIT: EntityDescriptor = EntityDescriptor {
    entity_type: EntityType::Unit,
    json_key: "units",
    table: "org_unit",
    fields: &[
        "id",
        "name",
        "short_name",
        "aliases",
        "unit_type_id",
        "parent_unit_id",
    ],
    required_fields: &["name", "unit_type_id"],
    integer_fields: &[],
    number_fields: &[],
    bool_fields: &[],
    date_fields: &[],
    array_fields: &["aliases"],
    foreign_keys: &[
        ForeignKeyField {
            field: "unit_type_id",
            target: EntityType::UnitType,
            required: true,
        },
        ForeignKeyField {
            field: "parent_unit_id",
            target: EntityType::Unit,
            required: false,
        },
    ],
    self_reference: Some("parent_unit_id"),
    supports_versioning: false,
};

static JOB_TITLE: EntityDescriptor = EntityDescriptor {
    entity_type: EntityType::JobTitle,
    json_key: "job_titles",
    table: "job_title",
    fields: &["id", "name", "abbreviation", "sort_order"],
    required_fields: &["name"],
    integer_fields: &["sort_order"],
    number_fields: &[],
    bool_fields: &[],
    date_fields: &[],
    array_fields: &[],
    foreign_keys: &[],
    self_reference: None,
    supports_versioning: false,
};

static PERSON: EntityDescriptor = EntityDescriptor {
    entity_type: EntityType::Person,
    json_key: "persons",
    table: "person",
    fields: &[
        "id",
        "first_name",
        "last_name",
        "email",
        "phone",
        "employee_number",
    ],
    required_fields: &["first_name", "last_name", "email"],
    integer_fields: &[],
    number_fields: &[],
    bool_fields: &[],
    date_fields: &[],
    array_fields: &[],
    foreign_keys: &[],
    self_reference: None,
    supports_versioning: false,
};

static ASSIGNMENT: EntityDescriptor = EntityDescriptor {
    entity_type: EntityType::Assignment,
    json_key: "assignments",
    table: "assignment",
    fields: &[
        "id",
        "person_id",
        "unit_id",
        "job_title_id",
        "percentage",
        "valid_from",
        "valid_to",
        "is_current",
        "version",
    ],
    required_fields: &["person_id", "unit_id", "job_title_id"],
    integer_fields: &["version"],
    number_fields: &["percentage"],
    bool_fields: &["is_current"],
    date_fields: &["valid_from", "valid_to"],
    array_fields: &[],
    foreign_keys: &[
        ForeignKeyField {
            field: "person_id",
            target: EntityType::Person,
            required: true,
        },
        ForeignKeyField {
            field: "unit_id",
            target: EntityType::Unit,
            required: true,
        },
        ForeignKeyField {
            field: "job_title_id",
            target: EntityType::JobTitle,
            required: true,
        },
    ],
    self_reference: None,
    supports_versioning: true,
};

impl EntityType {
    /// 取实体描述
    pub fn descriptor(&self) -> &'static EntityDescriptor {
        match self {
            EntityType::UnitType => &UNIT_TYPE,
            EntityType::UnitTypeTheme => &UNIT_TYPE_THEME,
            EntityType::Unit => &UNIT,
            EntityType::JobTitle => &JOB_TITLE,
            EntityType::Person => &PERSON,
            EntityType::Assignment => &ASSIGNMENT,
        }
    }

    /// 按 JSON 文档键反查实体类型
    pub fn from_json_key(key: &str) -> Option<EntityType> {
        EntityType::CANONICAL_ORDER
            .iter()
            .copied()
            .find(|t| t.descriptor().json_key == key)
    }
}

/// 任职记录自然键的字段分隔符(复合键拼接用,不出现在正常数据中)
pub const NATURAL_KEY_SEP: char = '\u{1f}';

/// 从(已解析外键的)字段集中提取自然键
///
/// # 口径
/// - UnitType/UnitTypeTheme/Unit/JobTitle: name
/// - Person: email(小写归一)
/// - Assignment: person_id + unit_id + job_title_id 复合(仅比对当前版本)
///
/// # 返回
/// - Some(String): 提取成功
/// - None: 构成自然键的字段缺失
pub fn natural_key(entity: EntityType, fields: &Map<String, Value>) -> Option<String> {
    let text = |name: &str| -> Option<String> {
        fields
            .get(name)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    match entity {
        EntityType::UnitType
        | EntityType::UnitTypeTheme
        | EntityType::Unit
        | EntityType::JobTitle => text("name"),
        EntityType::Person => text("email").map(|e| e.to_lowercase()),
        EntityType::Assignment => {
            let person = text("person_id")?;
            let unit = text("unit_id")?;
            let job_title = text("job_title_id")?;
            Some(format!(
                "{}{sep}{}{sep}{}",
                person,
                unit,
                job_title,
                sep = NATURAL_KEY_SEP
            ))
        }
    }
}
