// ==========================================
// 组织架构管理系统 - 导出与往返集成测试
// ==========================================
// 覆盖: JSON 导出文档形态 / CSV 每类型一文件 /
//       导出→空库导入往返 / 历史版本与日期过滤 / 审计留痕
// ==========================================


use org_admin::domain::transfer::{DateRange, ExportOptions, FormatOptions, ImportOptions};
use org_admin::domain::types::{ConflictStrategy, EntityType, RunKind};
use org_admin::logging;
use org_admin::repository::audit_repo::{RunAuditStore, SqliteRunAuditStore};
use org_admin::repository::entity_store::{EntityStore as _, EntityStoreProvider};
use serde_json::{json, Value};

/// 灌入样例数据集
async fn seed_sample(db_path: &str, dir: &tempfile::TempDir) {
    let source = test_helpers::write_json_document(dir, "seed.json", &test_helpers::sample_json_document());
    let orchestrator = test_helpers::build_orchestrator(db_path);
    let result = orchestrator
        .import(&source, &ImportOptions::default(), test_helpers::new_control(RunKind::Import), "seeder")
        .await
        .unwrap();
    assert!(result.success, "灌数失败: {:?}", result.errors);
}

// ==========================================
// JSON 导出
// ==========================================

#[tokio::test]
async fn test_json_export_document_shape() {
    logging::init_test();
    let (_db_file, db_path) = test_helpers::create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    seed_sample(&db_path, &dir).await;

    let dest = dir.path().join("export.json");
    let orchestrator = test_helpers::build_orchestrator(&db_path);
    let options = ExportOptions {
        format_options: FormatOptions { pretty: true },
        ..ExportOptions::default()
    };
    let result = orchestrator
        .export(&dest, &options, test_helpers::new_control(RunKind::Export), "tester")
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.files.len(), 1);
    assert_eq!(result.total_records, 12);

    let doc: Value = serde_json::from_str(&std::fs::read_to_string(&dest).unwrap()).unwrap();
    assert_eq!(doc["metadata"]["version"], json!("1.0"));
    assert_eq!(doc["metadata"]["total_records"], json!(12));
    for key in [
        "unit_types",
        "unit_type_themes",
        "units",
        "job_titles",
        "persons",
        "assignments",
    ] {
        assert!(doc[key].is_array(), "文档应包含 {} 数组", key);
    }
    assert_eq!(doc["units"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_csv_export_one_file_per_type() {
    logging::init_test();
    let (_db_file, db_path) = test_helpers::create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    seed_sample(&db_path, &dir).await;

    let dest = dir.path().join("csv_export");
    let orchestrator = test_helpers::build_orchestrator(&db_path);
    let result = orchestrator
        .export(&dest, &ExportOptions::default(), test_helpers::new_control(RunKind::Export), "tester")
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.files.len(), 6, "每实体类型一个文件");

    // 表头与数组字段的内嵌 JSON 文本
    let units_csv = std::fs::read_to_string(dest.join("units.csv")).unwrap();
    assert!(units_csv.starts_with("id,name,short_name,aliases,unit_type_id,parent_unit_id"));
    assert!(
        units_csv.contains(r#"[""HR"",""人力资源""]"#),
        "别名应为 CSV 单元格内的 JSON 文本: {}",
        units_csv
    );
}

// ==========================================
// 往返属性
// ==========================================

#[tokio::test]
async fn test_roundtrip_into_empty_target() {
    logging::init_test();
    let (_db_a, db_a) = test_helpers::create_test_db().unwrap();
    let (_db_b, db_b) = test_helpers::create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    seed_sample(&db_a, &dir).await;

    // 导出 A
    let dest = dir.path().join("roundtrip.json");
    let export_result = test_helpers::build_orchestrator(&db_a)
        .export(&dest, &ExportOptions::default(), test_helpers::new_control(RunKind::Export), "tester")
        .await
        .unwrap();
    assert!(export_result.success);

    // 导入空库 B(skip 策略): 各类型 created 等于原始计数,无跳过/更新
    let import_result = test_helpers::build_orchestrator(&db_b)
        .import(&dest, &ImportOptions::default(), test_helpers::new_control(RunKind::Import), "tester")
        .await
        .unwrap();
    assert!(import_result.success, "往返导入失败: {:?}", import_result.errors);

    for (entity, expected) in test_helpers::SAMPLE_COUNTS {
        let counts = import_result.counts_for(entity);
        assert_eq!(counts.created, expected, "{} created", entity);
        assert_eq!(counts.skipped, 0, "{} skipped", entity);
        assert_eq!(counts.updated, 0, "{} updated", entity);
    }

    // 外键关系在新库中仍然闭合
    let stores = test_helpers::open_stores(&db_b);
    let unit_store = stores.store(EntityType::Unit);
    let parent_id = unit_store.find_id_by_natural_key("人事处").await.unwrap().unwrap();
    let child_id = unit_store.find_id_by_natural_key("人事一科").await.unwrap().unwrap();
    let child = unit_store.get_by_id(&child_id).await.unwrap().unwrap();
    assert_eq!(child.get("parent_unit_id"), Some(&Value::String(parent_id)));

    // 再次导入同一文件: created=0, skipped=total
    let second = test_helpers::build_orchestrator(&db_b)
        .import(&dest, &ImportOptions::default(), test_helpers::new_control(RunKind::Import), "tester")
        .await
        .unwrap();
    assert!(second.success);
    for (entity, expected) in test_helpers::SAMPLE_COUNTS {
        let counts = second.counts_for(entity);
        assert_eq!(counts.created, 0, "{} 二次导入不应创建", entity);
        assert_eq!(counts.skipped, expected, "{} 二次导入应全部跳过", entity);
    }
}

// ==========================================
// 历史版本与日期过滤
// ==========================================

#[tokio::test]
async fn test_export_include_historical_versions() {
    logging::init_test();
    let (_db_file, db_path) = test_helpers::create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    seed_sample(&db_path, &dir).await;

    // 制造一个历史版本
    let mut doc = test_helpers::sample_json_document();
    doc["assignments"][0]["percentage"] = json!(40.0);
    doc["assignments"][0]["valid_from"] = json!("2026-07-01");
    let changed = test_helpers::write_json_document(&dir, "v2.json", &doc);
    let orchestrator = test_helpers::build_orchestrator(&db_path);
    let options = ImportOptions {
        conflict_resolution: ConflictStrategy::CreateVersion,
        ..ImportOptions::default()
    };
    orchestrator
        .import(&changed, &options, test_helpers::new_control(RunKind::Import), "tester")
        .await
        .unwrap();

    // 默认仅当前版本
    let dest_current = dir.path().join("current.json");
    let current = orchestrator
        .export(&dest_current, &ExportOptions::default(), test_helpers::new_control(RunKind::Export), "tester")
        .await
        .unwrap();
    assert_eq!(current.counts_for(EntityType::Assignment).processed, 2);

    // include_historical 含被关闭的旧版本
    let dest_all = dir.path().join("all.json");
    let all = orchestrator
        .export(
            &dest_all,
            &ExportOptions {
                include_historical: true,
                ..ExportOptions::default()
            },
            test_helpers::new_control(RunKind::Export),
            "tester",
        )
        .await
        .unwrap();
    assert_eq!(all.counts_for(EntityType::Assignment).processed, 3);
}

#[tokio::test]
async fn test_export_date_range_filter() {
    logging::init_test();
    let (_db_file, db_path) = test_helpers::create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    seed_sample(&db_path, &dir).await;

    // 全部记录都在今天创建: 历史区间应为空
    let dest = dir.path().join("past.json");
    let orchestrator = test_helpers::build_orchestrator(&db_path);
    let result = orchestrator
        .export(
            &dest,
            &ExportOptions {
                date_range: Some(DateRange {
                    from: chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
                    to: chrono::NaiveDate::from_ymd_opt(2000, 12, 31).unwrap(),
                }),
                ..ExportOptions::default()
            },
            test_helpers::new_control(RunKind::Export),
            "tester",
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.total_records, 0);
}

// ==========================================
// 审计留痕
// ==========================================

#[tokio::test]
async fn test_every_run_leaves_audit_record() {
    logging::init_test();
    let (_db_file, db_path) = test_helpers::create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();

    // 成功导入 + 失败导入(文件不存在) + 导出
    seed_sample(&db_path, &dir).await;
    let orchestrator = test_helpers::build_orchestrator(&db_path);
    let failed = orchestrator
        .import(
            dir.path().join("missing.json").as_path(),
            &ImportOptions::default(),
            test_helpers::new_control(RunKind::Import),
            "tester",
        )
        .await
        .unwrap();
    assert!(!failed.success);

    let dest = dir.path().join("audit_export.json");
    orchestrator
        .export(&dest, &ExportOptions::default(), test_helpers::new_control(RunKind::Export), "tester")
        .await
        .unwrap();

    let stores = test_helpers::open_stores(&db_path);
    let audit = SqliteRunAuditStore::new(stores.connection());
    let recent = audit.recent(10).await.unwrap();
    assert_eq!(recent.len(), 3, "每次运行(含失败)都应留痕");

    // 失败运行的审计记录包含完整结果 JSON
    let failed_audit = recent
        .iter()
        .find(|a| a.run_id == failed.run_id)
        .expect("失败运行应有审计记录");
    assert!(!failed_audit.success);
    let parsed: Value = serde_json::from_str(&failed_audit.result_json).unwrap();
    assert_eq!(parsed["success"], json!(false));
}
