// ==========================================
// 组织架构管理系统 - 并发运行集成测试
// ==========================================
// 覆盖: 后台派发 / 进度轮询 / 并发运行隔离 / 取消回滚 / API 门面
// ==========================================


use org_admin::api::{RunOutcome, TransferApi};
use org_admin::domain::transfer::ImportOptions;
use org_admin::domain::types::{EntityType, ErrorKind, RunKind};
use org_admin::logging;
use org_admin::repository::entity_store::{EntityStore as _, EntityStoreProvider};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// 与样例数据集不相交的第二份数据集(自然键全部不同)
fn second_dataset() -> Value {
    json!({
        "unit_type_themes": [
            {"id": "th-b1", "name": "暗色主题", "primary_color": "#24292f"}
        ],
        "unit_types": [
            {"id": "ut-b1", "name": "事业单位"}
        ],
        "units": [
            {"id": "u-b1", "name": "档案馆", "unit_type_id": "ut-b1"}
        ],
        "job_titles": [
            {"id": "jt-b1", "name": "主任"}
        ],
        "persons": [
            {"id": "p-b1", "first_name": "三", "last_name": "张", "email": "zhang.san@example.com"}
        ],
        "assignments": [
            {"id": "a-b1", "person_id": "p-b1", "unit_id": "u-b1", "job_title_id": "jt-b1",
             "percentage": 100.0, "valid_from": "2026-04-01"}
        ]
    })
}

/// 轮询进度直到运行结束(带超时保护)
async fn poll_until_finished(api: &TransferApi, run_id: &str) {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        let progress = api.progress(run_id).expect("运行应已登记");
        if progress.finished {
            return;
        }
        assert!(Instant::now() < deadline, "运行超时未结束");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ==========================================
// 后台派发与进度
// ==========================================

#[tokio::test]
async fn test_background_import_with_progress_polling() {
    logging::init_test();
    let (_db_file, db_path) = test_helpers::create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let source = test_helpers::write_json_document(&dir, "import.json", &test_helpers::sample_json_document());

    let api = TransferApi::new(db_path.clone()).await.unwrap();
    let run_id = api
        .start_import(source, ImportOptions::default(), "tester")
        .unwrap();

    // start_import 立即返回,调用方不被阻塞
    let progress = api.progress(&run_id).unwrap();
    assert_eq!(progress.run_id, run_id);
    assert_eq!(progress.kind, RunKind::Import);

    poll_until_finished(&api, &run_id).await;

    let outcome = api.wait(&run_id).await.unwrap();
    let result = match outcome {
        RunOutcome::Import(result) => result,
        RunOutcome::Export(_) => panic!("应为导入结果"),
    };
    assert!(result.success, "后台导入失败: {:?}", result.errors);

    let progress = api.progress(&run_id).unwrap();
    assert_eq!(progress.total, 12);
    assert_eq!(progress.processed, 12);
    assert_eq!(progress.phase, "COMPLETED");
}

// ==========================================
// 并发运行
// ==========================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_imports_are_isolated() {
    logging::init_test();
    let (_db_file, db_path) = test_helpers::create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let source_a = test_helpers::write_json_document(&dir, "a.json", &test_helpers::sample_json_document());
    let source_b = test_helpers::write_json_document(&dir, "b.json", &second_dataset());

    let api = TransferApi::new(db_path.clone()).await.unwrap();
    let run_a = api
        .start_import(source_a, ImportOptions::default(), "user-a")
        .unwrap();
    let run_b = api
        .start_import(source_b, ImportOptions::default(), "user-b")
        .unwrap();

    let outcome_a = api.wait(&run_a).await.unwrap();
    let outcome_b = api.wait(&run_b).await.unwrap();

    for (name, outcome) in [("a", outcome_a), ("b", outcome_b)] {
        match outcome {
            RunOutcome::Import(result) => {
                assert!(result.success, "运行 {} 失败: {:?}", name, result.errors)
            }
            RunOutcome::Export(_) => panic!("应为导入结果"),
        }
    }

    // 两份不相交数据集都完整落库
    let stores = test_helpers::open_stores(&db_path);
    assert_eq!(stores.store(EntityType::Person).count().await.unwrap(), 3);
    assert_eq!(stores.store(EntityType::Unit).count().await.unwrap(), 4);
    assert_eq!(
        stores.store(EntityType::Assignment).count().await.unwrap(),
        3
    );
}

// ==========================================
// 取消
// ==========================================

#[tokio::test]
async fn test_cancelled_run_rolls_back_everything() {
    logging::init_test();
    let (_db_file, db_path) = test_helpers::create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let source = test_helpers::write_json_document(&dir, "import.json", &test_helpers::sample_json_document());

    // 取消先于处理发生: 确定性走 ROLLED_BACK 路径
    let control = test_helpers::new_control(RunKind::Import);
    control.cancel();

    let orchestrator = test_helpers::build_orchestrator(&db_path);
    let result = orchestrator
        .import(&source, &ImportOptions::default(), control.clone(), "tester")
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result
        .errors
        .iter()
        .any(|e| e.kind == ErrorKind::Cancelled));
    assert_eq!(control.snapshot().phase, "ROLLED_BACK");

    let stores = test_helpers::open_stores(&db_path);
    for (entity, _) in test_helpers::SAMPLE_COUNTS {
        assert_eq!(
            stores.store(entity).count().await.unwrap(),
            0,
            "{} 取消后不应留下数据",
            entity
        );
    }
}

#[tokio::test]
async fn test_cancel_unknown_run_is_rejected() {
    logging::init_test();
    let (_db_file, db_path) = test_helpers::create_test_db().unwrap();
    let api = TransferApi::new(db_path).await.unwrap();

    assert!(api.cancel("不存在的运行").is_err());
    assert!(api.progress("不存在的运行").is_err());
}

// ==========================================
// API 门面
// ==========================================

#[tokio::test]
async fn test_api_preview_and_recent_runs() {
    logging::init_test();
    let (_db_file, db_path) = test_helpers::create_test_db().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let source = test_helpers::write_json_document(&dir, "import.json", &test_helpers::sample_json_document());

    let api = TransferApi::new(db_path.clone()).await.unwrap();

    // 预演不落库但留痕
    let preview = api
        .preview_import(&source, &ImportOptions::default(), "tester")
        .await
        .unwrap();
    assert!(preview.success && preview.validate_only);
    assert_eq!(preview.counts_for(EntityType::Person).created, 2);

    let stores = test_helpers::open_stores(&db_path);
    assert_eq!(stores.store(EntityType::Person).count().await.unwrap(), 0);

    // 正式导入后审计可追溯
    let run_id = api
        .start_import(source, ImportOptions::default(), "tester")
        .unwrap();
    let outcome = api.wait(&run_id).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Import(r) if r.success));

    let recent = api.recent_runs(10).await.unwrap();
    assert_eq!(recent.len(), 2, "预演与正式导入都应留痕");
    assert!(recent.iter().any(|a| a.run_id == run_id));
}
