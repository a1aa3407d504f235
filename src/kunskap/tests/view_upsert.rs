mod common;
use common::{
    AUDIT_DATASET, PROJECT, VIEW_NAME, capture_logs, engine, setup, setup_with_templates,
};

use kunskap::{
    errors::{TemplateError, ViewError},
    view::{ViewUpsert, upsert_view},
};
use query_engine::{
    EngineError,
    memory::{EngineCall, InMemoryEngine, Operation},
    models::DatasetReference,
};

#[tokio::test]
async fn creates_view_when_absent() {
    let fx = setup();
    let engine = engine();

    let outcome = upsert_view(engine.as_ref(), &fx.config).await.expect("upsert");
    assert_eq!(outcome, ViewUpsert::Created(fx.view_ref()));

    let stored = engine.table(&fx.view_ref()).expect("view stored");
    assert_eq!(
        stored.table.view_query(),
        Some("SELECT * FROM `billing-proj.audit_logs.cloudaudit_googleapis_com_data_access_*`")
    );
    assert_eq!(stored.table.kind.as_deref(), Some("VIEW"));
    assert_eq!(engine.call_count(Operation::UpdateViewQuery), 0);
}

#[tokio::test]
async fn second_run_updates_instead_of_creating() {
    let fx = setup();
    let engine = engine();

    upsert_view(engine.as_ref(), &fx.config).await.expect("first");
    fx.rewrite_view_sql("SELECT 2 FROM `{billing_project_id}.{audit_logs_dataset_id}.t`");
    let outcome = upsert_view(engine.as_ref(), &fx.config).await.expect("second");

    assert_eq!(outcome, ViewUpsert::Updated(fx.view_ref()));
    assert_eq!(engine.call_count(Operation::CreateTable), 1);
    assert_eq!(engine.call_count(Operation::UpdateViewQuery), 1);

    // Still exactly one view, now holding the latest query.
    let dataset = DatasetReference::new(PROJECT, AUDIT_DATASET);
    assert_eq!(engine.table_ids(&dataset), vec![VIEW_NAME.to_string()]);
    let stored = engine.table(&fx.view_ref()).expect("view stored");
    assert_eq!(
        stored.table.view_query(),
        Some("SELECT 2 FROM `billing-proj.audit_logs.t`")
    );
}

#[tokio::test]
async fn repeated_runs_converge() {
    let fx = setup();
    let engine = engine();

    for _ in 0..3 {
        upsert_view(engine.as_ref(), &fx.config).await.expect("upsert");
    }
    let first = engine.table(&fx.view_ref()).expect("view stored");
    upsert_view(engine.as_ref(), &fx.config).await.expect("upsert");
    let last = engine.table(&fx.view_ref()).expect("view stored");

    assert_eq!(first, last);
    assert_eq!(engine.call_count(Operation::CreateTable), 1);
    assert_eq!(engine.call_count(Operation::UpdateViewQuery), 3);
}

#[tokio::test]
async fn each_run_takes_exactly_one_branch() {
    let fx = setup();
    let engine = engine();

    upsert_view(engine.as_ref(), &fx.config).await.expect("first");
    upsert_view(engine.as_ref(), &fx.config).await.expect("second");

    let writes: Vec<EngineCall> = engine
        .calls()
        .into_iter()
        .filter(|c| {
            matches!(
                c.operation(),
                Operation::CreateTable | Operation::UpdateViewQuery
            )
        })
        .collect();
    assert_eq!(
        writes,
        vec![
            EngineCall::CreateTable(fx.view_ref()),
            EngineCall::UpdateViewQuery(fx.view_ref()),
        ]
    );
}

#[tokio::test]
async fn missing_dataset_is_reported_without_creating() {
    let fx = setup();
    let engine = InMemoryEngine::new();

    let err = upsert_view(&engine, &fx.config).await.unwrap_err();
    match err {
        ViewError::Engine(e) => assert!(e.is_not_found(), "unexpected: {e}"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.call_count(Operation::ListTables), 0);
    assert_eq!(engine.call_count(Operation::CreateTable), 0);
}

#[tokio::test]
async fn unknown_placeholder_fails_before_touching_the_engine() {
    let fx = setup_with_templates("SELECT * FROM {no_such_key}", "SELECT 1");
    let engine = engine();

    let err = upsert_view(engine.as_ref(), &fx.config).await.unwrap_err();
    assert!(
        matches!(
            &err,
            ViewError::Template(TemplateError::UnknownPlaceholder { name }) if name == "no_such_key"
        ),
        "unexpected: {err}"
    );
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn create_failure_propagates() {
    let fx = setup();
    let engine = engine();
    engine.fail_next(Operation::CreateTable, "quota exceeded");

    let err = upsert_view(engine.as_ref(), &fx.config).await.unwrap_err();
    assert!(
        matches!(&err, ViewError::Engine(EngineError::Api { message, .. }) if message == "quota exceeded"),
        "unexpected: {err}"
    );
    assert!(engine.table(&fx.view_ref()).is_none());
}

#[tokio::test]
async fn view_name_is_part_of_the_log_message() {
    let fx = setup();
    let engine = engine();
    let (logs, _guard) = capture_logs();

    upsert_view(engine.as_ref(), &fx.config).await.expect("first");
    upsert_view(engine.as_ref(), &fx.config).await.expect("second");

    let out = logs.contents();
    assert!(
        out.contains("Created view billing-proj.audit_logs.query_jobs"),
        "{out}"
    );
    assert!(
        out.contains("Updated query of view billing-proj.audit_logs.query_jobs"),
        "{out}"
    );
    assert!(!out.contains("view="), "{out}");
}
