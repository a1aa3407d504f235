use std::path::PathBuf;

use kunskap::{
    config::{Config, keys},
    template::SqlTemplate,
};

fn sample() -> Config {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("kunskap.toml");
    Config::load(path).expect("load sample config")
}

#[test]
fn sample_config_is_complete() {
    let config = sample();
    config.validate().expect("valid");
    assert_eq!(config.partition_field(), "usage_start_time");
    assert_eq!(config.location(), None);
}

#[test]
fn sample_templates_render() {
    let config = sample();
    for key in [keys::CREATE_VIEW_SQL_PATH, keys::CREATE_OUTPUT_TABLE_SQL_FILE_PATH] {
        let path = config.resolve_path(key).expect("path");
        let template = SqlTemplate::load(&path).expect("load template");
        let sql = template.render(&config).expect("render");
        assert!(sql.contains("`my-billing-project.bigquery_audit_logs."), "{sql}");
        assert!(!sql.contains('{'), "{sql}");
    }
}
