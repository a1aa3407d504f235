#![allow(dead_code)]

use std::{
    io,
    path::Path,
    sync::{Arc, Mutex},
};

use kunskap::config::Config;
use query_engine::{
    memory::InMemoryEngine,
    models::{DatasetReference, TableReference},
};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

pub const PROJECT: &str = "billing-proj";
pub const AUDIT_DATASET: &str = "audit_logs";
pub const VIEW_NAME: &str = "query_jobs";
pub const OUTPUT_DATASET: &str = "reports";
pub const OUTPUT_TABLE: &str = "query_costs";

pub const VIEW_SQL: &str =
    "SELECT * FROM `{billing_project_id}.{audit_logs_dataset_id}.cloudaudit_googleapis_com_data_access_*`";
pub const OUTPUT_SQL: &str =
    "SELECT usage_start_time, cost FROM `{billing_project_id}.{audit_logs_dataset_id}.{audit_logs_view_name}`";

pub struct Fixture {
    dir: TempDir, // keep alive for the life of the test
    pub config: Config,
}

impl Fixture {
    pub fn view_ref(&self) -> TableReference {
        DatasetReference::new(PROJECT, AUDIT_DATASET).table(VIEW_NAME)
    }

    pub fn output_ref(&self) -> TableReference {
        DatasetReference::new(PROJECT, OUTPUT_DATASET).table(OUTPUT_TABLE)
    }

    /// Replaces the view template on disk; the next invocation picks it up.
    pub fn rewrite_view_sql(&self, sql: &str) {
        std::fs::write(self.dir.path().join("create_view.sql"), sql).expect("write view sql");
    }
}

pub fn setup() -> Fixture {
    setup_with_templates(VIEW_SQL, OUTPUT_SQL)
}

/// Writes both templates into a temp dir and returns a config pointing at
/// them through relative paths.
pub fn setup_with_templates(view_sql: &str, output_sql: &str) -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "create_view.sql", view_sql);
    write(dir.path(), "create_output_table.sql", output_sql);

    let config = Config::from_pairs([
        ("billing_project_id", PROJECT),
        ("audit_logs_dataset_id", AUDIT_DATASET),
        ("audit_logs_view_name", VIEW_NAME),
        ("output_dataset_id", OUTPUT_DATASET),
        ("output_table_name", OUTPUT_TABLE),
        ("create_view_sql_path", "create_view.sql"),
        ("create_output_table_sql_file_path", "create_output_table.sql"),
        ("job_poll_interval_ms", "1"),
    ])
    .with_base_dir(dir.path());

    Fixture { dir, config }
}

fn write(dir: &Path, name: &str, text: &str) {
    std::fs::write(dir.join(name), text).expect("write template");
}

/// Engine holding both configured datasets.
pub fn engine() -> Arc<InMemoryEngine> {
    Arc::new(
        InMemoryEngine::new()
            .with_dataset(DatasetReference::new(PROJECT, AUDIT_DATASET))
            .with_dataset(DatasetReference::new(PROJECT, OUTPUT_DATASET)),
    )
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().expect("log buffer").clone();
        String::from_utf8(bytes).expect("utf8 logs")
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Routes this thread's logs into a fresh buffer until the guard drops.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
