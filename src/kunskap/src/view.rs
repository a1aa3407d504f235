//! Creates or refreshes the view over the billing audit logs.

use query_engine::{
    QueryEngine,
    models::{DatasetReference, Table, TableReference},
};
use tracing::info;

use crate::{
    config::{Config, keys},
    errors::ViewError,
    template::SqlTemplate,
};

/// Which branch [`upsert_view`] took.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewUpsert {
    /// The view did not exist and was created.
    Created(TableReference),
    /// The view existed; only its query text was replaced.
    Updated(TableReference),
}

impl ViewUpsert {
    /// The view that was written.
    pub fn view(&self) -> &TableReference {
        match self {
            ViewUpsert::Created(v) | ViewUpsert::Updated(v) => v,
        }
    }
}

/// Ensures the configured view exists with the rendered view SQL.
///
/// The template is rendered before the engine is contacted, so a bad
/// template or missing key never touches the dataset. A missing dataset is
/// reported as-is. Exactly one of create or update is issued, so repeated
/// calls converge on a single view holding the latest query.
pub async fn upsert_view(
    engine: &dyn QueryEngine,
    config: &Config,
) -> Result<ViewUpsert, ViewError> {
    let sql =
        SqlTemplate::load(config.resolve_path(keys::CREATE_VIEW_SQL_PATH)?)?.render(config)?;

    let dataset_ref = DatasetReference::new(
        config.require(keys::BILLING_PROJECT_ID)?,
        config.require(keys::AUDIT_LOGS_DATASET_ID)?,
    );
    let view_name = config.require(keys::AUDIT_LOGS_VIEW_NAME)?;

    let dataset = engine.get_dataset(&dataset_ref).await?;
    let view_ref = dataset.dataset_reference.table(view_name);

    let existing = engine.list_tables(&dataset.dataset_reference).await?;
    if existing.iter().any(|t| t.table_id == view_name) {
        engine.update_view_query(&view_ref, &sql).await?;
        info!("Updated query of view {view_ref}");
        Ok(ViewUpsert::Updated(view_ref))
    } else {
        engine.create_table(&Table::view(view_ref.clone(), sql)).await?;
        info!("Created view {view_ref}");
        Ok(ViewUpsert::Created(view_ref))
    }
}
