use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use treadle::{StateStore, Workflow};

use crate::embed::Embedder;
use crate::index::{IndexOptions, IndexReport, IndexStage};
use crate::work_item::SampleFolder;

/// File name of the pipeline state store inside a sample database.
pub const PIPELINE_STATE_FILE: &str = "pipeline.db";

/// Build the index workflow for one sample database.
///
/// The folder to index comes from the work item. Returns the workflow and a
/// handle that holds the index report once the workflow has advanced.
///
/// # Errors
/// Returns an error if the workflow cannot be built.
pub fn build_index_pipeline(
    db_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    options: IndexOptions,
) -> treadle::Result<(Workflow, Arc<Mutex<IndexReport>>)> {
    let index_stage = IndexStage::new(db_dir, embedder, options);
    let report = index_stage.report_handle();

    let workflow = Workflow::builder().stage("index", index_stage).build()?;
    Ok((workflow, report))
}

/// Run the workflow over `folder`, starting from a clean state.
///
/// A folder keeps a single state row, so earlier runs are cleared first and
/// the index stage always executes.
///
/// # Errors
/// Returns an error if the state store fails or the index stage fails.
pub async fn advance_folder<S: StateStore>(
    workflow: &Workflow,
    state: &mut S,
    folder: &SampleFolder,
) -> treadle::Result<()> {
    state.delete_work_item(treadle::WorkItem::id(folder)).await?;
    workflow.advance(folder, state).await
}
