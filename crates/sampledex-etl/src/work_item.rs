use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use treadle::WorkItem;

const ID_PREFIX: &str = "index:";

/// A sample folder being indexed.
///
/// This is the treadle `WorkItem` that flows through the index workflow.
/// The id is derived from the folder path, so the pipeline state holds one
/// row per folder and the index stage reads the folder back from the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFolder {
    id: String,
}

impl SampleFolder {
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            id: format!("{ID_PREFIX}{}", path.display()),
        }
    }

    /// The folder named by a work item id, if it is a sample folder id.
    pub fn path_from_id(id: &str) -> Option<PathBuf> {
        id.strip_prefix(ID_PREFIX)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
    }

    /// Root of the folder tree to index.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.id[ID_PREFIX.len()..])
    }
}

impl WorkItem for SampleFolder {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for SampleFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}
