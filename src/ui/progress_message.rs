use crate::DocumentStatus;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProgressPhase {
    Listing,
    Indexing,
    Pruning,
}

#[derive(Clone, Debug)]
pub enum ProgressMessage {
    Started {
        phase: ProgressPhase,
        total: usize,
    },
    Progress {
        phase: ProgressPhase,
        current: usize,
        key: Option<String>,
    },
    Finished {
        phase: ProgressPhase,
    },
    Document {
        key: String,
        status: DocumentStatus,
        chunks: usize,
    },
    Removed(String),
    Error(String, String),
    Exit,
}
