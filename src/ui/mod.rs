pub mod icons;
pub mod output;
pub mod progress;
pub mod progress_message;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    answer, dim, document_failed, document_modified, document_new, document_removed,
    document_skipped, document_unchanged, header, info, muted, section, source, success,
    summary_row, warn,
};
pub use progress::{IndexProgress, Spinner};
pub use progress_message::{ProgressMessage, ProgressPhase};
pub use table::{documents_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
