use crate::ingest::IndexReport;
use crate::ui::output;
use crate::ui::progress_message::{ProgressMessage, ProgressPhase};
use crate::ui::theme;
use crate::ui::Icons;
use crate::DocumentStatus;
use indicatif::{HumanDuration, MultiProgress, ProgressBar};
use owo_colors::OwoColorize;
use std::thread;
use std::time::Duration;

/// Progress display for an indexing run, fed over a channel from the indexer
pub struct IndexProgress {
    mp: MultiProgress,
    handle: Option<thread::JoinHandle<()>>,
    tx: crossbeam::channel::Sender<ProgressMessage>,
}

fn visible(pb: ProgressBar) -> ProgressBar {
    if console::Term::stdout().is_term() {
        pb
    } else {
        ProgressBar::hidden()
    }
}

impl IndexProgress {
    pub fn new() -> (Self, crossbeam::channel::Sender<ProgressMessage>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();

        let mp = MultiProgress::new();
        let listing = visible(mp.add(ProgressBar::new_spinner().with_message("Listing bucket")));
        let indexing = visible(mp.add(ProgressBar::new(0).with_message("Indexing documents")));
        let pruning = visible(mp.add(ProgressBar::new_spinner().with_message("Pruning index")));
        let printer = mp.clone();

        let handle = thread::spawn(move || {
            for msg in rx {
                match msg {
                    ProgressMessage::Started { phase: ProgressPhase::Listing, .. } => {
                        listing.enable_steady_tick(Duration::from_millis(100));
                    }
                    ProgressMessage::Started { phase: ProgressPhase::Indexing, total } => {
                        indexing.set_length(total as u64);
                    }
                    ProgressMessage::Started { phase: ProgressPhase::Pruning, .. } => {
                        pruning.enable_steady_tick(Duration::from_millis(100));
                    }
                    ProgressMessage::Progress { phase: ProgressPhase::Indexing, current, key } => {
                        indexing.set_position(current as u64);
                        if let Some(ref k) = key {
                            indexing.set_message(format!("Indexing: {}", k));
                        }
                    }
                    ProgressMessage::Progress { .. } => {}
                    ProgressMessage::Finished { phase: ProgressPhase::Listing } => {
                        listing.finish_with_message("Listed");
                    }
                    ProgressMessage::Finished { phase: ProgressPhase::Indexing } => {
                        indexing.finish_with_message("Done");
                    }
                    ProgressMessage::Finished { phase: ProgressPhase::Pruning } => {
                        pruning.finish_with_message("Done");
                    }
                    ProgressMessage::Document { key, status, chunks } => {
                        printer.suspend(|| match status {
                            DocumentStatus::New => output::document_new(&key, chunks),
                            DocumentStatus::Modified => output::document_modified(&key, chunks),
                            DocumentStatus::Unchanged => output::document_unchanged(&key),
                            DocumentStatus::Unsupported => output::document_skipped(&key),
                        });
                    }
                    ProgressMessage::Removed(key) => {
                        printer.suspend(|| output::document_removed(&key));
                    }
                    ProgressMessage::Error(key, reason) => {
                        printer.suspend(|| output::document_failed(&key, &reason));
                    }
                    ProgressMessage::Exit => break,
                }
            }
        });

        (
            Self {
                mp,
                handle: Some(handle),
                tx: tx.clone(),
            },
            tx,
        )
    }

    /// Stop the display thread and print the run summary
    pub fn finish_with_summary(mut self, duration: Duration, report: &IndexReport) {
        self.tx.send(ProgressMessage::Exit).ok();
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
        self.mp.clear().ok();

        println!();
        println!(
            "{} {}",
            Icons::CHECK.style(theme().success.clone()),
            format!("Complete in {}", HumanDuration(duration)).style(theme().success.clone())
        );
        println!(
            "  {} {}  {} {}  {} {}",
            Icons::FILE.style(theme().info.clone()),
            report.indexed,
            Icons::PACKAGE.style(theme().info.clone()),
            report.chunks,
            Icons::DEL.style(theme().info.clone()),
            report.removed
        );
    }
}

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_message(message.to_string());
        if console::Term::stdout().is_term() {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        Self { pb }
    }

    pub fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }
}
