//! Background task that records engine events into the journal and echoes
//! the interesting ones to the terminal.

use std::sync::{Arc, Mutex};

use forage_core::{GatherEvent, GatherListener, Journal};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

pub type SharedJournal = Arc<Mutex<Journal>>;

pub fn spawn_journal_printer(
    mut rx: broadcast::Receiver<GatherEvent>,
    journal: SharedJournal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Journal printer fell behind");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if let Ok(mut journal) = journal.lock() {
                journal.on_event(&event);
            }

            // Rejections are already reported by the command that caused them
            if matches!(event, GatherEvent::Rejected(_)) {
                continue;
            }
            if let Some(line) = event.journal_line() {
                println!("\n* {line}");
            }
        }
    })
}

/// Journal entries formatted one per line, oldest first
pub fn render_journal(journal: &Journal) -> String {
    if journal.is_empty() {
        return "Journal is empty".to_string();
    }
    journal
        .entries()
        .map(|entry| format!("[{}] {}", entry.timestamp.format("%H:%M:%S"), entry.message))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use forage_core::ResourceId;

    #[tokio::test]
    async fn test_printer_records_journal_lines() {
        let (tx, rx) = broadcast::channel(16);
        let journal: SharedJournal = Arc::new(Mutex::new(Journal::default()));
        let task = spawn_journal_printer(rx, Arc::clone(&journal));

        tx.send(GatherEvent::ProgressChanged {
            resource: ResourceId::from("clay"),
            progress: 3,
        })
        .unwrap();
        tx.send(GatherEvent::CycleCompleted { cycles_completed: 1 })
            .unwrap();
        drop(tx);
        task.await.unwrap();

        let journal = journal.lock().unwrap();
        assert_eq!(journal.len(), 1);
        let rendered = render_journal(&journal);
        assert!(rendered.ends_with("Auto-gather cycle 1 complete"));
    }

    #[test]
    fn test_empty_journal() {
        assert_eq!(render_journal(&Journal::default()), "Journal is empty");
    }
}
