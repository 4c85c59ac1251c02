use docdb_session::{EventEmitter, SessionEvent};

/// Prints session progress as human-readable lines on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleEmitter;

impl ConsoleEmitter {
    /// The console line for `event`, if it has one.
    pub fn line(event: &SessionEvent) -> Option<String> {
        let line = match *event {
            SessionEvent::Connecting {
                ..
            } => "Connecting to DocumentDB...".to_owned(),
            SessionEvent::Connected => "Successfully connected to DocumentDB!".to_owned(),
            SessionEvent::CreatingIndex {
                ..
            } => "Creating index...".to_owned(),
            SessionEvent::IndexCreated {
                ref field,
                ..
            } => format!("Index created on '{}' field.", field),
            SessionEvent::Inserting => "Inserting document...".to_owned(),
            SessionEvent::Inserted {
                ref id,
            } => format!("Inserted ID: {}", id),
            SessionEvent::Updating => "Updating document...".to_owned(),
            SessionEvent::Updated {
                modified,
                ..
            } => format!("Updated count: {}", modified),
            SessionEvent::Deleting => "Deleting document...".to_owned(),
            SessionEvent::Deleted {
                deleted,
            } => format!("Deleted count: {}", deleted),
            SessionEvent::Completed => "All operations completed successfully!".to_owned(),
            SessionEvent::Released => return None,
        };
        Some(line)
    }
}

impl EventEmitter for ConsoleEmitter {
    fn emit_event(&self, event: SessionEvent) {
        if let Some(line) = Self::line(&event) {
            #[allow(clippy::print_stdout, reason = "CLI output")]
            {
                println!("{}", line);
            }
        }
    }
}
