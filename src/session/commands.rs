//! Command queue for session mutation
//!
//! Edits coming from interactive surfaces (label keystrokes, type menu
//! changes, deletions) are queued as explicit commands and applied in order
//! through the store's guarded operations, instead of mutating regions from
//! inside event callbacks.

use crate::session::region::RegionId;
use crate::session::store::ImageSession;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashSet;
use tracing::warn;

/// One queued mutation against the annotation store
#[derive(Debug, Clone)]
pub enum SessionCommand {
    SetLabel { id: RegionId, text: String },
    SetType { id: RegionId, tag: String },
    Select(Vec<RegionId>),
    Deselect(Vec<RegionId>),
    SelectAll,
    DeselectAll,
    Remove(HashSet<RegionId>),
}

/// Unbounded queue of pending session commands
#[derive(Debug)]
pub struct CommandQueue {
    tx: Sender<SessionCommand>,
    rx: Receiver<SessionCommand>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// A cloneable sender for producers on other threads
    pub fn sender(&self) -> Sender<SessionCommand> {
        self.tx.clone()
    }

    pub fn push(&self, command: SessionCommand) {
        // Send on an unbounded channel only fails when the queue itself is
        // gone, which cannot happen while `self` holds the receiver.
        let _ = self.tx.send(command);
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Apply every pending command to the session, in arrival order.
    /// Commands addressing vanished regions are logged and dropped.
    /// Returns the number of commands applied.
    pub fn drain(&self, session: &ImageSession) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.rx.try_recv() {
            match command {
                SessionCommand::SetLabel { id, text } => {
                    if let Err(e) = session.set_label(id, text) {
                        warn!("dropping label edit: {e}");
                        continue;
                    }
                }
                SessionCommand::SetType { id, tag } => {
                    if let Err(e) = session.set_type(id, tag) {
                        warn!("dropping type edit: {e}");
                        continue;
                    }
                }
                SessionCommand::Select(ids) => session.select(&ids),
                SessionCommand::Deselect(ids) => session.deselect(&ids),
                SessionCommand::SelectAll => session.select_all(),
                SessionCommand::DeselectAll => session.deselect_all(),
                SessionCommand::Remove(ids) => {
                    session.remove(&ids);
                }
            }
            applied += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoomConfig;
    use crate::geometry::Quad;

    fn session() -> ImageSession {
        ImageSession::new(
            "/tmp/images/doc.png",
            (100, 100),
            "hash",
            1.0,
            ZoomConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_commands_apply_in_order() {
        let s = session();
        let id = s.add(Quad([[0, 0], [10, 0], [10, 10], [0, 10]]), "words", "");

        let queue = CommandQueue::new();
        queue.push(SessionCommand::SetLabel {
            id,
            text: "first".to_string(),
        });
        queue.push(SessionCommand::SetLabel {
            id,
            text: "second".to_string(),
        });
        queue.push(SessionCommand::SetType {
            id,
            tag: "amounts".to_string(),
        });

        assert_eq!(queue.drain(&s), 3);
        assert!(queue.is_empty());

        let region = &s.regions()[0];
        assert_eq!(region.label, "second");
        assert_eq!(region.type_tag, "amounts");
    }

    #[test]
    fn test_commands_for_vanished_regions_are_dropped() {
        let s = session();
        let queue = CommandQueue::new();
        queue.push(SessionCommand::SetLabel {
            id: RegionId::new_v4(),
            text: "orphan".to_string(),
        });
        assert_eq!(queue.drain(&s), 0);
    }

    #[test]
    fn test_selection_and_removal_commands() {
        let s = session();
        let a = s.add(Quad([[0, 0], [10, 0], [10, 10], [0, 10]]), "words", "");
        let b = s.add(Quad([[20, 0], [30, 0], [30, 10], [20, 10]]), "words", "");

        let queue = CommandQueue::new();
        queue.push(SessionCommand::SelectAll);
        queue.push(SessionCommand::Deselect(vec![b]));
        queue.drain(&s);
        assert_eq!(s.selected_regions().len(), 1);

        queue.push(SessionCommand::Remove([a].into_iter().collect()));
        queue.drain(&s);
        assert_eq!(s.len(), 1);
        assert_eq!(s.regions()[0].id, b);
    }

    #[test]
    fn test_sender_feeds_queue_from_elsewhere() {
        let s = session();
        let id = s.add(Quad([[0, 0], [10, 0], [10, 10], [0, 10]]), "words", "");
        let queue = CommandQueue::new();
        let sender = queue.sender();
        sender
            .send(SessionCommand::SetLabel {
                id,
                text: "via sender".to_string(),
            })
            .unwrap();
        assert_eq!(queue.drain(&s), 1);
        assert_eq!(s.regions()[0].label, "via sender");
    }
}
