//! The bounded FIFO between the display operations and the transmission scheduler.

use crate::lcd::hd44780::{LcdError, LcdResult};
use heapless::Deque;
use std::fmt::{Display, Formatter};

/// Default number of queued transmissions.
///
/// Each pending byte used to take two slots of a 256-byte buffer (tag and payload), so 128
/// entries hold the same backlog.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Tag byte marking an instruction in the tagged two-byte form.
pub const TAG_COMMAND: u8 = 0x40;
/// Tag byte marking a character in the tagged two-byte form.
pub const TAG_DATA: u8 = 0x80;

/// One byte waiting to be sent to the controller, either to the instruction register or to the
/// data register.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum QueueEntry {
    /// Sent with RS low.
    Command(u8),
    /// Sent with RS high.
    Data(u8),
}

impl QueueEntry {
    /// Decodes an entry from its tagged two-byte form (`tag`, `payload`).
    ///
    /// # Errors
    /// - [LcdError::ProtocolFault] if `tag` is neither [TAG_COMMAND] nor [TAG_DATA].
    pub fn from_tagged(tag: u8, payload: u8) -> LcdResult<Self> {
        match tag {
            TAG_COMMAND => Ok(QueueEntry::Command(payload)),
            TAG_DATA => Ok(QueueEntry::Data(payload)),
            _ => Err(LcdError::ProtocolFault(format!(
                "tag {:#04x} is neither data nor command",
                tag
            ))),
        }
    }

    /// Gets the tag byte of the tagged two-byte form.
    pub fn tag(&self) -> u8 {
        match self {
            QueueEntry::Command(_) => TAG_COMMAND,
            QueueEntry::Data(_) => TAG_DATA,
        }
    }

    pub fn payload(&self) -> u8 {
        match *self {
            QueueEntry::Command(byte) | QueueEntry::Data(byte) => byte,
        }
    }

    /// Gets the level of the RS line this entry is sent with.
    pub fn register_select(&self) -> bool {
        matches!(self, QueueEntry::Data(_))
    }

    /// Splits the payload into the two nibbles of a 4-bit transfer, high nibble first.
    pub fn nibbles(&self) -> [u8; 2] {
        let byte = self.payload();
        [(byte >> 4) & 0x0F, byte & 0x0F]
    }
}

impl Display for QueueEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueEntry::Command(byte) => write!(f, "command {:#04x}", byte),
            QueueEntry::Data(byte) if byte.is_ascii_graphic() || *byte == b' ' => {
                write!(f, "data {:#04x} ({:?})", byte, *byte as char)
            }
            QueueEntry::Data(byte) => write!(f, "data {:#04x}", byte),
        }
    }
}

/// Bounded first-in-first-out queue of [QueueEntry] values.
///
/// The capacity is fixed by the `N` parameter. A full queue rejects new entries and leaves the
/// queued ones untouched and in order.
#[derive(Debug, Clone)]
pub struct CommandQueue<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    entries: Deque<QueueEntry, N>,
}

impl<const N: usize> CommandQueue<N> {
    pub const fn new() -> Self {
        CommandQueue {
            entries: Deque::new(),
        }
    }

    /// Appends an entry at the tail.
    ///
    /// # Errors
    /// - [LcdError::QueueFull] if there is no free slot left.
    pub fn enqueue(&mut self, entry: QueueEntry) -> LcdResult<()> {
        self.entries
            .push_back(entry)
            .map_err(|_| LcdError::QueueFull)
    }

    /// Appends all `entries`, or none of them if they do not all fit.
    ///
    /// A multi-byte operation (a string, a repeated shift) is never left half-queued.
    pub fn enqueue_all<I>(&mut self, entries: I) -> LcdResult<()>
    where
        I: IntoIterator<Item = QueueEntry>,
        I::IntoIter: ExactSizeIterator,
    {
        let entries = entries.into_iter();
        if entries.len() > self.remaining() {
            return Err(LcdError::QueueFull);
        }
        for entry in entries {
            self.enqueue(entry)?;
        }
        Ok(())
    }

    /// Removes and returns the head entry.
    pub fn dequeue(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    pub fn peek(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Gets the number of free slots.
    pub fn remaining(&self) -> usize {
        N - self.entries.len()
    }

    /// Drops every pending entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates over the pending entries, head first.
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }
}

impl<const N: usize> Default for CommandQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
