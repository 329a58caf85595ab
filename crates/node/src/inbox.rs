//! The typed message inbox.
//!
//! External collaborators (gossip, RPC, timers) submit work through a
//! bounded channel; the blockchain drains it one message at a time, each
//! executed synchronously to completion.

use factom_blocks::block_elements::{AdminMessage, Entry, FactoidTransaction};
use factom_blocks::blocks::EcObject;
use factom_blocks::FullBlockSet;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

/// One unit of work for the blockchain loop.
#[derive(Debug, Clone)]
pub enum NodeMessage {
    /// A factoid transaction to stage.
    FactoidTransaction(FactoidTransaction),
    /// A commit or balance increase to stage.
    Commit(EcObject),
    /// A revealed entry to persist and stage.
    Entry(Entry),
    /// An admin message to stage.
    AdminMessage(AdminMessage),
    /// A minute boundary from the embedding runtime's clock.
    SealMinute,
    /// A block set synced from a peer.
    BlockSet(Box<FullBlockSet>),
}

/// A dequeue feeding the blockchain loop. `None` ends the loop.
pub trait MessageSource {
    /// Blocks until the next message, or `None` when the source is
    /// exhausted.
    fn next(&mut self) -> Option<NodeMessage>;
}

/// A [`MessageSource`] over the receiving end of a bounded channel. The
/// loop ends when every sender is dropped.
pub struct ChannelSource {
    receiver: Receiver<NodeMessage>,
}

impl ChannelSource {
    /// Wraps a receiver.
    pub fn new(receiver: Receiver<NodeMessage>) -> Self {
        ChannelSource { receiver }
    }
}

impl MessageSource for ChannelSource {
    fn next(&mut self) -> Option<NodeMessage> {
        self.receiver.recv().ok()
    }
}

/// Creates a bounded inbox: senders block once `capacity` messages are
/// in flight, giving collaborators backpressure.
pub fn bounded_inbox(capacity: usize) -> (SyncSender<NodeMessage>, ChannelSource) {
    let (sender, receiver) = sync_channel(capacity);
    (sender, ChannelSource::new(receiver))
}
