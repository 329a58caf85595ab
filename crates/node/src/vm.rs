//! VM slots: each slot owns a range of chains for message processing.

use factom_blocks::blocks::DirectoryBlockHeader;

/// One virtual-machine slot. Slots are assigned hashes by the blockchain
/// and rotated at minute boundaries.
#[derive(Debug, Clone)]
pub struct Vm {
    initial_header: DirectoryBlockHeader,
}

impl Vm {
    /// Creates a slot anchored at the header current when it was spun up.
    pub fn new(initial_header: DirectoryBlockHeader) -> Self {
        Vm { initial_header }
    }

    /// The directory-block header this slot was anchored at.
    pub fn header(&self) -> &DirectoryBlockHeader {
        &self.initial_header
    }
}
