use bytes::Bytes;
use crate::channel::sequence::SequenceNumber;
use crate::safe_converter::{PrecheckedCast, SafeCast};

/// A buffered packet, either sent and awaiting acknowledgement, or received out of order and
///  awaiting delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSlot {
    pub sequence: SequenceNumber,
    pub packet_type: u8,
    pub payload: Bytes,
    pub inserted_at: u64,
    /// time of the last (re-)transmission, `None` if the packet was never retransmitted
    pub last_attempt: Option<u64>,
}

/// Fixed-capacity ring of slots addressed by `sequence % capacity`. Each occupied slot carries
///  its sequence number, so a lookup for a sequence that maps to a slot holding a different
///  (stale or newer) sequence is a miss rather than a false hit.
pub struct SlotWindow {
    slots: Vec<Option<ChannelSlot>>,
    num_occupied: usize,
}

impl SlotWindow {
    pub fn new(capacity: u32) -> SlotWindow {
        let capacity: usize = capacity.max(1).safe_cast();
        SlotWindow {
            slots: vec![None; capacity],
            num_occupied: 0,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.slots.len().safe_cast()
    }

    pub fn len(&self) -> usize {
        self.num_occupied
    }

    pub fn is_empty(&self) -> bool {
        self.num_occupied == 0
    }

    fn index(&self, sequence: SequenceNumber) -> usize {
        (sequence.to_raw() % self.capacity()).prechecked_cast()
    }

    pub fn contains(&self, sequence: SequenceNumber) -> bool {
        self.get(sequence).is_some()
    }

    pub fn get(&self, sequence: SequenceNumber) -> Option<&ChannelSlot> {
        self.slots[self.index(sequence)]
            .as_ref()
            .filter(|slot| slot.sequence == sequence)
    }

    /// Stores a slot at the position for its sequence number, returning the previous occupant
    ///  of that position - regardless of its sequence number
    pub fn insert(&mut self, slot: ChannelSlot) -> Option<ChannelSlot> {
        let idx = self.index(slot.sequence);
        let previous = self.slots[idx].replace(slot);
        if previous.is_none() {
            self.num_occupied += 1;
        }
        previous
    }

    /// Removes and returns the slot for a sequence number, if it is present
    pub fn remove(&mut self, sequence: SequenceNumber) -> Option<ChannelSlot> {
        let idx = self.index(sequence);
        if !matches!(&self.slots[idx], Some(slot) if slot.sequence == sequence) {
            return None;
        }

        self.num_occupied -= 1;
        self.slots[idx].take()
    }

    pub fn get_mut(&mut self, sequence: SequenceNumber) -> Option<&mut ChannelSlot> {
        let idx = self.index(sequence);
        self.slots[idx]
            .as_mut()
            .filter(|slot| slot.sequence == sequence)
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.num_occupied = 0;
    }
}
