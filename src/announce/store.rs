use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};
use crate::announce::types::{Announce, ChatId, PeerAnnounce, PublicAnnounce, PublicKey};
use crate::config::AnnounceConfig;
use crate::error::AnnounceError;
use crate::safe_converter::{PrecheckedCast, SafeCast};

/// One group's announce history: a fixed-capacity ring of announces, overwriting the oldest
///  slot once it is full
pub struct AnnounceGroupEntry {
    chat_id: ChatId,
    slots: Vec<Option<PeerAnnounce>>,
    /// total number of insertions - modulo capacity, this is the next slot to write
    insertion_count: u64,
    last_insertion: u64,
}

impl AnnounceGroupEntry {
    fn new(chat_id: ChatId, capacity: usize) -> AnnounceGroupEntry {
        AnnounceGroupEntry {
            chat_id,
            slots: vec![None; capacity.max(1)],
            insertion_count: 0,
            last_insertion: 0,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn insertion_count(&self) -> u64 {
        self.insertion_count
    }

    pub fn last_insertion(&self) -> u64 {
        self.last_insertion
    }

    pub fn num_live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn slot_index(&self, insertion: u64) -> usize {
        let capacity: u64 = self.slots.len().safe_cast();
        (insertion % capacity).prechecked_cast()
    }

    fn insert(&mut self, now: u64, announce: Announce) -> &PeerAnnounce {
        let idx = self.slot_index(self.insertion_count);
        self.insertion_count += 1;
        self.last_insertion = now;

        self.slots[idx].insert(PeerAnnounce {
            announce,
            received_at: now,
        })
    }

    /// live slots, most recently inserted first
    fn newest_first(&self) -> impl Iterator<Item = &PeerAnnounce> + '_ {
        let capacity: u64 = self.slots.len().safe_cast();
        let num_written = self.insertion_count.min(capacity);
        (1..=num_written)
            .map(move |back| self.slot_index(self.insertion_count - back))
            .filter_map(move |idx| self.slots[idx].as_ref())
    }
}

/// Cache of recently seen announces, per group. This is used to answer discovery queries for
///  groups the local node is part of, or for which it is a DHT node close to the chat id.
///
/// The store has no internal locking. If it is shared between threads, it must be guarded as a
///  whole, since an entry's insertion counter and the slot it points to are updated together.
pub struct AnnounceStore {
    config: AnnounceConfig,
    entries: FxHashMap<ChatId, AnnounceGroupEntry>,
}

impl AnnounceStore {
    pub fn new(config: AnnounceConfig) -> AnnounceStore {
        AnnounceStore {
            config,
            entries: FxHashMap::default(),
        }
    }

    pub fn config(&self) -> &AnnounceConfig {
        &self.config
    }

    /// number of groups with a live entry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, chat_id: &ChatId) -> Option<&AnnounceGroupEntry> {
        self.entries.get(chat_id)
    }

    /// Stores an announce in its group's history, creating the entry on first use. There is no
    ///  deduplication: re-announcing a peer adds a new slot, and the peer's older slots stay
    ///  until they are overwritten.
    pub fn insert(&mut self, now: u64, public_announce: PublicAnnounce) -> &PeerAnnounce {
        let PublicAnnounce { chat_id, announce } = public_announce;
        let capacity = self.config.max_saved_announces_per_group;

        trace!("storing announce from {:?} for {:?}", announce.peer_public_key, chat_id);

        self.entries.entry(chat_id)
            .or_insert_with(|| {
                debug!("creating announce entry for {:?}", chat_id);
                AnnounceGroupEntry::new(chat_id, capacity)
            })
            .insert(now, announce)
    }

    /// Returns up to `max_results` announces for a group, distinct by peer public key and
    ///  excluding `except`. Slots are scanned from newest to oldest, so for a peer with several
    ///  slots the most recent one wins.
    ///
    /// NB: Announces without any contact information are returned as well - callers need to
    ///      check `Announce::is_valid()` before trying to use them, or use `select_usable`
    pub fn select(&self, chat_id: &ChatId, except: &PublicKey, max_results: usize) -> Result<Vec<Announce>, AnnounceError> {
        self.select_matching(chat_id, except, max_results, |_| true)
    }

    /// Like `select`, but skips announces without contact information during the scan, so they
    ///  do not count against `max_results`. For a peer with several slots, the most recent
    ///  usable one wins.
    pub fn select_usable(&self, chat_id: &ChatId, except: &PublicKey, max_results: usize) -> Result<Vec<Announce>, AnnounceError> {
        self.select_matching(chat_id, except, max_results, Announce::is_valid)
    }

    fn select_matching(&self, chat_id: &ChatId, except: &PublicKey, max_results: usize, predicate: impl Fn(&Announce) -> bool) -> Result<Vec<Announce>, AnnounceError> {
        if max_results == 0 {
            return Err(AnnounceError::InvalidArgument("zero max results"));
        }

        let entry = match self.entries.get(chat_id) {
            None => return Ok(Vec::new()),
            Some(entry) => entry,
        };

        //TODO selection policy is plain recency - consider preferring peers with a direct address
        let mut seen = FxHashSet::default();
        let result = entry.newest_first()
            .map(|peer_announce| &peer_announce.announce)
            .filter(|announce| &announce.peer_public_key != except)
            .filter(|announce| predicate(announce))
            .filter(|announce| seen.insert(announce.peer_public_key))
            .take(max_results)
            .cloned()
            .collect();
        Ok(result)
    }

    /// Drops every group entry that did not receive an announce for the configured expiry
    ///  period. This is per group, not per announce: a single fresh announce keeps all of the
    ///  group's history alive.
    pub fn expire(&mut self, now: u64) {
        let expiry: u64 = self.config.announce_expiry.as_millis()
            .try_into()
            .unwrap_or(u64::MAX);

        self.entries.retain(|chat_id, entry| {
            let is_expired = now.saturating_sub(entry.last_insertion) >= expiry;
            if is_expired {
                debug!("announce entry for {:?} expired", chat_id);
            }
            !is_expired
        });
    }

    /// Drops a group's entry immediately, e.g. when leaving the group. Returns whether there was
    ///  an entry.
    pub fn release(&mut self, chat_id: &ChatId) -> bool {
        let released = self.entries.remove(chat_id).is_some();
        if released {
            debug!("released announce entry for {:?}", chat_id);
        }
        released
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
