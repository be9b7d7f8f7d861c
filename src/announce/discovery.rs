use tracing::debug;
use crate::announce::codec::{decode_announce_list, encode_announce_list, ANNOUNCE_MAX_SIZE};
use crate::announce::store::AnnounceStore;
use crate::announce::types::{Announce, ChatId, PublicKey};
use crate::error::AnnounceError;

/// Builds the payload of a discovery response: the freshest usable announces the store knows
///  for the group, excluding the requester itself. Returns `None` if there is nothing to
///  disclose.
pub fn build_announce_response(store: &AnnounceStore, chat_id: &ChatId, requester: &PublicKey) -> Result<Option<Vec<u8>>, AnnounceError> {
    let max_sent = store.config().max_sent_announces;

    let announces = store.select_usable(chat_id, requester, max_sent)?;

    if announces.is_empty() {
        debug!("no announces to disclose for {:?} to {:?}", chat_id, requester);
        return Ok(None);
    }

    let mut buf = vec![0u8; announces.len() * ANNOUNCE_MAX_SIZE];
    let len = encode_announce_list(&mut buf, &announces)?;
    buf.truncate(len);
    Ok(Some(buf))
}

/// Parses a discovery response, keeping only announces that can actually be used to establish
///  contact. A corrupt entry ends parsing, but the announces before it are kept.
pub fn parse_announce_response(payload: &[u8], max_count: usize) -> Result<Vec<Announce>, AnnounceError> {
    let decoded = decode_announce_list(payload, max_count)?;

    if decoded.consumed < payload.len() {
        debug!("discovery response: {} of {} bytes parsed", decoded.consumed, payload.len());
    }

    Ok(decoded.announces
        .into_iter()
        .filter(Announce::is_valid)
        .collect())
}
