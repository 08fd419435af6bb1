//! Choosing how a read is served.
//!
//! The reader tracks two positions: `afp`, where the caller is, and `fp`,
//! how far the sequential decoder has consumed. [`classify`] is a pure
//! function of both (plus the prefix cache and mark window) that picks the
//! cheapest way to serve a request.

/// How `afp` relates to the decoder pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Synced,
    /// The caller is past the decoder; it can skip forward.
    AheadOfDecoder,
    /// The caller is behind the decoder; only the mark window can rewind it.
    BehindDecoder,
}

impl CursorState {
    pub fn of(afp: u64, fp: u64) -> Self {
        match afp.cmp(&fp) {
            std::cmp::Ordering::Equal => CursorState::Synced,
            std::cmp::Ordering::Greater => CursorState::AheadOfDecoder,
            std::cmp::Ordering::Less => CursorState::BehindDecoder,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPath {
    /// Copy from the decoded prefix cache.
    Prefix,
    /// Advance or rewind the sequential decoder.
    Sequential,
    /// Seek the store itself.
    Direct,
}

/// The decoder's cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderCursor {
    pub fp: u64,
    /// Oldest position the decoder can rewind to.
    pub mark: u64,
}

/// Everything [`classify`] looks at.
#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub afp: u64,
    pub len: u64,
    pub compressed: bool,
    /// Length of the decoded prefix, if one is cached.
    pub prefix_len: Option<u64>,
    pub max_overhead: u64,
    /// `None` when no sequential decoder is attached.
    pub decoder: Option<DecoderCursor>,
}

pub fn classify(req: &Request) -> ReadPath {
    if req.compressed {
        if let Some(prefix_len) = req.prefix_len {
            let end = req.afp.saturating_add(req.len);
            if end <= req.max_overhead.min(prefix_len) {
                return ReadPath::Prefix;
            }
        }
    }

    if let Some(decoder) = req.decoder {
        let reachable = match CursorState::of(req.afp, decoder.fp) {
            CursorState::Synced | CursorState::AheadOfDecoder => true,
            CursorState::BehindDecoder => req.afp >= decoder.mark,
        };
        if reachable {
            return ReadPath::Sequential;
        }
    }

    ReadPath::Direct
}
