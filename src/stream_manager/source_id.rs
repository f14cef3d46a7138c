use regex::Regex;
use smol_str::SmolStr;

use crate::media_stream::MediaStream;
use crate::stream_manager::RemoteSourceFn;

lazy_static! {
    /// Trailing decimal component of a transport-assigned stream id.
    static ref TRAILING_DIGITS: Regex = Regex::new(r"(\d+)$").unwrap();
}

/// local_source_id derives the source identifier of a locally captured
/// stream: its explicit source label when one was assigned, else its raw id.
pub(crate) fn local_source_id(stream: &(dyn MediaStream + Send + Sync)) -> SmolStr {
    match stream.source_label() {
        Some(label) => SmolStr::new(label),
        None => SmolStr::new(stream.id()),
    }
}

/// remote_source_id derives the source identifier of a remote stream by
/// mapping the numeric suffix of its transport id through the negotiation
/// layer. An id without a numeric suffix falls back to the raw id, so both
/// registrations of one physical source resolve to the same identifier.
pub(crate) fn remote_source_id(
    stream: &(dyn MediaStream + Send + Sync),
    remote_source_fn: &RemoteSourceFn,
) -> SmolStr {
    let raw = stream.id();
    match numeric_suffix(raw) {
        Some(numeric) => remote_source_fn(numeric),
        None => {
            log::trace!("stream id {} carries no numeric suffix, using raw id", raw);
            SmolStr::new(raw)
        }
    }
}

pub(crate) fn numeric_suffix(raw: &str) -> Option<u64> {
    TRAILING_DIGITS
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse::<u64>().ok())
}
