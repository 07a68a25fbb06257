//! Response decoder module
//!
//! Extracts the item records of one page from a JSON response body.
//!
//! # Overview
//!
//! Provider list responses wrap their items in an envelope
//! (`{"servers": [...], "next_marker": "..."}`). The decoder pulls the item
//! array out by path; the pagination strategy reads the marker from the
//! same body.

mod decoders;
mod types;

pub use decoders::{lookup, lookup_string, JsonDecoder};
pub use types::RecordDecoder;

#[cfg(test)]
mod tests;
