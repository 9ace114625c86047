//! Change detection between local content and what the remote holds.
//!
//! Both sides are reduced to the same git blob fingerprint (SHA-1 over
//! `"blob <len>\0" ++ bytes`), so equality is exact and byte-for-byte.

use sha1::{Digest, Sha1};
use tracing::debug;

/// Hex git blob id of `content`. Matches `git hash-object` for the same bytes.
pub fn blob_fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Returns `true` when `local` must be uploaded: the remote is absent or holds
/// different bytes.
pub fn has_changed(local: &[u8], remote: Option<&[u8]>) -> bool {
    let Some(remote) = remote else {
        return true;
    };
    let local_fp = blob_fingerprint(local);
    let remote_fp = blob_fingerprint(remote);
    debug!(local = %local_fp, remote = %remote_fp, "[CHANGE] Compared fingerprints");
    local_fp != remote_fp
}
