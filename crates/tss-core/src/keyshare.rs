//! Key-share normalization
//!
//! Share material loaded from storage may carry each share as a generic
//! `{ data: [u8, ...] }` wrapper instead of the raw byte buffer the signing
//! routines require. `restore` collapses the wrapper; the coordinator calls
//! it defensively before every session, so it must be idempotent.

use crate::types::{Keychain, ShareBlob};
use tracing::debug;

/// Restore a keychain into the raw-binary form the signer requires.
///
/// Idempotent: applying it to already-raw material is a no-op.
pub fn restore(keychain: &Keychain) -> Keychain {
    Keychain {
        private_key_share: restore_blob(&keychain.private_key_share),
        reduced_private_key_share: restore_blob(&keychain.reduced_private_key_share),
    }
}

fn restore_blob(blob: &ShareBlob) -> ShareBlob {
    match blob {
        ShareBlob::Raw(bytes) => ShareBlob::Raw(bytes.clone()),
        ShareBlob::Wrapped { data } => {
            debug!(len = data.len(), "Restoring wrapped key share to raw bytes");
            ShareBlob::Raw(data.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapped_keychain() -> Keychain {
        Keychain {
            private_key_share: ShareBlob::Wrapped {
                data: vec![7; 32],
            },
            reduced_private_key_share: ShareBlob::Wrapped {
                data: vec![9; 32],
            },
        }
    }

    #[test]
    fn restore_unwraps_serialized_shares() {
        let restored = restore(&wrapped_keychain());
        assert!(restored.private_key_share.is_raw());
        assert!(restored.reduced_private_key_share.is_raw());
        assert_eq!(restored.private_key_share.as_bytes(), &[7u8; 32][..]);
        assert_eq!(restored.reduced_private_key_share.as_bytes(), &[9u8; 32][..]);
    }

    #[test]
    fn restore_is_idempotent() {
        let once = restore(&wrapped_keychain());
        let twice = restore(&once);
        assert_eq!(once.private_key_share, twice.private_key_share);
        assert_eq!(
            once.reduced_private_key_share,
            twice.reduced_private_key_share
        );
    }

    #[test]
    fn restore_preserves_raw_shares() {
        let keychain = Keychain {
            private_key_share: ShareBlob::Raw(vec![1, 2, 3]),
            reduced_private_key_share: ShareBlob::Raw(vec![4, 5, 6]),
        };
        let restored = restore(&keychain);
        assert_eq!(restored.private_key_share, keychain.private_key_share);
        assert_eq!(
            restored.reduced_private_key_share,
            keychain.reduced_private_key_share
        );
    }
}
