use std::fmt;

use sha2::{Digest, Sha256};

use crate::handle::ExternalRef;

/// Digest of a set of captured handles, used to notice when the host swapped a
/// model out from under a resolved record without telling anyone.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of_refs<'a>(refs: impl IntoIterator<Item = Option<&'a ExternalRef>>) -> Self {
        let mut hasher = Sha256::new();
        for reference in refs {
            match reference {
                Some(reference) => {
                    hasher.update([1u8]);
                    hasher.update(reference.handle.raw().to_le_bytes());
                    hasher.update(reference.tag.0.as_bytes());
                }
                None => hasher.update([0u8]),
            }
            hasher.update([0xffu8]);
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        to_hex_lower(&self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
