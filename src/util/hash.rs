//! Fingerprinting of generation inputs.

use sha2::{Digest, Sha256};

/// A hasher for building fingerprints from multiple components.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component to the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0"); // Separator
        self
    }

    /// Add multiple strings to the fingerprint.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Add a length-prefixed byte component.
    pub fn update_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.hasher.update((data.len() as u64).to_le_bytes());
        self.hasher.update(data);
        self
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Finalize and return a short fingerprint (first 16 chars).
    pub fn finish_short(self) -> String {
        self.finish()[..16].to_string()
    }
}

/// Fingerprint of everything that determines one generated file.
///
/// Files contribute their name and content, never their absolute path, so
/// the same tree checked out in two places yields the same value.
pub fn input_fingerprint<'a>(
    files: impl IntoIterator<Item = (&'a str, &'a str)>,
    symbols: impl IntoIterator<Item = &'a str>,
    library: &str,
) -> String {
    let mut fp = Fingerprint::new();
    fp.update_str("library").update_str(library);
    fp.update_str("symbols").update_strs(symbols);
    fp.update_str("files");
    for (name, content) in files {
        fp.update_str(name).update_bytes(content.as_bytes());
    }
    fp.finish_short()
}
