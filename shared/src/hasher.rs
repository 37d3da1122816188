use digest::Digest;
use sha1::Sha1;

/// SHA1 over a sequence of chunks, rendered as lowercase hex.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
    hasher: Sha1,
}

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn chain(mut self, data: impl AsRef<[u8]>) -> Self {
        Digest::update(&mut self.hasher, data);
        self
    }

    pub fn finalize_hex(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

pub fn sha1_hex(data: impl AsRef<[u8]>) -> String {
    Hasher::new().chain(data).finalize_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_digest() {
        assert_eq!(sha1_hex(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn known_digests() {
        assert_eq!(sha1_hex("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(
            sha1_hex("The quick brown fox jumps over the lazy dog"),
            "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12"
        );
    }

    #[test]
    fn chunks_are_concatenated() {
        let chained = Hasher::new().chain("The quick brown ").chain("fox jumps over the lazy dog");
        assert_eq!(
            chained.finalize_hex(),
            sha1_hex("The quick brown fox jumps over the lazy dog")
        );
    }
}
