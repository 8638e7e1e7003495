use crate::READY;

/// Finds the [`READY`] acknowledgment in a stream of bytes.
///
/// Bytes are pushed one at a time; anything that isn't part of an
/// acknowledgment is skipped.
#[derive(Clone, Debug, Default)]
pub struct AckMatcher {
    matched: usize,
}

impl AckMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a single incoming byte. Returns `true` if it completed an acknowledgment.
    pub fn push(&mut self, byte: u8) -> bool {
        if byte == READY[self.matched] {
            self.matched += 1;
        } else {
            // The only repeated byte in READY is the newline it starts and ends with,
            // so a mismatch can only restart a match at the very beginning.
            self.matched = usize::from(byte == READY[0]);
        }

        if self.matched == READY.len() {
            self.matched = 0;
            true
        } else {
            false
        }
    }

    /// Whether we're part-way through an acknowledgment.
    pub fn is_partial(&self) -> bool {
        self.matched > 0
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    fn count_acks(bytes: &[u8]) -> usize {
        let mut m = AckMatcher::new();
        bytes.iter().filter(|&&b| m.push(b)).count()
    }

    #[test]
    fn exact_ack() {
        assert_eq!(count_acks(&READY), 1);
    }

    #[test]
    fn back_to_back_acks() {
        let mut bytes = READY.to_vec();
        bytes.extend_from_slice(&READY);
        assert_eq!(count_acks(&bytes), 2);
    }

    #[test]
    fn ack_after_noise() {
        let mut bytes = b"boot\n\nV".to_vec();
        bytes.extend_from_slice(&READY);
        assert_eq!(count_acks(&bytes), 1);
    }

    #[test]
    fn truncated_ack() {
        let mut m = AckMatcher::new();
        for &b in &READY[..4] {
            assert!(!m.push(b));
        }
        assert!(m.is_partial());
        assert!(!m.push(b'x'));
        assert!(!m.is_partial());
    }
}
