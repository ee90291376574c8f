//! Stage-completion checklist for a session.

/// Monotonic bitmask recording which protocol stages the server has
/// confirmed. Bits are only ever added, never cleared; the engine uses it
/// for introspection and diagnostics, not for control decisions.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct ProtocolProgress(u32);

impl ProtocolProgress {
    /// Server greeting accepted.
    pub const CONNECT: Self = Self(1);
    /// EHLO confirmed.
    pub const EHLO: Self = Self(1 << 1);
    /// Authentication completed.
    pub const AUTH: Self = Self(1 << 2);
    /// MAIL FROM accepted.
    pub const MAIL: Self = Self(1 << 3);
    /// Every RCPT TO accepted.
    pub const RCPT: Self = Self(1 << 4);
    /// DATA go-ahead received.
    pub const DATA: Self = Self(1 << 5);
    /// Message payload accepted.
    pub const MESSAGE: Self = Self(1 << 6);
    /// QUIT confirmed.
    pub const QUIT: Self = Self(1 << 7);

    /// The empty checklist.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Adds the given stage bits.
    pub const fn insert(&mut self, stage: Self) {
        self.0 |= stage.0;
    }

    /// Returns true if every bit of `stage` has been recorded.
    #[must_use]
    pub const fn contains(self, stage: Self) -> bool {
        self.0 & stage.0 == stage.0
    }

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl std::fmt::Debug for ProtocolProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(ProtocolProgress, &str); 8] = [
            (ProtocolProgress::CONNECT, "CONNECT"),
            (ProtocolProgress::EHLO, "EHLO"),
            (ProtocolProgress::AUTH, "AUTH"),
            (ProtocolProgress::MAIL, "MAIL"),
            (ProtocolProgress::RCPT, "RCPT"),
            (ProtocolProgress::DATA, "DATA"),
            (ProtocolProgress::MESSAGE, "MESSAGE"),
            (ProtocolProgress::QUIT, "QUIT"),
        ];

        let mut set = f.debug_set();
        for (stage, name) in NAMES {
            if self.contains(stage) {
                set.entry(&name);
            }
        }
        set.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let progress = ProtocolProgress::empty();
        assert_eq!(progress.bits(), 0);
        assert!(!progress.contains(ProtocolProgress::CONNECT));
    }

    #[test]
    fn accumulates_monotonically() {
        let mut progress = ProtocolProgress::empty();
        progress.insert(ProtocolProgress::CONNECT);
        progress.insert(ProtocolProgress::EHLO);
        assert!(progress.contains(ProtocolProgress::CONNECT));
        assert!(progress.contains(ProtocolProgress::EHLO));
        assert!(!progress.contains(ProtocolProgress::MAIL));

        // re-inserting is a no-op
        let before = progress.bits();
        progress.insert(ProtocolProgress::EHLO);
        assert_eq!(progress.bits(), before);
    }

    #[test]
    fn debug_lists_stage_names() {
        let mut progress = ProtocolProgress::empty();
        progress.insert(ProtocolProgress::CONNECT);
        progress.insert(ProtocolProgress::QUIT);
        let rendered = format!("{progress:?}");
        assert!(rendered.contains("CONNECT"));
        assert!(rendered.contains("QUIT"));
        assert!(!rendered.contains("MAIL"));
    }
}
