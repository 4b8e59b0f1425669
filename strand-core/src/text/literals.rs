//! Process-wide boolean literal words.
//!
//! Boolean reads accept `1`/`0` plus the configured true/false words, and
//! boolean writes emit those words. The registry is created on first use
//! and lives until process exit; [`set_bool_literals`] swaps in localized
//! words at any point.

use std::sync::LazyLock;

use parking_lot::RwLock;

/// The words used for `true` and `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolLiterals {
    pub true_word: String,
    pub false_word: String,
}

impl Default for BoolLiterals {
    fn default() -> Self {
        Self {
            true_word: "true".into(),
            false_word: "false".into(),
        }
    }
}

impl BoolLiterals {
    /// Interpret trimmed text, ignoring ASCII case.
    pub fn parse(&self, text: &str) -> Option<bool> {
        let text = text.trim();
        if text == "1" || text.eq_ignore_ascii_case(&self.true_word) {
            Some(true)
        } else if text == "0" || text.eq_ignore_ascii_case(&self.false_word) {
            Some(false)
        } else {
            None
        }
    }

    pub fn word(&self, value: bool) -> &str {
        if value { &self.true_word } else { &self.false_word }
    }
}

static LITERALS: LazyLock<RwLock<BoolLiterals>> = LazyLock::new(|| RwLock::new(BoolLiterals::default()));

/// Snapshot of the current literal words.
pub fn bool_literals() -> BoolLiterals {
    LITERALS.read().clone()
}

/// Install localized words for `true` and `false`.
pub fn set_bool_literals(true_word: impl Into<String>, false_word: impl Into<String>) {
    let mut lits = LITERALS.write();
    lits.true_word = true_word.into();
    lits.false_word = false_word.into();
}

/// Restore the English defaults.
pub fn reset_bool_literals() {
    *LITERALS.write() = BoolLiterals::default();
}

pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    LITERALS.read().parse(text)
}

pub(crate) fn bool_word(value: bool) -> String {
    LITERALS.read().word(value).to_string()
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // The global registry is exercised by the integration tests; these
    // stick to local instances so parallel unit tests don't interfere.

    #[test]
    fn parse_accepts_words_and_digits() {
        let lits = BoolLiterals::default();
        assert_eq!(lits.parse(" TRUE "), Some(true));
        assert_eq!(lits.parse("1"), Some(true));
        assert_eq!(lits.parse("False"), Some(false));
        assert_eq!(lits.parse("0"), Some(false));
        assert_eq!(lits.parse("yes"), None);
        assert_eq!(lits.parse(""), None);
    }

    #[test]
    fn localized_words() {
        let lits = BoolLiterals {
            true_word: "wahr".into(),
            false_word: "falsch".into(),
        };
        assert_eq!(lits.parse("Wahr"), Some(true));
        assert_eq!(lits.parse("true"), None);
        assert_eq!(lits.word(false), "falsch");
    }
}
