//! Bijective crypto identity <-> radio node id mapping.
//!
//! A mapping is never overwritten: a `learn` that would pair either key with
//! a different partner fails with [`TranslatorError::MappingConflict`] and
//! leaves the table unchanged.

use std::collections::HashMap;

use meshgate_core::{CryptoIdentity, RadioNodeId};

use crate::error::TranslatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressMapping {
    pub crypto: CryptoIdentity,
    pub radio: RadioNodeId,
    /// Set once traffic routed through this mapping was acknowledged.
    pub confirmed: bool,
    /// Unix timestamp (seconds) when the pairing was first learned.
    pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnOutcome {
    Inserted,
    /// An existing provisional mapping became confirmed.
    Promoted,
    Unchanged,
}

impl LearnOutcome {
    /// Whether the confirmed set changed and should be persisted.
    pub fn confirmed_changed(self, confirmed: bool) -> bool {
        match self {
            LearnOutcome::Inserted => confirmed,
            LearnOutcome::Promoted => true,
            LearnOutcome::Unchanged => false,
        }
    }
}

/// Current wall-clock time as Unix seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Debug, Default)]
pub struct AddressTranslator {
    by_crypto: HashMap<CryptoIdentity, AddressMapping>,
    by_radio: HashMap<RadioNodeId, CryptoIdentity>,
}

impl AddressTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted mappings. Entries that conflict with an earlier
    /// entry are skipped and logged.
    pub fn from_mappings(mappings: impl IntoIterator<Item = AddressMapping>) -> Self {
        let mut translator = Self::new();
        for m in mappings {
            if let Err(e) = translator.learn(m.crypto, m.radio, m.confirmed, m.created_at) {
                tracing::warn!(error = %e, "skipping conflicting persisted mapping");
            }
        }
        translator
    }

    pub fn resolve_crypto(&self, crypto: &CryptoIdentity) -> Option<RadioNodeId> {
        self.by_crypto.get(crypto).map(|m| m.radio)
    }

    pub fn resolve_radio(&self, radio: &RadioNodeId) -> Option<CryptoIdentity> {
        self.by_radio.get(radio).copied()
    }

    pub fn get(&self, crypto: &CryptoIdentity) -> Option<&AddressMapping> {
        self.by_crypto.get(crypto)
    }

    /// Insert or confirm the pairing `crypto <-> radio`.
    pub fn learn(
        &mut self,
        crypto: CryptoIdentity,
        radio: RadioNodeId,
        confirmed: bool,
        created_at: u64,
    ) -> Result<LearnOutcome, TranslatorError> {
        if let Some(existing) = self.by_crypto.get_mut(&crypto) {
            if existing.radio != radio {
                return Err(TranslatorError::MappingConflict {
                    crypto,
                    radio,
                    existing_crypto: existing.crypto,
                    existing_radio: existing.radio,
                });
            }
            if confirmed && !existing.confirmed {
                existing.confirmed = true;
                return Ok(LearnOutcome::Promoted);
            }
            return Ok(LearnOutcome::Unchanged);
        }

        if let Some(existing_crypto) = self.by_radio.get(&radio) {
            return Err(TranslatorError::MappingConflict {
                crypto,
                radio,
                existing_crypto: *existing_crypto,
                existing_radio: radio,
            });
        }

        self.by_crypto.insert(
            crypto,
            AddressMapping {
                crypto,
                radio,
                confirmed,
                created_at,
            },
        );
        self.by_radio.insert(radio, crypto);
        Ok(LearnOutcome::Inserted)
    }

    /// Promote an existing pairing to confirmed. Returns `true` if it changed.
    pub fn confirm(&mut self, crypto: &CryptoIdentity, radio: &RadioNodeId) -> bool {
        match self.by_crypto.get_mut(crypto) {
            Some(m) if m.radio == *radio && !m.confirmed => {
                m.confirmed = true;
                true
            }
            _ => false,
        }
    }

    /// Snapshot of every mapping, ordered by crypto identity.
    pub fn mappings(&self) -> Vec<AddressMapping> {
        let mut all: Vec<AddressMapping> = self.by_crypto.values().copied().collect();
        all.sort_by_key(|m| m.crypto);
        all
    }

    pub fn confirmed_mappings(&self) -> Vec<AddressMapping> {
        let mut all = self.mappings();
        all.retain(|m| m.confirmed);
        all
    }

    pub fn len(&self) -> usize {
        self.by_crypto.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_crypto.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(b: u8) -> CryptoIdentity {
        CryptoIdentity::new([b; 16])
    }

    fn r(n: u32) -> RadioNodeId {
        RadioNodeId::new(n)
    }

    #[test]
    fn test_learn_and_resolve_both_ways() {
        let mut t = AddressTranslator::new();
        assert_eq!(t.learn(c(1), r(10), false, 5), Ok(LearnOutcome::Inserted));
        assert_eq!(t.resolve_crypto(&c(1)), Some(r(10)));
        assert_eq!(t.resolve_radio(&r(10)), Some(c(1)));
        assert_eq!(t.resolve_crypto(&c(2)), None);
        assert_eq!(t.resolve_radio(&r(11)), None);
    }

    #[test]
    fn test_relearn_promotes_then_unchanged() {
        let mut t = AddressTranslator::new();
        t.learn(c(1), r(10), false, 0).unwrap();
        assert_eq!(t.learn(c(1), r(10), false, 0), Ok(LearnOutcome::Unchanged));
        assert_eq!(t.learn(c(1), r(10), true, 0), Ok(LearnOutcome::Promoted));
        assert_eq!(t.learn(c(1), r(10), true, 0), Ok(LearnOutcome::Unchanged));
        assert!(t.get(&c(1)).unwrap().confirmed);
    }

    #[test]
    fn test_conflicts_leave_table_unchanged() {
        let mut t = AddressTranslator::new();
        t.learn(c(1), r(10), true, 0).unwrap();

        let err = t.learn(c(1), r(11), true, 0).unwrap_err();
        assert_eq!(
            err,
            TranslatorError::MappingConflict {
                crypto: c(1),
                radio: r(11),
                existing_crypto: c(1),
                existing_radio: r(10),
            }
        );
        let err = t.learn(c(2), r(10), false, 0).unwrap_err();
        assert!(matches!(
            err,
            TranslatorError::MappingConflict { existing_crypto, .. } if existing_crypto == c(1)
        ));

        assert_eq!(t.len(), 1);
        assert_eq!(t.resolve_radio(&r(10)), Some(c(1)));
        assert_eq!(t.resolve_radio(&r(11)), None);
    }

    #[test]
    fn test_confirm() {
        let mut t = AddressTranslator::new();
        t.learn(c(1), r(10), false, 0).unwrap();
        assert!(!t.confirm(&c(1), &r(11)));
        assert!(t.confirm(&c(1), &r(10)));
        assert!(!t.confirm(&c(1), &r(10)));
        assert_eq!(t.confirmed_mappings().len(), 1);
    }

    #[test]
    fn test_from_mappings_skips_conflicts() {
        let m = |crypto, radio| AddressMapping {
            crypto,
            radio,
            confirmed: true,
            created_at: 1,
        };
        let t = AddressTranslator::from_mappings([m(c(1), r(1)), m(c(2), r(1)), m(c(3), r(3))]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.resolve_radio(&r(1)), Some(c(1)));
    }

    #[test]
    fn test_learn_outcome_persistence_signal() {
        assert!(LearnOutcome::Inserted.confirmed_changed(true));
        assert!(!LearnOutcome::Inserted.confirmed_changed(false));
        assert!(LearnOutcome::Promoted.confirmed_changed(false));
        assert!(!LearnOutcome::Unchanged.confirmed_changed(true));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn learn_sequence_stays_bijective(
            ops in proptest::collection::vec((0u8..8, 0u32..8, any::<bool>()), 0..64)
        ) {
            let mut t = AddressTranslator::new();
            for (cb, rn, confirmed) in ops {
                let _ = t.learn(CryptoIdentity::new([cb; 16]), RadioNodeId::new(rn), confirmed, 0);
            }
            let all = t.mappings();
            let cryptos: HashSet<_> = all.iter().map(|m| m.crypto).collect();
            let radios: HashSet<_> = all.iter().map(|m| m.radio).collect();
            prop_assert_eq!(cryptos.len(), all.len());
            prop_assert_eq!(radios.len(), all.len());
            for m in &all {
                prop_assert_eq!(t.resolve_crypto(&m.crypto), Some(m.radio));
                prop_assert_eq!(t.resolve_radio(&m.radio), Some(m.crypto));
            }
        }
    }
}
