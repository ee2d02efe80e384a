use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::detect::sections::SectionLabel;

/// Candidates for a label missing from the map
const FALLBACK: [u32; 3] = [5, 6, 7];

/// Section label -> candidate visual ids
#[derive(Clone, Debug)]
pub struct StyleMap {
    candidates: BTreeMap<SectionLabel, Vec<u32>>,
}

impl Default for StyleMap {
    fn default() -> Self {
        let candidates = [
            (SectionLabel::Intro, vec![0, 1, 2, 19, 20]),
            (SectionLabel::Verse, vec![3, 4, 5, 6, 7, 20]),
            (SectionLabel::Chorus, vec![10, 11, 12, 15, 18, 20]),
            (SectionLabel::Drop, vec![13, 14, 15, 16, 17, 20]),
            (SectionLabel::Buildup, vec![8, 9, 10, 20]),
            (SectionLabel::Bridge, vec![4, 5, 6, 7, 20]),
            (SectionLabel::Breakdown, vec![1, 2, 3, 19, 20]),
            (SectionLabel::Outro, vec![0, 1, 19, 20]),
        ]
        .into_iter()
        .collect();
        Self { candidates }
    }
}

impl StyleMap {
    /// Stock map with the entries of a `[styles]` table laid over it.
    /// Unknown labels are skipped with a warning.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<u32>>) -> Self {
        let mut map = Self::default();
        for (key, ids) in overrides {
            match key.parse::<SectionLabel>() {
                Ok(label) => {
                    map.candidates.insert(label, ids.clone());
                }
                Err(err) => log::warn!("Ignoring style entry: {}", err),
            }
        }
        map
    }

    /// Candidate ids for `label`; the fallback set when the entry is missing or empty.
    pub fn candidates(&self, label: SectionLabel) -> &[u32] {
        match self.candidates.get(&label) {
            Some(ids) if !ids.is_empty() => ids,
            _ => &FALLBACK,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectionLabel, &[u32])> + '_ {
        SectionLabel::ALL.into_iter().map(|label| (label, self.candidates(label)))
    }
}

/// Two visuals layered by the renderer: one drawn sharp, one blurred behind it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VisualPair {
    pub sharp: u32,
    pub blurred: u32,
}

pub struct StylePicker {
    map: StyleMap,
    rng: StdRng,
}

impl StylePicker {
    /// A fixed `seed` makes every pick reproducible.
    pub fn new(map: StyleMap, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self { map, rng }
    }

    /// Random pair from the label's candidates, distinct whenever there is more than one.
    pub fn pick(&mut self, label: SectionLabel) -> VisualPair {
        let options = self.map.candidates(label);
        let sharp_idx = self.rng.random_range(0..options.len());
        let blurred_idx = if options.len() > 1 {
            // Draw from the others so the pair never repeats
            let offset = self.rng.random_range(1..options.len());
            (sharp_idx + offset) % options.len()
        } else {
            sharp_idx
        };
        VisualPair {
            sharp: options[sharp_idx],
            blurred: options[blurred_idx],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_map_covers_every_label() {
        let map = StyleMap::default();
        assert_eq!(map.candidates(SectionLabel::Drop), &[13, 14, 15, 16, 17, 20]);
        assert_eq!(map.candidates(SectionLabel::Outro), &[0, 1, 19, 20]);
        assert_eq!(map.iter().count(), 8);
    }

    #[test]
    fn overrides_replace_and_fallback_applies() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Chorus".to_string(), vec![42]);
        overrides.insert("verse".to_string(), Vec::new());
        overrides.insert("solo".to_string(), vec![1, 2]);
        let map = StyleMap::with_overrides(&overrides);
        assert_eq!(map.candidates(SectionLabel::Chorus), &[42]);
        assert_eq!(map.candidates(SectionLabel::Verse), &FALLBACK);
        assert_eq!(map.candidates(SectionLabel::Intro), &[0, 1, 2, 19, 20]);
    }

    #[test]
    fn pairs_are_distinct_candidates() {
        let mut picker = StylePicker::new(StyleMap::default(), Some(7));
        for _ in 0..200 {
            for label in SectionLabel::ALL {
                let pair = picker.pick(label);
                let options = StyleMap::default().candidates(label).to_vec();
                assert!(options.contains(&pair.sharp));
                assert!(options.contains(&pair.blurred));
                assert_ne!(pair.sharp, pair.blurred);
            }
        }
    }

    #[test]
    fn single_candidate_repeats() {
        let mut overrides = BTreeMap::new();
        overrides.insert("drop".to_string(), vec![9]);
        let mut picker = StylePicker::new(StyleMap::with_overrides(&overrides), None);
        assert_eq!(picker.pick(SectionLabel::Drop), VisualPair { sharp: 9, blurred: 9 });
    }

    #[test]
    fn seed_is_reproducible() {
        let mut a = StylePicker::new(StyleMap::default(), Some(99));
        let mut b = StylePicker::new(StyleMap::default(), Some(99));
        for label in SectionLabel::ALL {
            assert_eq!(a.pick(label), b.pick(label));
        }
    }
}
