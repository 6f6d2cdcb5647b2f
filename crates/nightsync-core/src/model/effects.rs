// ── Effect list ──
//
// Snapshot returned by `GET /effects`. Effect identity is the positional
// index; names may repeat and are only disambiguated for display.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One entry of the device's effect playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub core: bool,
}

/// The device's effect playlist and the countdown of the running effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectList {
    #[serde(default)]
    pub current_effect: usize,
    /// Time left on the running effect; absent or zero when the device
    /// is not counting down.
    #[serde(default)]
    pub milliseconds_remaining: Option<u64>,
    #[serde(default)]
    pub effect_interval: u64,
    #[serde(rename = "Effects", default)]
    pub effects: Vec<Effect>,
}

impl EffectList {
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// The running effect, if the index is in range.
    pub fn current(&self) -> Option<&Effect> {
        self.effects.get(self.current_effect)
    }

    pub fn is_selected(&self, index: usize) -> bool {
        index == self.current_effect && index < self.effects.len()
    }

    /// Remaining time, treating zero as "not counting down".
    pub fn remaining(&self) -> Option<u64> {
        self.milliseconds_remaining.filter(|ms| *ms > 0)
    }

    /// Display label for the effect at `index`.
    ///
    /// Names shared by several effects get a `_N` suffix, where `N` is the
    /// 1-based position of this entry among the effects with that name.
    pub fn display_name(&self, index: usize) -> Option<String> {
        let effect = self.effects.get(index)?;
        let mut ordinal = 0;
        let mut total = 0;
        for (i, other) in self.effects.iter().enumerate() {
            if other.name == effect.name {
                total += 1;
                if i <= index {
                    ordinal += 1;
                }
            }
        }
        Some(if total > 1 {
            format!("{}_{ordinal}", effect.name)
        } else {
            effect.name.clone()
        })
    }

    /// Display labels for every effect, in list order.
    pub fn display_names(&self) -> Vec<String> {
        let mut totals: HashMap<&str, usize> = HashMap::new();
        for effect in &self.effects {
            *totals.entry(effect.name.as_str()).or_default() += 1;
        }
        let mut seen: HashMap<&str, usize> = HashMap::new();
        self.effects
            .iter()
            .map(|effect| {
                let name = effect.name.as_str();
                let ordinal = seen.entry(name).or_default();
                *ordinal += 1;
                if totals.get(name).copied().unwrap_or(0) > 1 {
                    format!("{name}_{ordinal}")
                } else {
                    effect.name.clone()
                }
            })
            .collect()
    }
}
