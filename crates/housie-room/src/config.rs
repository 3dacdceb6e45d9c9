//! Process-wide game configuration.
//!
//! Loaded once at startup, validated, then shared read-only behind an `Arc`.
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! {
//!   "stakes": [10, 20, 50],
//!   "maxStake": 50,
//!   "gameTypes": {
//!     "quick": {
//!       "patterns": ["early_five", "full_house"],
//!       "multipliers": { "early_five": 0.2, "full_house": 0.7 }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use housie_caller::MAX_POOL_SIZE;
use housie_protocol::Pattern;
use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a [`GameConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The patterns one game type offers and what each pays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameTypeConfig {
    pub patterns: Vec<Pattern>,
    /// Payout for a pattern is `stake × players × multiplier`.
    pub multipliers: BTreeMap<Pattern, f64>,
}

impl GameTypeConfig {
    pub fn multiplier(&self, pattern: Pattern) -> Option<f64> {
        self.multipliers.get(&pattern).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    pub game_types: BTreeMap<String, GameTypeConfig>,
    /// The stakes a room may be created with.
    pub stakes: Vec<u64>,
    pub min_stake: u64,
    pub max_stake: u64,
    /// Server-wide seat cap; per-room caps are clamped to this.
    pub max_players: usize,
    /// Numbers `1..=pool_size` are drawn. Ticket bands cover exactly 90.
    pub pool_size: u8,
    /// Used when automatic mode is requested without an interval.
    pub default_call_interval_ms: u64,
    /// Random delay added to a room's first automatic draw.
    pub draw_jitter_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        let classic = GameTypeConfig {
            patterns: Pattern::ALL.to_vec(),
            multipliers: [
                (Pattern::EarlyFive, 0.1),
                (Pattern::TopLine, 0.1),
                (Pattern::MiddleLine, 0.1),
                (Pattern::BottomLine, 0.1),
                (Pattern::Corners, 0.1),
                (Pattern::FullHouse, 0.5),
            ]
            .into_iter()
            .collect(),
        };
        let quick = GameTypeConfig {
            patterns: vec![Pattern::EarlyFive, Pattern::FullHouse],
            multipliers: [(Pattern::EarlyFive, 0.2), (Pattern::FullHouse, 0.7)]
                .into_iter()
                .collect(),
        };
        Self {
            game_types: [("classic".to_string(), classic), ("quick".to_string(), quick)]
                .into_iter()
                .collect(),
            stakes: vec![10, 20, 50, 100],
            min_stake: 10,
            max_stake: 100,
            max_players: 50,
            pool_size: MAX_POOL_SIZE,
            default_call_interval_ms: 5_000,
            draw_jitter_ms: 250,
        }
    }
}

impl GameConfig {
    /// Parses and validates a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.game_types.is_empty() {
            return invalid("at least one game type is required".into());
        }
        for (name, game) in &self.game_types {
            if game.patterns.is_empty() {
                return invalid(format!("game type {name:?} offers no patterns"));
            }
            for pattern in &game.patterns {
                match game.multiplier(*pattern) {
                    Some(m) if m.is_finite() && m >= 0.0 => {}
                    Some(m) => {
                        return invalid(format!("game type {name:?}: multiplier {m} for {pattern}"));
                    }
                    None => {
                        return invalid(format!("game type {name:?}: no multiplier for {pattern}"));
                    }
                }
            }
        }
        if self.min_stake > self.max_stake {
            return invalid(format!(
                "minStake {} exceeds maxStake {}",
                self.min_stake, self.max_stake
            ));
        }
        if self.stakes.is_empty() {
            return invalid("at least one stake is required".into());
        }
        if let Some(s) = self.stakes.iter().find(|s| !(self.min_stake..=self.max_stake).contains(*s)) {
            return invalid(format!("stake {s} outside {}..={}", self.min_stake, self.max_stake));
        }
        if self.max_players == 0 {
            return invalid("maxPlayers must be positive".into());
        }
        if self.pool_size != MAX_POOL_SIZE {
            return invalid(format!("poolSize must be {MAX_POOL_SIZE} to match ticket bands"));
        }
        if self.default_call_interval_ms < 100 {
            return invalid("defaultCallIntervalMs must be at least 100".into());
        }
        Ok(())
    }

    pub fn game_type(&self, name: &str) -> Option<&GameTypeConfig> {
        self.game_types.get(name)
    }

    /// A stake is allowed if it is listed and within the min/max bounds.
    pub fn is_valid_stake(&self, stake: u64) -> bool {
        self.stakes.contains(&stake) && (self.min_stake..=self.max_stake).contains(&stake)
    }

    pub fn default_call_interval(&self) -> Duration {
        Duration::from_millis(self.default_call_interval_ms)
    }

    pub fn draw_jitter(&self) -> Duration {
        Duration::from_millis(self.draw_jitter_ms)
    }
}
