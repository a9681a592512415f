//! In-game clock recovery and tracking.
//!
//! Two acquisition paths feed the tracker: the warmup countdown (which
//! implies an absolute start-of-match time) and a directly recognized
//! `h:mm:ss` overlay. Between acquisitions the clock only moves through the
//! synchronization decay; a periodic sanity check drops trust whenever the
//! value has drifted ahead of the last confirmed reading.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::info;

use maplapse_ocr::{LumaPlane, OcrEngine, OcrError, OcrRequest};
use maplapse_types::{ClockError, GameClock, VideoFrame};

/// Token that precedes the countdown value on the warmup screen.
pub const DEFAULT_WARMUP_MARKER: &str = "MATCH WARMUP";

/// The warmup countdown always starts the match clock at a fixed offset:
/// hour 1, with 27 minutes added to the remaining countdown minutes.
const WARMUP_BASE_HOUR: u32 = 1;
const WARMUP_MINUTE_OFFSET: u32 = 27;

#[derive(Debug, Error)]
pub enum ClockParseError {
    #[error("no token follows the warmup marker")]
    MissingWarmupValue,
    #[error("malformed clock token '{0}'")]
    MalformedToken(String),
    #[error("clock value out of range: {0}")]
    OutOfRange(#[from] ClockError),
}

fn direct_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d):(\d\d):(\d\d)").expect("pattern is valid"))
}

/// Parse the warmup acquisition tokens: the countdown `minute:second` token
/// immediately following the marker. `Ok(None)` means the marker was absent.
pub fn parse_warmup(
    tokens: &[String],
    marker: &str,
) -> Result<Option<GameClock>, ClockParseError> {
    let Some(position) = tokens.iter().position(|token| token == marker) else {
        return Ok(None);
    };
    let value = tokens
        .get(position + 1)
        .ok_or(ClockParseError::MissingWarmupValue)?;
    let (minute, second) = value
        .split_once(':')
        .ok_or_else(|| ClockParseError::MalformedToken(value.clone()))?;
    let minute: u32 = minute
        .trim()
        .parse()
        .map_err(|_| ClockParseError::MalformedToken(value.clone()))?;
    let second: u32 = second
        .trim()
        .parse()
        .map_err(|_| ClockParseError::MalformedToken(value.clone()))?;
    let clock = GameClock::new(WARMUP_BASE_HOUR, WARMUP_MINUTE_OFFSET + minute, second)?;
    Ok(Some(clock))
}

/// First token matching `\d:\d\d:\d\d` wins; trailing characters after the
/// pattern are ignored, matching how the overlay text is recognized.
pub fn parse_direct(tokens: &[String]) -> Result<Option<GameClock>, ClockParseError> {
    for token in tokens {
        let Some(captures) = direct_pattern().captures(token) else {
            continue;
        };
        let hour: u32 = captures[1]
            .parse()
            .map_err(|_| ClockParseError::MalformedToken(token.clone()))?;
        let minute: u32 = captures[2]
            .parse()
            .map_err(|_| ClockParseError::MalformedToken(token.clone()))?;
        let second: u32 = captures[3]
            .parse()
            .map_err(|_| ClockParseError::MalformedToken(token.clone()))?;
        return Ok(Some(GameClock::new(hour, minute, second)?));
    }
    Ok(None)
}

/// Trust state of the tracked clock. `checkpoint` is the last value
/// confirmed through acquisition; decay never touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Unset,
    Set {
        current: GameClock,
        checkpoint: GameClock,
    },
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub warmup_marker: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            warmup_marker: DEFAULT_WARMUP_MARKER.to_owned(),
        }
    }
}

/// The clock-tracking state machine. All mutation goes through the observe /
/// decay / sanity-check transitions; recognition failures never change state.
pub struct ClockTracker {
    state: ClockState,
    config: TrackerConfig,
}

impl ClockTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            state: ClockState::Unset,
            config,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_set(&self) -> bool {
        matches!(self.state, ClockState::Set { .. })
    }

    pub fn current(&self) -> Option<GameClock> {
        match self.state {
            ClockState::Unset => None,
            ClockState::Set { current, .. } => Some(current),
        }
    }

    fn acquire(&mut self, clock: GameClock) {
        self.state = ClockState::Set {
            current: clock,
            checkpoint: clock,
        };
        info!(clock = %clock, "clock set");
    }

    /// Warmup acquisition; only acts while the clock is untrusted.
    pub fn observe_warmup(
        &mut self,
        tokens: &[String],
    ) -> Result<Option<GameClock>, ClockParseError> {
        if self.is_set() {
            return Ok(None);
        }
        match parse_warmup(tokens, &self.config.warmup_marker)? {
            Some(clock) => {
                self.acquire(clock);
                Ok(Some(clock))
            }
            None => Ok(None),
        }
    }

    /// Direct read; runs regardless of state and refreshes the checkpoint.
    pub fn observe_direct(
        &mut self,
        tokens: &[String],
    ) -> Result<Option<GameClock>, ClockParseError> {
        match parse_direct(tokens)? {
            Some(clock) => {
                self.acquire(clock);
                Ok(Some(clock))
            }
            None => Ok(None),
        }
    }

    /// Synchronization decay: one second backwards. A no-op while unset,
    /// since there is no value to keep in sync.
    pub fn decay(&mut self) {
        if let ClockState::Set { current, .. } = &mut self.state {
            current.tick_back();
        }
    }

    /// Drop trust when the clock has moved ahead of the last confirmed
    /// value. Returns true when the state was demoted.
    pub fn sanity_check(&mut self) -> bool {
        if let ClockState::Set {
            current,
            checkpoint,
        } = self.state
        {
            if current > checkpoint {
                self.state = ClockState::Unset;
                return true;
            }
        }
        false
    }
}

/// Thin wrapper turning a frame into the OCR collaborator's token sequence,
/// order preserved.
pub struct ClockRecognizer {
    engine: Arc<dyn OcrEngine>,
}

impl ClockRecognizer {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn recognize(&self, frame: &VideoFrame) -> Result<Vec<String>, OcrError> {
        let request = OcrRequest::new(LumaPlane::from_frame(frame));
        let response = self.engine.recognize(&request)?;
        Ok(response.tokens().map(str::to_owned).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn tracker() -> ClockTracker {
        ClockTracker::new(TrackerConfig::default())
    }

    #[test]
    fn warmup_tokens_yield_back_computed_clock() {
        let mut tracker = tracker();
        let clock = tracker
            .observe_warmup(&tokens(&["KILL FEED", "MATCH WARMUP", "3:42", "noise"]))
            .unwrap()
            .unwrap();
        assert_eq!(clock, GameClock::new(1, 30, 42).unwrap());
        assert_eq!(
            tracker.state(),
            ClockState::Set {
                current: clock,
                checkpoint: clock
            }
        );
    }

    #[test]
    fn warmup_is_ignored_once_the_clock_is_set() {
        let mut tracker = tracker();
        tracker
            .observe_direct(&tokens(&["2:15:07"]))
            .unwrap()
            .unwrap();
        let result = tracker
            .observe_warmup(&tokens(&["MATCH WARMUP", "3:42"]))
            .unwrap();
        assert!(result.is_none());
        assert_eq!(tracker.current(), Some(GameClock::new(2, 15, 7).unwrap()));
    }

    #[test]
    fn direct_read_sets_the_clock_from_the_first_match() {
        let mut tracker = tracker();
        let clock = tracker
            .observe_direct(&tokens(&["score", "2:15:07", "3:00:00"]))
            .unwrap()
            .unwrap();
        assert_eq!(clock, GameClock::new(2, 15, 7).unwrap());
        assert!(tracker.is_set());
    }

    #[test]
    fn direct_read_ignores_non_matching_tokens() {
        let mut tracker = tracker();
        let result = tracker
            .observe_direct(&tokens(&["12:15:07", "2:1:07", "warmup"]))
            .unwrap();
        assert!(result.is_none());
        assert!(!tracker.is_set());
    }

    #[test]
    fn malformed_warmup_value_is_an_error_and_leaves_state_unchanged() {
        let mut tracker = tracker();
        let err = tracker
            .observe_warmup(&tokens(&["MATCH WARMUP", "soon"]))
            .unwrap_err();
        assert!(matches!(err, ClockParseError::MalformedToken(_)));
        assert_eq!(tracker.state(), ClockState::Unset);

        let err = tracker
            .observe_warmup(&tokens(&["MATCH WARMUP"]))
            .unwrap_err();
        assert!(matches!(err, ClockParseError::MissingWarmupValue));
        assert_eq!(tracker.state(), ClockState::Unset);
    }

    #[test]
    fn out_of_range_direct_read_is_an_error_not_a_panic() {
        let mut tracker = tracker();
        let err = tracker.observe_direct(&tokens(&["2:75:07"])).unwrap_err();
        assert!(matches!(err, ClockParseError::OutOfRange(_)));
        assert!(!tracker.is_set());
    }

    #[test]
    fn decay_ticks_only_while_set() {
        let mut tracker = tracker();
        tracker.decay();
        assert_eq!(tracker.state(), ClockState::Unset);

        tracker
            .observe_direct(&tokens(&["1:00:05"]))
            .unwrap()
            .unwrap();
        for _ in 0..10 {
            tracker.decay();
        }
        assert_eq!(tracker.current(), Some(GameClock::new(0, 59, 55).unwrap()));
        // The checkpoint is untouched by decay.
        assert!(matches!(
            tracker.state(),
            ClockState::Set { checkpoint, .. } if checkpoint == GameClock::new(1, 0, 5).unwrap()
        ));
    }

    #[test]
    fn sanity_check_demotes_a_clock_ahead_of_its_checkpoint() {
        let mut tracker = tracker();
        tracker
            .observe_direct(&tokens(&["0:10:00"]))
            .unwrap()
            .unwrap();
        // Simulate a stale forward jump past the checkpoint.
        tracker.state = ClockState::Set {
            current: GameClock::new(0, 15, 0).unwrap(),
            checkpoint: GameClock::new(0, 10, 0).unwrap(),
        };
        assert!(tracker.sanity_check());
        assert_eq!(tracker.state(), ClockState::Unset);
    }

    #[test]
    fn sanity_check_keeps_a_clock_at_or_behind_its_checkpoint() {
        let mut tracker = tracker();
        tracker.state = ClockState::Set {
            current: GameClock::new(0, 9, 0).unwrap(),
            checkpoint: GameClock::new(0, 10, 0).unwrap(),
        };
        assert!(!tracker.sanity_check());
        assert!(tracker.is_set());

        tracker.state = ClockState::Set {
            current: GameClock::new(0, 10, 0).unwrap(),
            checkpoint: GameClock::new(0, 10, 0).unwrap(),
        };
        assert!(!tracker.sanity_check());
        assert!(tracker.is_set());
    }

    #[test]
    fn sanity_check_is_a_no_op_while_unset() {
        let mut tracker = tracker();
        assert!(!tracker.sanity_check());
        assert_eq!(tracker.state(), ClockState::Unset);
    }
}
