//! LED strip color sequencing: flash, then hold, then off.
//!
//! Countdowns share one encoding: negative runs forever, zero skips the
//! phase, positive is the number of ticks left.

use crate::{Color, FLASH_PERIOD};
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    StartSequence,
    Flashing,
    Holding,
    Stopping,
}

/// What the strip should show after a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StripOutput {
    Color(Color),
    Off,
}

/// The configured color and the flash/hold countdowns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct ColorState {
    pub color: Color,
    pub flash_ticks: i32,
    pub hold_ticks: i32,
    pub phase: Phase,
}

#[derive(Clone, Debug, Default)]
pub struct ColorSequencer {
    state: ColorState,
    flash_timer: u32,
    flash_on: bool,
}

impl ColorSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ColorState {
        &self.state
    }

    /// Begin a new sequence, discarding whatever was running.
    pub fn start(&mut self, color: Color, flash_ticks: i32, hold_ticks: i32) {
        self.state = ColorState {
            color,
            flash_ticks,
            hold_ticks,
            phase: Phase::StartSequence,
        };
        self.flash_timer = 0;
        self.flash_on = false;
    }

    /// Clear the color and countdowns; the next tick turns the strip off.
    pub fn stop(&mut self) {
        self.state = ColorState {
            phase: Phase::Stopping,
            ..ColorState::default()
        };
    }

    /// Advance one tick and return the frame to emit, if any.
    ///
    /// `StartSequence` only emits the first frame and picks the next phase;
    /// the first flash countdown happens on the following tick.
    pub fn advance(&mut self) -> Option<StripOutput> {
        match self.state.phase {
            Phase::StartSequence => {
                if self.state.flash_ticks != 0 {
                    self.flash_timer = 0;
                    self.flash_on = true;
                    self.state.phase = Phase::Flashing;
                    Some(StripOutput::Color(self.state.color))
                } else if self.state.hold_ticks != 0 {
                    self.state.phase = Phase::Holding;
                    Some(StripOutput::Color(self.state.color))
                } else {
                    self.state.phase = Phase::Stopping;
                    None
                }
            }
            Phase::Flashing => self.flash(),
            Phase::Holding => {
                match self.state.hold_ticks {
                    0 => self.state.phase = Phase::Stopping,
                    ticks if ticks > 0 => {
                        self.state.hold_ticks -= 1;
                        if self.state.hold_ticks == 0 {
                            self.state.phase = Phase::Stopping;
                        }
                    }
                    // Held forever; the frame is already on the strip.
                    _ => {}
                }
                None
            }
            Phase::Stopping => {
                self.state.phase = Phase::Idle;
                Some(StripOutput::Off)
            }
            Phase::Idle => None,
        }
    }

    fn flash(&mut self) -> Option<StripOutput> {
        self.flash_timer += 1;
        let mut output = None;
        if self.flash_timer >= FLASH_PERIOD {
            self.flash_timer = 0;
            self.flash_on = !self.flash_on;
            output = Some(if self.flash_on {
                StripOutput::Color(self.state.color)
            } else {
                StripOutput::Off
            });
        }

        if self.state.flash_ticks > 0 {
            self.state.flash_ticks -= 1;
            if self.state.flash_ticks == 0 {
                if self.state.hold_ticks != 0 {
                    self.state.phase = Phase::Holding;
                    // The flash may have ended on a dark phase.
                    output = Some(StripOutput::Color(self.state.color));
                } else {
                    self.state.phase = Phase::Stopping;
                }
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RED: Color = Color::new(128, 0, 0);

    /// Tick until the sequencer reaches `phase`, returning the tick count.
    fn ticks_until(seq: &mut ColorSequencer, phase: Phase, limit: usize) -> Option<usize> {
        (1..=limit).find(|_| {
            seq.advance();
            seq.state().phase == phase
        })
    }

    #[test]
    fn starts_idle() {
        let mut seq = ColorSequencer::new();
        assert_eq!(seq.state().phase, Phase::Idle);
        assert_eq!(seq.advance(), None);
    }

    #[test]
    fn flash_then_stop_never_holds() {
        let mut seq = ColorSequencer::new();
        seq.start(RED, 3, 0);

        assert_eq!(seq.advance(), Some(StripOutput::Color(RED)));
        assert_eq!(seq.state().phase, Phase::Flashing);

        let mut phases = Vec::new();
        for _ in 0..3 {
            seq.advance();
            phases.push(seq.state().phase);
        }
        assert_eq!(phases, vec![Phase::Flashing, Phase::Flashing, Phase::Stopping]);
        assert_eq!(seq.state().flash_ticks, 0);

        assert_eq!(seq.advance(), Some(StripOutput::Off));
        assert_eq!(seq.state().phase, Phase::Idle);
    }

    #[test]
    fn hold_only_enters_holding_immediately() {
        let mut seq = ColorSequencer::new();
        seq.start(RED, 0, 5);

        assert_eq!(seq.advance(), Some(StripOutput::Color(RED)));
        assert_eq!(seq.state().phase, Phase::Holding);
        assert_eq!(ticks_until(&mut seq, Phase::Stopping, 10), Some(5));
        assert_eq!(seq.advance(), Some(StripOutput::Off));
    }

    #[test]
    fn no_flash_no_hold_goes_straight_to_stopping() {
        let mut seq = ColorSequencer::new();
        seq.start(RED, 0, 0);
        assert_eq!(seq.advance(), None);
        assert_eq!(seq.state().phase, Phase::Stopping);
        assert_eq!(seq.advance(), Some(StripOutput::Off));
        assert_eq!(seq.state().phase, Phase::Idle);
    }

    #[test]
    fn flash_toggles_every_period() {
        let mut seq = ColorSequencer::new();
        seq.start(RED, -1, 0);
        seq.advance();

        let outputs: Vec<Option<StripOutput>> = (0..10).map(|_| seq.advance()).collect();
        assert_eq!(outputs[4], Some(StripOutput::Off));
        assert_eq!(outputs[9], Some(StripOutput::Color(RED)));
        assert_eq!(outputs.iter().filter(|o| o.is_some()).count(), 2);
    }

    #[test]
    fn indefinite_flash_never_ends() {
        let mut seq = ColorSequencer::new();
        seq.start(RED, -1, 5);
        assert_eq!(ticks_until(&mut seq, Phase::Holding, 500), None);
        assert_eq!(seq.state().flash_ticks, -1);
    }

    #[test]
    fn flash_then_hold_relights_the_strip() {
        let mut seq = ColorSequencer::new();
        seq.start(RED, 5, 2);
        seq.advance();
        let outputs: Vec<Option<StripOutput>> = (0..5).map(|_| seq.advance()).collect();

        assert_eq!(seq.state().phase, Phase::Holding);
        assert_eq!(outputs[4], Some(StripOutput::Color(RED)));
        assert_eq!(ticks_until(&mut seq, Phase::Stopping, 10), Some(2));
    }

    #[test]
    fn indefinite_hold_stays_on() {
        let mut seq = ColorSequencer::new();
        seq.start(RED, 0, -1);
        seq.advance();
        for _ in 0..100 {
            assert_eq!(seq.advance(), None);
        }
        assert_eq!(seq.state().phase, Phase::Holding);
    }

    #[test]
    fn restart_discards_countdowns() {
        let mut seq = ColorSequencer::new();
        seq.start(RED, 10, 10);
        seq.advance();
        seq.advance();

        let green = Color::new(0, 128, 0);
        seq.start(green, 0, 3);
        assert_eq!(seq.state().phase, Phase::StartSequence);
        assert_eq!(seq.state().flash_ticks, 0);
        assert_eq!(seq.advance(), Some(StripOutput::Color(green)));
    }

    #[test]
    fn stop_turns_strip_off_on_next_tick() {
        let mut seq = ColorSequencer::new();
        seq.start(RED, 0, -1);
        seq.advance();
        seq.stop();
        assert_eq!(seq.state().color, Color::BLACK);
        assert_eq!(seq.advance(), Some(StripOutput::Off));
        assert_eq!(seq.state().phase, Phase::Idle);
    }
}
