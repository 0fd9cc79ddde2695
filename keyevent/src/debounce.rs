//! Per-key debounce and event classification.
//!
//! A raw level has to hold for the debounce time before it becomes the
//! stable level. Edges of the stable level produce `Press` and `Release`;
//! the time spent on either side of an edge produces the long-press, repeat
//! and click events.
//!
//! A `Click` is only reported once the double-click window has run out
//! without a second release, so a double click never starts with a `Click`.

use heapless::Vec;

use crate::config::Timing;
use crate::event::KeyEvent;

/// Most events one key can produce in a single tick.
pub const EVENTS_PER_KEY: usize = 4;

/// Events produced by one key in one tick, in generation order.
pub type KeyEvents = Vec<KeyEvent, EVENTS_PER_KEY>;

/// Runtime state of one key.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyState {
    /// Last raw sample (true = pressed).
    raw_last: bool,
    /// Debounced level (true = pressed).
    stable: bool,
    /// `LongPress` already fired for the current press.
    long_sent: bool,
    /// 1 while a click waits for the double-click window to close.
    click_count: u8,
    debounce_ms: u32,
    press_ms: u32,
    repeat_ms: u32,
    click_wait_ms: u32,
}

impl KeyState {
    pub const fn new() -> Self {
        Self {
            raw_last: false,
            stable: false,
            long_sent: false,
            click_count: 0,
            debounce_ms: 0,
            press_ms: 0,
            repeat_ms: 0,
            click_wait_ms: 0,
        }
    }

    /// Debounced level.
    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    /// Last raw sample.
    pub fn raw(&self) -> bool {
        self.raw_last
    }

    pub fn long_press_sent(&self) -> bool {
        self.long_sent
    }

    pub fn click_pending(&self) -> bool {
        self.click_count == 1
    }

    /// Time the key has been stably pressed, in milliseconds.
    pub fn held_ms(&self) -> u32 {
        self.press_ms
    }

    /// Feed one raw sample taken `dt` milliseconds after the previous one.
    pub fn advance(&mut self, raw: bool, dt: u32, timing: &Timing) -> KeyEvents {
        let mut events = KeyEvents::new();

        if raw != self.raw_last {
            // Any level change restarts the debounce window.
            self.raw_last = raw;
            self.debounce_ms = 0;
        } else if self.debounce_ms < timing.debounce_ms {
            self.debounce_ms = self.debounce_ms.saturating_add(dt);
        }

        if self.debounce_ms >= timing.debounce_ms && self.stable != self.raw_last {
            self.stable = self.raw_last;
            if self.stable {
                self.press_ms = 0;
                self.repeat_ms = 0;
                self.long_sent = false;
                push(&mut events, KeyEvent::Press);
            } else {
                self.on_release(timing, &mut events);
            }
        }

        if self.stable {
            self.press_ms = self.press_ms.saturating_add(dt);

            if !self.long_sent && self.press_ms >= timing.long_press_ms {
                self.long_sent = true;
                push(&mut events, KeyEvent::LongPress);
            }

            if self.press_ms >= timing.repeat_start_ms {
                self.repeat_ms = self.repeat_ms.saturating_add(dt);
                if self.repeat_ms >= timing.repeat_period_ms {
                    self.repeat_ms = 0;
                    push(&mut events, KeyEvent::Repeat);
                }
            }
        } else if self.click_count == 1 {
            self.click_wait_ms = self.click_wait_ms.saturating_add(dt);
            if self.click_wait_ms >= timing.double_click_ms {
                self.clear_click();
                push(&mut events, KeyEvent::Click);
            }
        }

        events
    }

    fn on_release(&mut self, timing: &Timing, events: &mut KeyEvents) {
        push(events, KeyEvent::Release);

        if self.long_sent {
            // A long press never takes part in a click sequence.
            push(events, KeyEvent::LongPressRelease);
            self.clear_click();
        } else if self.click_count == 1 && self.click_wait_ms <= timing.double_click_ms {
            push(events, KeyEvent::DoubleClick);
            self.clear_click();
        } else {
            self.click_count = 1;
            self.click_wait_ms = 0;
        }

        self.press_ms = 0;
        self.repeat_ms = 0;
        self.long_sent = false;
    }

    fn clear_click(&mut self) {
        self.click_count = 0;
        self.click_wait_ms = 0;
    }
}

fn push(events: &mut KeyEvents, event: KeyEvent) {
    // At most Press/Release, LongPressRelease/DoubleClick, LongPress and
    // Repeat/Click can come out of one tick.
    let _ = events.push(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use KeyEvent::*;

    const TICK: u32 = 10;

    /// Drive one key through `(pressed, duration_ms)` phases and collect every
    /// event with the time it was generated.
    fn run(timing: &Timing, phases: &[(bool, u32)]) -> std::vec::Vec<(u32, KeyEvent)> {
        let mut key = KeyState::new();
        let mut out = std::vec::Vec::new();
        let mut now = 0;
        for &(pressed, duration) in phases {
            for _ in 0..duration / TICK {
                now += TICK;
                for event in key.advance(pressed, TICK, timing) {
                    out.push((now, event));
                }
            }
        }
        out
    }

    fn kinds(events: &[(u32, KeyEvent)]) -> std::vec::Vec<KeyEvent> {
        events.iter().map(|&(_, e)| e).collect()
    }

    #[test]
    fn test_bounce_is_filtered() {
        let timing = Timing::new();
        let mut key = KeyState::new();
        // Contact chatter shorter than the debounce time.
        for raw in [true, false, true, false, true, false] {
            assert!(key.advance(raw, 5, &timing).is_empty());
        }
        assert!(!key.is_pressed());
        for _ in 0..3 {
            key.advance(false, 10, &timing);
        }
        assert!(!key.is_pressed());
    }

    #[test]
    fn test_stable_after_debounce_window() {
        let timing = Timing::new();
        let mut key = KeyState::new();
        // First sample only records the new raw level.
        assert!(key.advance(true, TICK, &timing).is_empty());
        assert!(key.advance(true, TICK, &timing).is_empty());
        assert_eq!(key.advance(true, TICK, &timing).as_slice(), &[Press]);
        assert!(key.is_pressed());
        assert!(key.raw());
    }

    #[test]
    fn test_single_click() {
        let timing = Timing::new();
        let events = run(&timing, &[(true, 100), (false, 400)]);
        assert_eq!(kinds(&events), [Press, Release, Click]);

        // The click waits out the double-click window after the release.
        let release = events[1].0;
        let click = events[2].0;
        assert!(click - release >= timing.double_click_ms - TICK);
    }

    #[test]
    fn test_double_click() {
        let timing = Timing::new();
        let events = run(
            &timing,
            &[(true, 80), (false, 80), (true, 80), (false, 400)],
        );
        assert_eq!(kinds(&events), [Press, Release, Press, Release, DoubleClick]);
    }

    #[test]
    fn test_slow_second_click_is_two_clicks() {
        let timing = Timing::new();
        let events = run(
            &timing,
            &[(true, 80), (false, 400), (true, 80), (false, 400)],
        );
        assert_eq!(
            kinds(&events),
            [Press, Release, Click, Press, Release, Click]
        );
    }

    #[test]
    fn test_long_press_with_repeat() {
        let timing = Timing::new();
        let events = run(&timing, &[(true, 1500), (false, 400)]);
        let kinds = kinds(&events);

        assert_eq!(kinds[0], Press);
        assert_eq!(kinds.iter().filter(|&&e| e == LongPress).count(), 1);
        assert_eq!(&kinds[kinds.len() - 2..], &[Release, LongPressRelease]);
        assert!(!kinds.contains(&Click));
        assert!(!kinds.contains(&DoubleClick));

        let repeats: std::vec::Vec<u32> = events
            .iter()
            .filter(|&&(_, e)| e == Repeat)
            .map(|&(t, _)| t)
            .collect();
        assert!(repeats.len() >= 5);
        for pair in repeats.windows(2) {
            assert_eq!(pair[1] - pair[0], timing.repeat_period_ms);
        }

        // Repeats only start once the repeat delay has passed.
        let press = events[0].0;
        assert!(repeats[0] - press >= timing.repeat_start_ms);
    }

    #[test]
    fn test_hold_between_repeat_start_and_long_press() {
        let timing = Timing::new();
        let events = run(&timing, &[(true, 700), (false, 400)]);
        let kinds = kinds(&events);
        assert!(kinds.contains(&Repeat));
        assert!(!kinds.contains(&LongPress));
        // Without a long press the release still counts as a click.
        assert_eq!(&kinds[kinds.len() - 2..], &[Release, Click]);
    }

    #[test]
    fn test_long_press_clears_pending_click() {
        let timing = Timing::new();
        let events = run(
            &timing,
            &[(true, 80), (false, 80), (true, 1000), (false, 400)],
        );
        let kinds = kinds(&events);
        assert!(!kinds.contains(&Click));
        assert!(!kinds.contains(&DoubleClick));
        assert_eq!(&kinds[kinds.len() - 2..], &[Release, LongPressRelease]);
    }

    #[test]
    fn test_long_press_state_resets_on_release() {
        let timing = Timing::new();
        let mut key = KeyState::new();
        for _ in 0..100 {
            key.advance(true, TICK, &timing);
        }
        assert!(key.long_press_sent());
        assert!(key.held_ms() >= timing.long_press_ms);
        for _ in 0..3 {
            key.advance(false, TICK, &timing);
        }
        assert!(!key.is_pressed());
        assert!(!key.long_press_sent());
        assert!(!key.click_pending());
        assert_eq!(key.held_ms(), 0);
    }

    #[test]
    fn test_coarse_ticks() {
        // One tick covers the whole debounce window and the double-click window.
        let timing = Timing::new();
        let mut key = KeyState::new();
        key.advance(true, 300, &timing);
        assert_eq!(key.advance(true, 300, &timing).as_slice(), &[Press]);
        key.advance(false, 300, &timing);
        assert_eq!(
            key.advance(false, 300, &timing).as_slice(),
            &[Release, Click]
        );
    }

    proptest! {
        #[test]
        fn prop_stable_follows_settled_raw(
            noise in prop::collection::vec(any::<bool>(), 0..40),
            level in any::<bool>(),
            dt in 1u32..=25,
        ) {
            let timing = Timing::new();
            let mut key = KeyState::new();
            for raw in noise {
                key.advance(raw, dt, &timing);
            }
            // One tick to latch the level, then the debounce window.
            let ticks = 1 + (timing.debounce_ms + dt - 1) / dt;
            for _ in 0..ticks {
                key.advance(level, dt, &timing);
            }
            prop_assert_eq!(key.is_pressed(), level);
            prop_assert!(!key.long_press_sent() || key.is_pressed());
        }
    }
}
