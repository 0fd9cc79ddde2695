//! Key events and the callback that receives them.

use core::fmt;

/// Interaction detected on a key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyEvent {
    /// Stable level went to pressed.
    Press = 0,
    /// Stable level went back to released.
    Release,
    /// A short press with no second press inside the double-click window.
    Click,
    /// Key held for the long-press time. Fires once per press.
    LongPress,
    /// Release that ends a press which had already fired `LongPress`.
    LongPressRelease,
    /// Periodic event while the key stays held past the repeat delay.
    Repeat,
    /// Second short press released inside the double-click window.
    DoubleClick,
}

impl KeyEvent {
    pub const fn name(self) -> &'static str {
        match self {
            KeyEvent::Press => "Press",
            KeyEvent::Release => "Release",
            KeyEvent::Click => "Click",
            KeyEvent::LongPress => "LongPress",
            KeyEvent::LongPressRelease => "LongPressRelease",
            KeyEvent::Repeat => "Repeat",
            KeyEvent::DoubleClick => "DoubleClick",
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives events after each scan pass, in the order they were generated.
///
/// Any `FnMut(&'static str, u16, KeyEvent)` closure is a handler; state the
/// application needs in the callback is simply captured by it.
pub trait EventHandler {
    fn on_event(&mut self, name: &'static str, key_id: u16, event: KeyEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(&'static str, u16, KeyEvent),
{
    fn on_event(&mut self, name: &'static str, key_id: u16, event: KeyEvent) {
        self(name, key_id, event)
    }
}

