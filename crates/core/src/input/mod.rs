//! Keyboard routing and the matrix-mode hotkey.

use serde::{Deserialize, Serialize};

use crate::{effect::EffectPatch, store::ConfigStore, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Letter keys, stored upper-case.
    Char(char),
    /// Anything else, by host key code.
    Other(u32),
}

impl Key {
    pub fn letter(value: char) -> Self {
        Self::Char(value.to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub logo: bool,
}

impl Modifiers {
    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
        alt: false,
        logo: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub state: KeyState,
    pub modifiers: Modifiers,
    /// Set by the host for auto-repeat while a key is held.
    pub repeat: bool,
}

impl KeyEvent {
    pub fn pressed(key: Key, modifiers: Modifiers) -> Self {
        Self {
            key,
            state: KeyState::Pressed,
            modifiers,
            repeat: false,
        }
    }

    pub fn released(key: Key, modifiers: Modifiers) -> Self {
        Self {
            state: KeyState::Released,
            ..Self::pressed(key, modifiers)
        }
    }

    pub fn repeated(self) -> Self {
        Self {
            repeat: true,
            ..self
        }
    }
}

/// What a held chord does after its first key-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatPolicy {
    /// Only the rising edge toggles.
    #[default]
    Ignore,
    /// Every key-down, auto-repeat included, toggles.
    Toggle,
}

pub trait KeyListener: Send {
    /// Returns whether the event was consumed.
    fn on_key(&mut self, event: &KeyEvent) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Global key dispatch. Listeners are installed at mount and removed on
/// teardown.
#[derive(Default)]
pub struct KeyboardRouter {
    listeners: Vec<(ListenerId, Box<dyn KeyListener>)>,
    next_id: u64,
}

impl KeyboardRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, listener: Box<dyn KeyListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Offers the event to every listener; returns how many consumed it.
    pub fn dispatch(&mut self, event: &KeyEvent) -> Result<usize> {
        let mut consumed = 0;
        for (_, listener) in &mut self.listeners {
            if listener.on_key(event)? {
                consumed += 1;
            }
        }
        Ok(consumed)
    }
}

impl std::fmt::Debug for KeyboardRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyboardRouter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Flips `matrix_mode` on shift+R. Auto-repeat is recognised from the host's
/// `repeat` flag alone; key-ups are not tracked.
#[derive(Debug)]
pub struct MatrixToggle {
    store: ConfigStore,
    policy: RepeatPolicy,
}

impl MatrixToggle {
    pub const KEY: Key = Key::Char('R');

    pub fn new(store: ConfigStore, policy: RepeatPolicy) -> Self {
        Self { store, policy }
    }

    fn toggle(&self) -> Result<()> {
        // The flip is computed inside the store lock from the live value.
        self.store.merge_with(|config| EffectPatch {
            matrix_mode: Some(!config.matrix_mode),
            ..Default::default()
        })?;
        tracing::info!(
            matrix_mode = self.store.read(|config| config.matrix_mode)?,
            "matrix mode toggled"
        );
        Ok(())
    }
}

impl KeyListener for MatrixToggle {
    fn on_key(&mut self, event: &KeyEvent) -> Result<bool> {
        if event.key != Self::KEY || event.state != KeyState::Pressed || !event.modifiers.shift {
            return Ok(false);
        }
        if event.repeat && self.policy == RepeatPolicy::Ignore {
            return Ok(false);
        }
        self.toggle()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift_r() -> KeyEvent {
        KeyEvent::pressed(Key::letter('r'), Modifiers::SHIFT)
    }

    fn matrix(store: &ConfigStore) -> bool {
        store.read(|config| config.matrix_mode).unwrap()
    }

    #[test]
    fn toggling_twice_is_an_involution() {
        let store = ConfigStore::default();
        let mut toggle = MatrixToggle::new(store.clone(), RepeatPolicy::Ignore);
        let release = KeyEvent::released(MatrixToggle::KEY, Modifiers::SHIFT);

        assert!(toggle.on_key(&shift_r()).unwrap());
        assert!(matrix(&store));
        toggle.on_key(&release).unwrap();
        assert!(toggle.on_key(&shift_r()).unwrap());
        assert!(!matrix(&store));
    }

    #[test]
    fn requires_shift() {
        let store = ConfigStore::default();
        let mut toggle = MatrixToggle::new(store.clone(), RepeatPolicy::Toggle);

        let plain = KeyEvent::pressed(Key::letter('r'), Modifiers::default());
        assert!(!toggle.on_key(&plain).unwrap());
        let other = KeyEvent::pressed(Key::letter('t'), Modifiers::SHIFT);
        assert!(!toggle.on_key(&other).unwrap());
        assert!(!matrix(&store));
    }

    #[test]
    fn held_key_toggles_once_by_default() {
        let store = ConfigStore::default();
        let mut toggle = MatrixToggle::new(store.clone(), RepeatPolicy::Ignore);

        toggle.on_key(&shift_r()).unwrap();
        for _ in 0..5 {
            assert!(!toggle.on_key(&shift_r().repeated()).unwrap());
        }
        assert!(matrix(&store));
    }

    #[test]
    fn lost_release_does_not_block_the_next_press() {
        let store = ConfigStore::default();
        let mut toggle = MatrixToggle::new(store.clone(), RepeatPolicy::Ignore);

        assert!(toggle.on_key(&shift_r()).unwrap());
        // Focus moved away while R was down; its key-up never arrived.
        assert!(toggle.on_key(&shift_r()).unwrap());
        assert!(!matrix(&store));
        assert!(toggle.on_key(&shift_r()).unwrap());
        assert!(matrix(&store));
    }

    #[test]
    fn toggle_policy_flips_on_every_repeat() {
        let store = ConfigStore::default();
        let mut toggle = MatrixToggle::new(store.clone(), RepeatPolicy::Toggle);

        toggle.on_key(&shift_r()).unwrap();
        toggle.on_key(&shift_r().repeated()).unwrap();
        toggle.on_key(&shift_r().repeated()).unwrap();
        assert!(matrix(&store));
    }

    #[test]
    fn reads_live_value_after_external_merges() {
        let store = ConfigStore::default();
        let mut router = KeyboardRouter::new();
        router.install(Box::new(MatrixToggle::new(store.clone(), RepeatPolicy::Ignore)));

        store
            .merge(EffectPatch {
                matrix_mode: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(router.dispatch(&shift_r()).unwrap(), 1);
        assert!(!matrix(&store));
    }

    #[test]
    fn removed_listeners_stop_receiving_events() {
        let store = ConfigStore::default();
        let mut router = KeyboardRouter::new();
        let id = router.install(Box::new(MatrixToggle::new(store.clone(), RepeatPolicy::Ignore)));

        assert!(router.remove(id));
        assert!(!router.remove(id));
        assert!(router.is_empty());
        assert_eq!(router.dispatch(&shift_r()).unwrap(), 0);
        assert!(!matrix(&store));
    }
}
