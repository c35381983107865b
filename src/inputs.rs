//! Action-based input state.
//!
//! Raw key codes arrive from whatever host loop owns the window (or from a
//! script in headless runs) and are resolved to named actions through a
//! binding table. Category filters let one binding table serve several
//! control contexts: a binding only engages while one of its categories is
//! active.
//!
//! Per-frame queries read a latched snapshot taken by [`Inputs::latch`], so
//! edge detection is stable no matter when during the frame the host
//! delivered its events.

use std::collections::HashSet;

/// Action names shared by the default bindings and the gameplay code.
pub mod actions {
    pub const FORWARD: &str = "forward";
    pub const BACKWARD: &str = "backward";
    pub const LEFT: &str = "left";
    pub const RIGHT: &str = "right";
    pub const BOOST: &str = "boost";
    pub const BRAKE: &str = "brake";
    pub const JUMP: &str = "jump";
    pub const RESET: &str = "reset";
}

/// One action binding: the keys that trigger it and the categories it
/// belongs to.
#[derive(Debug, Clone)]
pub struct ActionMap {
    pub name: String,
    pub categories: Vec<String>,
    pub keys: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Inputs {
    maps: Vec<ActionMap>,
    filters: Vec<String>,
    held: HashSet<String>,
    latched: HashSet<String>,
    prev: HashSet<String>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_map(&mut self, name: &str, categories: Vec<String>, keys: Vec<String>) {
        self.maps.push(ActionMap {
            name: name.to_string(),
            categories,
            keys,
        });
    }

    /// Restrict which binding categories are live. An empty filter list keeps
    /// every binding live.
    pub fn set_filters(&mut self, filters: Vec<String>) {
        tracing::debug!(?filters, "input category filters changed");
        self.filters = filters;
    }

    fn allowed(&self, map: &ActionMap) -> bool {
        if self.filters.is_empty() || map.categories.is_empty() {
            return true;
        }
        map.categories.iter().any(|c| self.filters.contains(c))
    }

    /// Feed a key-down event. Bindings outside the active categories ignore
    /// it; an already-held action stays held (host key repeat).
    pub fn key_down(&mut self, code: &str) {
        let mut triggered = Vec::new();
        for map in &self.maps {
            if map.keys.iter().any(|k| k == code) && self.allowed(map) {
                triggered.push(map.name.clone());
            }
        }
        for name in triggered {
            if self.held.insert(name.clone()) {
                tracing::trace!(action = %name, key = %code, "action engaged");
            }
        }
    }

    /// Feed a key-up event. Releases are never filtered so an action cannot
    /// stick when the category set changes mid-hold.
    pub fn key_up(&mut self, code: &str) {
        let released: Vec<_> = self
            .maps
            .iter()
            .filter(|map| map.keys.iter().any(|k| k == code))
            .map(|map| map.name.clone())
            .collect();
        for name in released {
            if self.held.remove(&name) {
                tracing::trace!(action = %name, key = %code, "action released");
            }
        }
    }

    /// Drop every held action, as when the host window loses focus.
    pub fn release_all(&mut self) {
        if !self.held.is_empty() {
            tracing::debug!(count = self.held.len(), "releasing all held actions");
        }
        self.held.clear();
    }

    /// Snapshot the held set for this frame's queries.
    pub fn latch(&mut self) {
        self.prev = std::mem::take(&mut self.latched);
        self.latched = self.held.clone();
    }

    pub fn is_held(&self, action: &str) -> bool {
        self.latched.contains(action)
    }

    pub fn just_pressed(&self, action: &str) -> bool {
        self.latched.contains(action) && !self.prev.contains(action)
    }

    pub fn just_released(&self, action: &str) -> bool {
        !self.latched.contains(action) && self.prev.contains(action)
    }
}
