//! Non-destructive visibility overlay parallel to the arena.
//!
//! Each slot carries a [`FilterState`]. Filtering never removes a node; it
//! only hides it from default iteration and traversal while the global
//! switch is on. [`TurnFilterOffSafely`] turns the switch off for a scope.

use std::cell::Cell;
use std::io::{self, Read, Write};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::NodeId;
use crate::io::{BinaryReader, BinaryWriter};

const TAG: &[u8] = b"FILTER";

/// Per-node visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterState {
    Filtered,
    #[default]
    NotFiltered,
    /// Visible itself, descendants keep their own state.
    NotFilteredThisNodeOnly,
}

impl FilterState {
    fn code(self) -> u8 {
        match self {
            FilterState::Filtered => 0,
            FilterState::NotFiltered => 1,
            FilterState::NotFilteredThisNodeOnly => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FilterState::Filtered),
            1 => Some(FilterState::NotFiltered),
            2 => Some(FilterState::NotFilteredThisNodeOnly),
            _ => None,
        }
    }
}

/// The state vector plus the shared on/off switch.
#[derive(Debug)]
pub struct Filter {
    states: Vec<FilterState>,
    on: Rc<Cell<bool>>,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            states: Vec::new(),
            on: Rc::new(Cell::new(true)),
        }
    }
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grows or shrinks to `len` slots; new slots are `NotFiltered`.
    pub fn resize(&mut self, len: usize) {
        self.states.resize(len, FilterState::NotFiltered);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, id: NodeId) -> FilterState {
        self.states.get(id.index()).copied().unwrap_or_default()
    }

    pub fn set_state(&mut self, id: NodeId, state: FilterState) {
        if id.index() >= self.states.len() {
            self.resize(id.index() + 1);
        }
        self.states[id.index()] = state;
    }

    /// Stored state gated by the switch.
    pub fn is_filtered(&self, id: NodeId) -> bool {
        self.on.get() && self.state(id) == FilterState::Filtered
    }

    pub fn is_on(&self) -> bool {
        self.on.get()
    }

    pub fn turn_on(&self) {
        self.on.set(true);
    }

    pub fn turn_off(&self) {
        self.on.set(false);
    }

    /// Turns filtering off until the guard drops.
    pub fn turn_off_safely(&self) -> TurnFilterOffSafely {
        TurnFilterOffSafely::new(Rc::clone(&self.on))
    }

    /// Resets every slot to `NotFiltered`. The switch is left alone.
    pub fn initialize(&mut self) {
        self.states.fill(FilterState::NotFiltered);
    }

    pub fn filtered_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| **s == FilterState::Filtered)
            .count()
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.on.set(true);
    }

    pub fn save<W: Write>(&self, w: &mut BinaryWriter<W>) -> io::Result<()> {
        w.write_bytes(TAG)?;
        w.write_u32(self.states.len() as u32)?;
        for state in &self.states {
            w.write_u8(state.code())?;
        }
        Ok(())
    }

    /// Replaces the states with a saved filter covering exactly
    /// `arena_len` slots. On failure the current states are kept.
    pub fn load<R: Read>(
        &mut self,
        r: &mut BinaryReader<R>,
        arena_len: usize,
    ) -> Result<(), CoreError> {
        r.expect_tag(TAG)?;
        let found = r.read_u32()? as usize;
        if found != arena_len {
            return Err(CoreError::FilterSizeMismatch {
                expected: arena_len,
                found,
            });
        }
        let mut states = Vec::with_capacity(found);
        for _ in 0..found {
            let code = r.read_u8()?;
            let state = FilterState::from_code(code).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown filter state {code}"),
                )
            })?;
            states.push(state);
        }
        self.states = states;
        Ok(())
    }
}

/// Scope guard that disables filtering and restores the previous switch
/// position on drop.
#[must_use = "filtering is restored as soon as the guard is dropped"]
pub struct TurnFilterOffSafely {
    on: Rc<Cell<bool>>,
    was_on: bool,
}

impl TurnFilterOffSafely {
    fn new(on: Rc<Cell<bool>>) -> Self {
        let was_on = on.replace(false);
        TurnFilterOffSafely { on, was_on }
    }
}

impl Drop for TurnFilterOffSafely {
    fn drop(&mut self) {
        self.on.set(self.was_on);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn switch_gates_is_filtered() {
        let mut filter = Filter::new();
        filter.resize(110);
        filter.set_state(NodeId(105), FilterState::Filtered);
        assert!(filter.is_filtered(NodeId(105)));
        filter.turn_off();
        assert!(!filter.is_filtered(NodeId(105)));
        assert_eq!(filter.state(NodeId(105)), FilterState::Filtered);
    }

    #[test]
    fn guard_restores_on_every_exit() {
        let filter = Filter::new();
        fn fails(filter: &Filter) -> Result<(), ()> {
            let _guard = filter.turn_off_safely();
            assert!(!filter.is_on());
            Err(())
        }
        assert!(fails(&filter).is_err());
        assert!(filter.is_on());

        filter.turn_off();
        {
            let _guard = filter.turn_off_safely();
        }
        assert!(!filter.is_on());
    }

    #[test]
    fn nested_guards_unwind_in_order() {
        let filter = Filter::new();
        let outer = filter.turn_off_safely();
        let inner = filter.turn_off_safely();
        drop(inner);
        assert!(!filter.is_on());
        drop(outer);
        assert!(filter.is_on());
    }

    #[test]
    fn initialize_clears_states() {
        let mut filter = Filter::new();
        filter.set_state(NodeId(101), FilterState::Filtered);
        filter.set_state(NodeId(102), FilterState::NotFilteredThisNodeOnly);
        assert_eq!(filter.filtered_count(), 1);
        filter.initialize();
        assert_eq!(filter.filtered_count(), 0);
        assert_eq!(filter.state(NodeId(102)), FilterState::NotFiltered);
        assert_eq!(filter.len(), 103);
    }

    #[test]
    fn save_load_roundtrip() {
        let mut filter = Filter::new();
        filter.resize(104);
        filter.set_state(NodeId(101), FilterState::Filtered);
        filter.set_state(NodeId(103), FilterState::NotFilteredThisNodeOnly);
        let mut w = BinaryWriter::new(Vec::new());
        filter.save(&mut w).unwrap();

        let mut loaded = Filter::new();
        let mut r = BinaryReader::new(Cursor::new(w.into_inner()));
        loaded.load(&mut r, 104).unwrap();
        assert_eq!(loaded.state(NodeId(101)), FilterState::Filtered);
        assert_eq!(loaded.state(NodeId(103)), FilterState::NotFilteredThisNodeOnly);
        assert_eq!(loaded.state(NodeId(102)), FilterState::NotFiltered);
    }

    #[test]
    fn load_rejects_size_mismatch_and_keeps_states() {
        let mut small = Filter::new();
        small.resize(50);
        let mut w = BinaryWriter::new(Vec::new());
        small.save(&mut w).unwrap();

        let mut filter = Filter::new();
        filter.resize(104);
        filter.set_state(NodeId(101), FilterState::Filtered);
        let mut r = BinaryReader::new(Cursor::new(w.into_inner()));
        let err = filter.load(&mut r, 104).unwrap_err();
        assert!(matches!(
            err,
            CoreError::FilterSizeMismatch { expected: 104, found: 50 }
        ));
        assert!(filter.is_filtered(NodeId(101)));
    }
}
