//! # Input State
//!
//! The renderer reports pointer and button activity as entries of the
//! grow-only `core::PointerEventsResult` component. The input system turns
//! that history into per-tick button state before regular systems run.
//!
//! ## Design
//!
//! - Only entries newer than the last processed timestamp are considered
//! - `was_just_pressed` / `was_just_released` hold for exactly one tick
//! - `is_pressed` persists until the matching UP event arrives
//! - Events are attributed to their hit entity, or to the entity holding the
//!   result when nothing was hit

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tessera_core::{GrowOnlySetOptions, Schema, ValueSetHandle, World};
use tessera_shared::{BufferResult, ByteBuffer, Entity};

use crate::engine::Engine;
use crate::error::EngineResult;

/// Runs ahead of every regular system.
pub const INPUT_SYSTEM_PRIORITY: i32 = 1 << 20;

/// Name of the input system.
pub const INPUT_SYSTEM_NAME: &str = "tessera::input";

/// Component carrying pointer results.
pub const POINTER_EVENTS_RESULT: &str = "core::PointerEventsResult";

/// Entries retained per entity.
pub const POINTER_EVENTS_MAX_ELEMENTS: usize = 100;

/// Kind of pointer event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PointerEventType {
    /// Button released.
    Up = 0,
    /// Button pressed.
    Down = 1,
    /// Pointer started hovering.
    HoverEnter = 2,
    /// Pointer stopped hovering.
    HoverLeave = 3,
}

impl PointerEventType {
    /// Decodes a wire value.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            2 => Some(Self::HoverEnter),
            3 => Some(Self::HoverLeave),
            _ => None,
        }
    }
}

/// One pointer result reported by the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointerEventResult {
    /// Input action id.
    pub button: u32,
    /// Raw [`PointerEventType`].
    pub state: u32,
    /// Monotonic renderer counter.
    pub timestamp: u32,
    /// Raw id of the entity under the pointer, 0 if none.
    pub hit_entity: u32,
}

impl PointerEventResult {
    /// Decoded event type.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> Option<PointerEventType> {
        PointerEventType::from_u32(self.state)
    }

    /// The entity the event is about: the hit entity, or `holder` if the
    /// pointer hit nothing.
    #[inline]
    #[must_use]
    pub const fn target(&self, holder: Entity) -> Entity {
        if self.hit_entity == 0 {
            holder
        } else {
            Entity::from_raw(self.hit_entity)
        }
    }
}

impl Schema for PointerEventResult {
    fn serialize(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.button);
        buf.write_u32(self.state);
        buf.write_u32(self.timestamp);
        buf.write_u32(self.hit_entity);
    }

    fn deserialize(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(Self {
            button: buf.read_u32()?,
            state: buf.read_u32()?,
            timestamp: buf.read_u32()?,
            hit_entity: buf.read_u32()?,
        })
    }
}

fn event_timestamp(event: &PointerEventResult) -> u64 {
    u64::from(event.timestamp)
}

/// Button state derived from pointer results.
#[derive(Debug, Default)]
pub struct InputState {
    pressed: HashSet<u32>,
    just_pressed: Vec<(u32, Entity)>,
    just_released: Vec<(u32, Entity)>,
    last_timestamp: Option<u32>,
}

impl InputState {
    /// True while the button is held down.
    #[inline]
    #[must_use]
    pub fn is_pressed(&self, button: u32) -> bool {
        self.pressed.contains(&button)
    }

    /// True if the button went down this tick, optionally on a given entity.
    #[must_use]
    pub fn was_just_pressed(&self, button: u32, entity: Option<Entity>) -> bool {
        Self::matches(&self.just_pressed, button, entity)
    }

    /// True if the button went up this tick, optionally on a given entity.
    #[must_use]
    pub fn was_just_released(&self, button: u32, entity: Option<Entity>) -> bool {
        Self::matches(&self.just_released, button, entity)
    }

    fn matches(events: &[(u32, Entity)], button: u32, entity: Option<Entity>) -> bool {
        events
            .iter()
            .any(|&(b, e)| b == button && entity.map_or(true, |target| target == e))
    }

    /// Folds in every event newer than the last processed one.
    pub fn process<'a>(&mut self, events: impl IntoIterator<Item = (Entity, &'a PointerEventResult)>) {
        self.just_pressed.clear();
        self.just_released.clear();

        let mut fresh: Vec<_> = events
            .into_iter()
            .filter(|(_, ev)| self.last_timestamp.map_or(true, |last| ev.timestamp > last))
            .collect();
        fresh.sort_by_key(|(_, ev)| ev.timestamp);

        for (holder, event) in fresh {
            let entity = event.target(holder);
            match event.kind() {
                Some(PointerEventType::Down) => {
                    self.pressed.insert(event.button);
                    self.just_pressed.push((event.button, entity));
                }
                Some(PointerEventType::Up) => {
                    self.pressed.remove(&event.button);
                    self.just_released.push((event.button, entity));
                }
                Some(PointerEventType::HoverEnter | PointerEventType::HoverLeave) | None => {}
            }
            self.last_timestamp = Some(event.timestamp);
        }
    }
}

/// Shared handle onto the input state, readable from any system.
#[derive(Clone, Debug, Default)]
pub struct InputHandle(Arc<Mutex<InputState>>);

impl InputHandle {
    /// See [`InputState::is_pressed`].
    #[must_use]
    pub fn is_pressed(&self, button: u32) -> bool {
        self.0.lock().is_pressed(button)
    }

    /// See [`InputState::was_just_pressed`].
    #[must_use]
    pub fn was_just_pressed(&self, button: u32, entity: Option<Entity>) -> bool {
        self.0.lock().was_just_pressed(button, entity)
    }

    /// See [`InputState::was_just_released`].
    #[must_use]
    pub fn was_just_released(&self, button: u32, entity: Option<Entity>) -> bool {
        self.0.lock().was_just_released(button, entity)
    }
}

/// Defines the pointer-results component and installs the input system.
///
/// # Errors
///
/// Fails if the component cannot be defined or the system already exists.
pub fn register_input_system(engine: &mut Engine) -> EngineResult<InputHandle> {
    let results: ValueSetHandle<PointerEventResult> = engine.world_mut().define_value_set_component(
        POINTER_EVENTS_RESULT,
        GrowOnlySetOptions {
            max_elements: POINTER_EVENTS_MAX_ELEMENTS,
            timestamp: event_timestamp,
        },
    )?;

    let handle = InputHandle::default();
    let state = Arc::clone(&handle.0);
    engine.add_system(
        move |world: &mut World, _: f32| -> EngineResult<()> {
            let store = world.value_set(results)?;
            state.lock().process(
                store
                    .iter()
                    .flat_map(|(entity, events)| events.iter().map(move |ev| (entity, ev))),
            );
            Ok(())
        },
        INPUT_SYSTEM_PRIORITY,
        INPUT_SYSTEM_NAME,
    )?;
    Ok(handle)
}
