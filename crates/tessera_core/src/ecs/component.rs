//! # Components
//!
//! Component identity, value schemas, and the object-safe interface every
//! component store exposes to the replication engine.
//!
//! ## Identity
//!
//! Component ids must agree between replicas without coordination:
//! - Core components use a fixed table (ids below `1 << 11`)
//! - Everything else hashes its name: `crc32(name) + (1 << 11)`

use std::any::Any;
use std::collections::{HashSet, VecDeque};

use tessera_shared::{
    BufferResult, ByteBuffer, ComponentId, CrdtMessage, Entity, MAX_STATIC_COMPONENT,
};

/// Fixed ids of the core components understood by every host.
pub const CORE_COMPONENTS: &[(&str, u32)] = &[
    ("core::Transform", 1),
    ("core::Material", 1017),
    ("core::MeshRenderer", 1018),
    ("core::MeshCollider", 1019),
    ("core::AudioSource", 1020),
    ("core::AudioStream", 1021),
    ("core::TextShape", 1030),
    ("core::NftShape", 1040),
    ("core::GltfContainer", 1041),
    ("core::Animator", 1042),
    ("core::VideoPlayer", 1043),
    ("core::VideoEvent", 1044),
    ("core::EngineInfo", 1048),
    ("core::GltfContainerLoadingState", 1049),
    ("core::UiTransform", 1050),
    ("core::UiText", 1052),
    ("core::UiBackground", 1053),
    ("core::UiCanvasInformation", 1054),
    ("core::TriggerArea", 1060),
    ("core::TriggerAreaResult", 1061),
    ("core::PointerEvents", 1062),
    ("core::PointerEventsResult", 1063),
    ("core::Raycast", 1067),
    ("core::RaycastResult", 1068),
    ("core::AvatarModifierArea", 1070),
    ("core::CameraModeArea", 1071),
    ("core::CameraMode", 1072),
    ("core::AvatarAttach", 1073),
    ("core::PointerLock", 1074),
    ("core::MainCamera", 1075),
    ("core::VirtualCamera", 1076),
    ("core::InputModifier", 1078),
    ("core::LightSource", 1079),
    ("core::AvatarShape", 1080),
    ("core::VisibilityComponent", 1081),
    ("core::AvatarBase", 1087),
    ("core::AvatarEmoteCommand", 1088),
    ("core::PlayerIdentityData", 1089),
    ("core::Billboard", 1090),
    ("core::AvatarEquippedData", 1091),
    ("core::UiInput", 1093),
    ("core::UiDropdown", 1094),
    ("core::UiInputResult", 1095),
    ("core::UiDropdownResult", 1096),
    ("core::MapPin", 1097),
    ("core::GltfNodeModifiers", 1099),
    ("core::Tween", 1102),
    ("core::TweenState", 1103),
    ("core::TweenSequence", 1104),
    ("core::AudioEvent", 1105),
    ("core::RealmInfo", 1106),
    ("core::GltfNode", 1200),
    ("core::GltfNodeState", 1201),
    ("core::UiScrollResult", 1202),
    ("core::UiCanvas", 1203),
    ("core::GlobalLight", 1206),
    ("core::TextureCamera", 1207),
    ("core::CameraLayers", 1208),
    ("core::PrimaryPointerInfo", 1209),
    ("core::SkyboxTime", 1210),
    ("core::CameraLayer", 1211),
];

/// Derives the component id for a name.
///
/// Core names resolve through [`CORE_COMPONENTS`]. Any other name hashes to
/// `crc32(utf8(name))` offset by `1 << 11`, wrapping at 32 bits.
#[must_use]
pub fn component_number_from_name(name: &str) -> ComponentId {
    if let Some(&(_, id)) = CORE_COMPONENTS.iter().find(|(core, _)| *core == name) {
        return ComponentId(id);
    }
    ComponentId(crc32fast::hash(name.as_bytes()).wrapping_add(MAX_STATIC_COMPONENT))
}

/// Name of a core component id, if it is one.
#[must_use]
pub fn core_component_name(id: ComponentId) -> Option<&'static str> {
    CORE_COMPONENTS
        .iter()
        .find(|&&(_, core)| core == id.0)
        .map(|&(name, _)| name)
}

/// True for ids from the static range (known to every host).
#[inline]
#[must_use]
pub const fn is_static_component(id: ComponentId) -> bool {
    id.0 < MAX_STATIC_COMPONENT
}

// =============================================================================
// Schemas
// =============================================================================

/// Binary value encoding for component payloads.
///
/// Encodings are opaque to the replication core; only the bytes are compared.
pub trait Schema: Sized + Send + Sync + 'static {
    /// Appends the encoded value to `buf`.
    fn serialize(&self, buf: &mut ByteBuffer);

    /// Reads a value from `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are truncated or malformed.
    fn deserialize(buf: &mut ByteBuffer) -> BufferResult<Self>;

    /// Encodes the value into a fresh byte vector.
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::new();
        self.serialize(&mut buf);
        buf.into_vec()
    }

    /// Decodes a value from a byte slice.
    ///
    /// # Errors
    ///
    /// See [`Schema::deserialize`].
    fn from_bytes(bytes: &[u8]) -> BufferResult<Self> {
        Self::deserialize(&mut ByteBuffer::from(bytes))
    }
}

macro_rules! primitive_schema {
    ($ty:ty, $write:ident, $read:ident) => {
        impl Schema for $ty {
            fn serialize(&self, buf: &mut ByteBuffer) {
                buf.$write(*self);
            }

            fn deserialize(buf: &mut ByteBuffer) -> BufferResult<Self> {
                buf.$read()
            }
        }
    };
}

primitive_schema!(u8, write_u8, read_u8);
primitive_schema!(u32, write_u32, read_u32);
primitive_schema!(i32, write_i32, read_i32);
primitive_schema!(u64, write_u64, read_u64);
primitive_schema!(f32, write_f32, read_f32);
primitive_schema!(f64, write_f64, read_f64);

impl Schema for bool {
    fn serialize(&self, buf: &mut ByteBuffer) {
        buf.write_u8(u8::from(*self));
    }

    fn deserialize(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(buf.read_u8()? != 0)
    }
}

impl Schema for String {
    fn serialize(&self, buf: &mut ByteBuffer) {
        buf.write_utf8_string(self, true);
    }

    fn deserialize(buf: &mut ByteBuffer) -> BufferResult<Self> {
        buf.read_utf8_string()
    }
}

/// Opaque payload: the bytes are the value.
impl Schema for Vec<u8> {
    fn serialize(&self, buf: &mut ByteBuffer) {
        buf.write_bytes(self, false);
    }

    fn deserialize(buf: &mut ByteBuffer) -> BufferResult<Self> {
        let len = buf.remaining_bytes();
        Ok(buf.read_raw(len)?.to_vec())
    }
}

// =============================================================================
// Store interface
// =============================================================================

/// Replication strategy of a component store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// One value per entity, last writer wins.
    LastWriteWinElementSet,
    /// Bounded append-only history per entity.
    GrowOnlyValueSet,
}

/// Outcome of applying a remote message to a store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CrdtUpdate {
    /// Correction to send back when local state won.
    pub conflict: Option<CrdtMessage>,
    /// Serialized value for the entity after the message was applied.
    pub data: Option<Vec<u8>>,
    /// The message was dropped without touching the store, so it must not be
    /// relayed or reported as a change.
    pub rejected: bool,
}

impl CrdtUpdate {
    /// An update that needs no correction.
    #[must_use]
    pub const fn accepted(data: Option<Vec<u8>>) -> Self {
        Self {
            conflict: None,
            data,
            rejected: false,
        }
    }

    /// A message the store could not apply, such as an undecodable payload.
    #[must_use]
    pub const fn rejected() -> Self {
        Self {
            conflict: None,
            data: None,
            rejected: true,
        }
    }
}

/// Type-erased view of a component store used by the world and the
/// replication engine.
pub trait ComponentDefinition: Any + Send {
    /// Wire id.
    fn component_id(&self) -> ComponentId;

    /// Registered name.
    fn component_name(&self) -> &str;

    /// Replication strategy.
    fn component_type(&self) -> ComponentType;

    /// True if the entity currently holds a value.
    fn has(&self, entity: Entity) -> bool;

    /// Drops the entity's state. With `mark_as_dirty`, the removal is
    /// replicated on the next send.
    fn entity_deleted(&mut self, entity: Entity, mark_as_dirty: bool);

    /// Entities currently holding a value.
    fn entities(&self) -> Vec<Entity>;

    /// Entities with unsent local changes.
    fn dirty_entities(&self) -> Vec<Entity>;

    /// Drains pending local changes as outgoing messages.
    fn crdt_updates(&mut self) -> Vec<CrdtMessage>;

    /// Applies a remote message addressed to this component.
    fn update_from_crdt(&mut self, message: &CrdtMessage) -> CrdtUpdate;

    /// Writes the full current state as messages, one per value, keeping
    /// only those `filter` admits.
    fn dump_crdt_state_to_buffer(
        &self,
        buf: &mut ByteBuffer,
        filter: &dyn Fn(&CrdtMessage) -> bool,
    );

    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for typed mutable access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// =============================================================================
// Dirty tracking
// =============================================================================

/// Set of entities with pending changes, iterated in the order they were
/// first marked.
#[derive(Clone, Debug, Default)]
pub(crate) struct DirtySet {
    order: VecDeque<Entity>,
    members: HashSet<Entity>,
}

impl DirtySet {
    pub(crate) fn insert(&mut self, entity: Entity) {
        if self.members.insert(entity) {
            self.order.push_back(entity);
        }
    }

    pub(crate) fn remove(&mut self, entity: Entity) {
        if self.members.remove(&entity) {
            self.order.retain(|&e| e != entity);
        }
    }

    pub(crate) fn pop_front(&mut self) -> Option<Entity> {
        let entity = self.order.pop_front()?;
        self.members.remove(&entity);
        Some(entity)
    }

    pub(crate) fn contains(&self, entity: Entity) -> bool {
        self.members.contains(&entity)
    }

    pub(crate) fn to_vec(&self) -> Vec<Entity> {
        self.order.iter().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}
