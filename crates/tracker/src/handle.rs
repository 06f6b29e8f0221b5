use std::fmt;
use std::num::NonZeroU64;

/// Opaque reference into the host-owned object graph.
///
/// A handle carries no liveness guarantee. The host may destroy the object it
/// names at any time; only [`HandleOracle::is_live`] can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(NonZeroU64);

impl Handle {
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

impl From<NonZeroU64> for Handle {
    fn from(raw: NonZeroU64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.raw())
    }
}

/// Host type name a handle is expected to denote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag(pub &'static str);

impl TypeTag {
    pub const TRANSFORM: TypeTag = TypeTag("via.Transform");
    pub const GAME_OBJECT: TypeTag = TypeTag("via.GameObject");
    pub const MOTION: TypeTag = TypeTag("via.motion.Animation");
    pub const HUNTER_CHARACTER: TypeTag = TypeTag("app.HunterCharacter");
    pub const HUNTER_CREATE_INFO: TypeTag = TypeTag("app.cHunterCreateInfo");
    pub const MESH_BOUNDARY: TypeTag = TypeTag("ace.MeshBoundary");
    pub const VOLUME_OCCLUDEE: TypeTag = TypeTag("via.render.VolumeOccludee");
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Capability check for captured handles.
///
/// Not infallible (the host may recycle an address for an object of the same
/// type), but it is the only staleness signal available.
pub trait HandleOracle {
    fn is_live(&self, handle: Handle, tag: TypeTag) -> bool;
}

/// Weak external reference: a handle plus the type it was captured as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalRef {
    pub handle: Handle,
    pub tag: TypeTag,
}

impl ExternalRef {
    pub fn new(handle: Handle, tag: TypeTag) -> Self {
        Self { handle, tag }
    }

    pub fn transform(handle: Handle) -> Self {
        Self::new(handle, TypeTag::TRANSFORM)
    }

    pub fn game_object(handle: Handle) -> Self {
        Self::new(handle, TypeTag::GAME_OBJECT)
    }

    pub fn is_live(&self, oracle: &(impl HandleOracle + ?Sized)) -> bool {
        oracle.is_live(self.handle, self.tag)
    }
}

/// True when every present reference is still live. Absent references pass.
pub(crate) fn all_live<'a>(
    oracle: &(impl HandleOracle + ?Sized),
    refs: impl IntoIterator<Item = &'a Option<ExternalRef>>,
) -> bool {
    refs.into_iter()
        .flatten()
        .all(|reference| reference.is_live(oracle))
}
