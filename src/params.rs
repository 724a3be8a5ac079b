use glam::Vec3;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const FLOOR_MESH: &str = "/Game/Meshes/Floor_400x400";
pub const WALL_MESH: &str = "/Game/Meshes/Wall_400x400";
pub const OCCLUDER_MESH: &str = "/Game/Meshes/OccluderWall";
/// Edge length of the floor mesh before scaling.
pub const FLOOR_MESH_SIZE: f32 = 400.0;
/// Edge length of one wall panel before scaling.
pub const WALL_MESH_SIZE: f32 = 400.0;
/// Thickness of the floor mesh before scaling.
pub const FLOOR_MESH_THICKNESS: f32 = 10.0;

pub type ParamTable = BTreeMap<ActorKey, ParameterSet>;

/// Functional category of an actor within a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Camera,
    SkySphere,
    Floor,
    Light,
    Walls,
    Object,
    Occluder,
    /// Reserved control channel carrying tick-timing hints; never spawned.
    Magic,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Camera,
        Role::SkySphere,
        Role::Floor,
        Role::Light,
        Role::Walls,
        Role::Object,
        Role::Occluder,
        Role::Magic,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Role::Camera => "Camera",
            Role::SkySphere => "SkySphere",
            Role::Floor => "Floor",
            Role::Light => "Light",
            Role::Walls => "Walls",
            Role::Object => "Object",
            Role::Occluder => "Occluder",
            Role::Magic => "magic",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Role::ALL.into_iter().find(|role| role.label().eq_ignore_ascii_case(label))
    }

    pub fn is_spawnable(self) -> bool {
        !matches!(self, Role::Magic)
    }

    /// Objects and occluders move during ticks and are re-posed between runs.
    pub fn is_dynamic(self) -> bool {
        matches!(self, Role::Object | Role::Occluder)
    }
}

/// Identifies one entry of a scene: a role plus an instance index (`Object_1`).
/// Index 0 denotes the single instance of a role and prints as the bare label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorKey {
    pub role: Role,
    pub index: u32,
}

impl ActorKey {
    pub const MAGIC: ActorKey = ActorKey::single(Role::Magic);

    pub const fn new(role: Role, index: u32) -> Self {
        Self { role, index }
    }

    pub const fn single(role: Role) -> Self {
        Self { role, index: 0 }
    }
}

impl fmt::Display for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 0 {
            write!(f, "{}", self.role.label())
        } else {
            write!(f, "{}_{}", self.role.label(), self.index)
        }
    }
}

impl FromStr for ActorKey {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (label, index) = match raw.rsplit_once('_') {
            Some((label, digits)) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
                let index = digits.parse::<u32>().map_err(|err| format!("Invalid index in '{raw}': {err}"))?;
                (label, index)
            }
            _ => (raw, 0),
        };
        let role = Role::from_label(label).ok_or_else(|| format!("Unknown actor role '{label}'"))?;
        Ok(ActorKey::new(role, index))
    }
}

impl Serialize for ActorKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ActorKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Rotation as three angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Rotator {
    pub const ZERO: Rotator = Rotator { pitch: 0.0, yaw: 0.0, roll: 0.0 };

    pub const fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }
}

/// Opaque identifier of a material or mesh asset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRef(String);

impl AssetRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MeshShape {
    Sphere,
    Cube,
    Cylinder,
    Cone,
}

impl MeshShape {
    /// Shapes drawn for objects. Cone stays selectable explicitly but is not drawn at random.
    pub const OBJECT_SHAPES: [MeshShape; 3] = [MeshShape::Sphere, MeshShape::Cube, MeshShape::Cylinder];

    pub fn asset_path(self) -> &'static str {
        match self {
            MeshShape::Sphere => "/Engine/EngineMeshes/Sphere.Sphere",
            MeshShape::Cube => "/Engine/EngineMeshes/Cube.Cube",
            MeshShape::Cylinder => "/Engine/EngineMeshes/Cylinder.Cylinder",
            MeshShape::Cone => "/Engine/EngineMeshes/Cone.Cone",
        }
    }

    pub fn asset_ref(self) -> AssetRef {
        AssetRef::new(self.asset_path())
    }

    pub fn label(self) -> &'static str {
        match self {
            MeshShape::Sphere => "Sphere",
            MeshShape::Cube => "Cube",
            MeshShape::Cylinder => "Cylinder",
            MeshShape::Cone => "Cone",
        }
    }

    pub fn from_asset_path(path: &str) -> Option<Self> {
        [MeshShape::Sphere, MeshShape::Cube, MeshShape::Cylinder, MeshShape::Cone]
            .into_iter()
            .find(|shape| path.contains(shape.label()))
    }

    /// Friction scale calibrating cross-shape friction parity. Spheres are the reference.
    pub fn friction_scale(self) -> Option<f64> {
        match self {
            MeshShape::Cube => Some(0.6155297517867),
            MeshShape::Cone => Some(1.6962973279499),
            MeshShape::Sphere | MeshShape::Cylinder => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicalProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mass: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friction: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restitution: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightKind {
    SkyLight,
}

/// Per-tick motion of a dynamic actor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Movement {
    #[default]
    Static,
    /// Translate by `step` every tick.
    Dynamic { step: Vec3 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RoleDetail {
    None,
    Walls { height: f32, length: f32, depth: f32 },
    Light { kind: LightKind },
    Object { force: Vec3, movement: Movement },
    Occluder { movement: Movement },
    Magic { tick: Option<u32>, actors: Vec<ActorKey> },
}

/// Generated attributes used to realize one actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSet {
    pub role: Role,
    pub location: Vec3,
    pub rotation: Rotator,
    pub scale: Vec3,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<AssetRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<AssetRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physics: Option<PhysicalProperties>,
    pub hidden: bool,
    pub detail: RoleDetail,
}

impl ParameterSet {
    fn base(role: Role) -> Self {
        Self {
            role,
            location: Vec3::ZERO,
            rotation: Rotator::ZERO,
            scale: Vec3::ONE,
            material: None,
            mesh: None,
            physics: None,
            hidden: false,
            detail: RoleDetail::None,
        }
    }

    pub fn camera(location: Vec3, rotation: Rotator) -> Self {
        Self { location, rotation, ..Self::base(Role::Camera) }
    }

    pub fn sky_sphere() -> Self {
        Self::base(Role::SkySphere)
    }

    pub fn light(kind: LightKind) -> Self {
        Self { detail: RoleDetail::Light { kind }, ..Self::base(Role::Light) }
    }

    pub fn floor(material: AssetRef) -> Self {
        Self::floor_scaled(material, Vec3::new(100.0, 100.0, 1.0))
    }

    /// The location keeps the floor centered on the origin whatever its scale.
    pub fn floor_scaled(material: AssetRef, scale: Vec3) -> Self {
        let location = Vec3::new(
            -(FLOOR_MESH_SIZE * scale.x) / 2.0,
            -(FLOOR_MESH_SIZE * scale.y) / 2.0,
            -(FLOOR_MESH_THICKNESS * scale.z),
        );
        Self {
            location,
            scale,
            material: Some(material),
            mesh: Some(AssetRef::new(FLOOR_MESH)),
            physics: Some(PhysicalProperties { friction: Some(0.5), ..Default::default() }),
            ..Self::base(Role::Floor)
        }
    }

    /// Three-sided enclosure: `length` spans the back wall along x, `depth` the side walls
    /// along y. The location centers the enclosure on the origin.
    pub fn walls(material: AssetRef, height: f32, length: f32, depth: f32) -> Self {
        Self {
            location: Vec3::new(-length / 2.0, -depth / 2.0, 0.0),
            scale: Vec3::new(length / WALL_MESH_SIZE, depth / WALL_MESH_SIZE, height),
            material: Some(material),
            mesh: Some(AssetRef::new(WALL_MESH)),
            detail: RoleDetail::Walls { height, length, depth },
            ..Self::base(Role::Walls)
        }
    }

    pub fn object(shape: MeshShape, location: Vec3, rotation: Rotator, material: AssetRef) -> Self {
        Self {
            location,
            rotation,
            material: Some(material),
            mesh: Some(shape.asset_ref()),
            physics: Some(PhysicalProperties { mass: Some(100.0), ..Default::default() }),
            detail: RoleDetail::Object { force: Vec3::ZERO, movement: Movement::Static },
            ..Self::base(Role::Object)
        }
    }

    pub fn occluder(location: Vec3, rotation: Rotator, scale: Vec3, material: AssetRef, movement: Movement) -> Self {
        Self {
            location,
            rotation,
            scale,
            material: Some(material),
            mesh: Some(AssetRef::new(OCCLUDER_MESH)),
            detail: RoleDetail::Occluder { movement },
            ..Self::base(Role::Occluder)
        }
    }

    pub fn magic(tick: Option<u32>, actors: Vec<ActorKey>) -> Self {
        Self { detail: RoleDetail::Magic { tick, actors }, ..Self::base(Role::Magic) }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Only objects carry a force; other roles are returned unchanged.
    pub fn with_force(mut self, value: Vec3) -> Self {
        if let RoleDetail::Object { force, .. } = &mut self.detail {
            *force = value;
        }
        self
    }

    pub fn mesh_shape(&self) -> Option<MeshShape> {
        self.mesh.as_ref().and_then(|mesh| MeshShape::from_asset_path(mesh.as_str()))
    }

    pub fn mass(&self) -> Option<f32> {
        self.physics.and_then(|physics| physics.mass)
    }

    pub fn friction(&self) -> Option<f32> {
        self.physics.and_then(|physics| physics.friction)
    }

    pub fn restitution(&self) -> Option<f32> {
        self.physics.and_then(|physics| physics.restitution)
    }

    pub fn force(&self) -> Vec3 {
        match self.detail {
            RoleDetail::Object { force, .. } => force,
            _ => Vec3::ZERO,
        }
    }

    pub fn movement(&self) -> Movement {
        match self.detail {
            RoleDetail::Object { movement, .. } | RoleDetail::Occluder { movement } => movement,
            _ => Movement::Static,
        }
    }

    pub fn magic_tick(&self) -> Option<u32> {
        match self.detail {
            RoleDetail::Magic { tick, .. } => tick,
            _ => None,
        }
    }
}
