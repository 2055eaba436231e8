use std::convert::TryFrom;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Mat4, Quat, Vec3};
use indexmap::IndexMap;
use strum_macros::FromRepr;

use crate::asset::animation::AnimationChannel;
use crate::asset::bi_tree::BiTreeModel;
use crate::asset::effect::{Color, RenderDeferredLiquidEffect};
use crate::asset::geometry::{IndexBuffer, VertexBuffer, VertexDeclaration};
use crate::asset::model::Model;
use crate::asset::{Asset, TypeReader};
use crate::io_ext::ContentReadExt;
use crate::XnbError;

type Result<T> = std::result::Result<T, XnbError>;

const MAX_COLLISION_MESHES: usize = 10;

#[derive(Debug)]
pub struct LevelModel {
    pub model: BiTreeModel,
    pub animated_parts: Vec<AnimatedLevelPart>,
    pub lights: Vec<LevelModelLight>,
    pub effect_storages: Vec<EffectStorage>,
    pub physics_entity_storages: Vec<PhysicsEntityStorage>,
    pub liquids: Vec<Liquid>,
    pub force_fields: Vec<ForceField>,
    pub collision_meshes: Vec<TriangleMesh>,
    pub camera_mesh: Option<TriangleMesh>,
    pub trigger_areas: Vec<TriggerArea>,
    pub locators: Vec<Locator>,
    pub nav_mesh: NavMesh,
}

impl LevelModel {
    pub fn read(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<Self> {
        let model = Asset::read(reader, type_readers)?.expect_bi_tree_model()?;

        let num_animated_parts = reader.read_i32::<LittleEndian>()?;
        let mut animated_parts = Vec::with_capacity(num_animated_parts as usize);
        for _ in 0..num_animated_parts {
            animated_parts.push(AnimatedLevelPart::read(reader, type_readers)?);
        }

        let num_lights = reader.read_i32::<LittleEndian>()?;
        let mut lights = Vec::with_capacity(num_lights as usize);
        for _ in 0..num_lights {
            lights.push(LevelModelLight::read(reader)?);
        }

        let effect_storages = read_effect_storages(reader)?;

        let num_physics_entities = reader.read_i32::<LittleEndian>()?;
        let mut physics_entity_storages = Vec::with_capacity(num_physics_entities as usize);
        for _ in 0..num_physics_entities {
            physics_entity_storages.push(PhysicsEntityStorage::read(reader)?);
        }

        let liquids = read_liquids(reader, type_readers)?;

        let num_force_fields = reader.read_i32::<LittleEndian>()?;
        let mut force_fields = Vec::with_capacity(num_force_fields as usize);
        for _ in 0..num_force_fields {
            force_fields.push(ForceField::read(reader, type_readers)?);
        }

        // ten fixed slots; absent entries are skipped rather than filled
        let mut collision_meshes = Vec::with_capacity(MAX_COLLISION_MESHES);
        for _ in 0..MAX_COLLISION_MESHES {
            if reader.read_bool()? {
                collision_meshes.push(TriangleMesh::read(reader, type_readers)?);
            }
        }

        let camera_mesh = if reader.read_bool()? {
            Some(TriangleMesh::read(reader, type_readers)?)
        } else {
            None
        };

        let num_trigger_areas = reader.read_i32::<LittleEndian>()?;
        let mut trigger_areas = Vec::with_capacity(num_trigger_areas as usize);
        for _ in 0..num_trigger_areas {
            trigger_areas.push(TriggerArea::read(reader)?);
        }

        let num_locators = reader.read_i32::<LittleEndian>()?;
        let mut locators = Vec::with_capacity(num_locators as usize);
        for _ in 0..num_locators {
            locators.push(Locator::read(reader)?);
        }

        let nav_mesh = NavMesh::read(reader)?;

        Ok(LevelModel {
            model,
            animated_parts,
            lights,
            effect_storages,
            physics_entity_storages,
            liquids,
            force_fields,
            collision_meshes,
            camera_mesh,
            trigger_areas,
            locators,
            nav_mesh,
        })
    }
}

/// A named, animated piece of the level. Parts form a tree; every part owns
/// its children outright.
#[derive(Debug)]
pub struct AnimatedLevelPart {
    pub name: String,
    pub affect_shields: bool,
    pub model: Model,
    pub mesh_settings: IndexMap<String, (bool, bool)>,
    pub liquids: Vec<Liquid>,
    pub locators: Vec<Locator>,
    pub animation_duration: f32,
    pub animation: AnimationChannel,
    pub effect_storages: Vec<EffectStorage>,
    pub light_refs: Vec<LevelModelLightRef>,
    pub collision: Option<AnimatedLevelPartCollision>,
    pub nav_mesh: Option<NavMesh>,
    pub children: Vec<AnimatedLevelPart>,
}

impl AnimatedLevelPart {
    pub fn read(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<Self> {
        let name = reader.read_7bit_length_string()?;
        let affect_shields = reader.read_bool()?;
        let model = Asset::read(reader, type_readers)?.expect_model()?;

        let num_settings = reader.read_i32::<LittleEndian>()?;
        let mut mesh_settings = IndexMap::with_capacity(num_settings as usize);
        for _ in 0..num_settings {
            let mesh = reader.read_7bit_length_string()?;
            let visible = reader.read_bool()?;
            let casts_shadows = reader.read_bool()?;
            mesh_settings.insert(mesh, (visible, casts_shadows));
        }

        let liquids = read_liquids(reader, type_readers)?;

        let num_locators = reader.read_i32::<LittleEndian>()?;
        let mut locators = Vec::with_capacity(num_locators as usize);
        for _ in 0..num_locators {
            locators.push(Locator::read(reader)?);
        }

        let animation_duration = reader.read_f32::<LittleEndian>()?;
        let animation = AnimationChannel::read(reader)?;

        let effect_storages = read_effect_storages(reader)?;

        let num_light_refs = reader.read_i32::<LittleEndian>()?;
        let mut light_refs = Vec::with_capacity(num_light_refs as usize);
        for _ in 0..num_light_refs {
            light_refs.push(LevelModelLightRef::read(reader)?);
        }

        let collision = if reader.read_bool()? {
            let material = CollisionMaterial::read(reader)?;
            let mesh = TriangleMesh::read(reader, type_readers)?;
            Some(AnimatedLevelPartCollision { material, mesh })
        } else {
            None
        };

        let nav_mesh = if reader.read_bool()? {
            Some(NavMesh::read(reader)?)
        } else {
            None
        };

        let num_children = reader.read_i32::<LittleEndian>()?;
        let mut children = Vec::with_capacity(num_children as usize);
        for _ in 0..num_children {
            children.push(AnimatedLevelPart::read(reader, type_readers)?);
        }

        Ok(AnimatedLevelPart {
            name,
            affect_shields,
            model,
            mesh_settings,
            liquids,
            locators,
            animation_duration,
            animation,
            effect_storages,
            light_refs,
            collision,
            nav_mesh,
            children,
        })
    }
}

#[derive(Debug)]
pub struct AnimatedLevelPartCollision {
    pub material: CollisionMaterial,
    pub mesh: TriangleMesh,
}

#[repr(u8)]
#[derive(FromRepr, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionMaterial {
    Generic,
    Gravel,
    Grass,
    Wood,
    Snow,
    Stone,
    Mud,
    Reflect,
    Water,
    Lava,
}

impl CollisionMaterial {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let value = reader.read_u8()?;
        CollisionMaterial::from_repr(value).ok_or(XnbError::UnknownCollisionMaterial(value))
    }
}

#[derive(Debug)]
pub struct LevelModelLight {
    pub name: String,
    pub position: Vec3,
    pub direction: Vec3,
    pub kind: LevelModelLightKind,
    pub variation: LevelModelLightVariation,
    pub reach: f32,
    pub use_attenuation: bool,
    pub cutoff_angle: f32,
    pub sharpness: f32,
    pub diffuse_color: Color,
    pub ambient_color: Color,
    pub specular_amount: f32,
    pub variation_speed: f32,
    pub variation_amount: f32,
    pub shadow_map_size: i32,
    pub casts_shadows: bool,
}

impl LevelModelLight {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let name = reader.read_7bit_length_string()?;
        let position = reader.read_vec3()?;
        let direction = reader.read_vec3()?;
        let kind = LevelModelLightKind::read(reader)?;
        let variation = LevelModelLightVariation::read(reader)?;
        let reach = reader.read_f32::<LittleEndian>()?;
        let use_attenuation = reader.read_bool()?;
        let cutoff_angle = reader.read_f32::<LittleEndian>()?;
        let sharpness = reader.read_f32::<LittleEndian>()?;
        let diffuse_color = Color::read(reader)?;
        let ambient_color = Color::read(reader)?;
        let specular_amount = reader.read_f32::<LittleEndian>()?;
        let variation_speed = reader.read_f32::<LittleEndian>()?;
        let variation_amount = reader.read_f32::<LittleEndian>()?;
        let shadow_map_size = reader.read_i32::<LittleEndian>()?;
        let casts_shadows = reader.read_bool()?;

        Ok(LevelModelLight {
            name,
            position,
            direction,
            kind,
            variation,
            reach,
            use_attenuation,
            cutoff_angle,
            sharpness,
            diffuse_color,
            ambient_color,
            specular_amount,
            variation_speed,
            variation_amount,
            shadow_map_size,
            casts_shadows,
        })
    }
}

#[repr(u8)]
#[derive(FromRepr, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelModelLightKind {
    Point,
    Directional,
    Spot,
    Custom = 10,
}

impl LevelModelLightKind {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let value = reader.read_u32::<LittleEndian>()?;
        u8::try_from(value)
            .ok()
            .and_then(LevelModelLightKind::from_repr)
            .ok_or(XnbError::UnknownLightField("kind", value))
    }
}

#[repr(u8)]
#[derive(FromRepr, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelModelLightVariation {
    None,
    Sine,
    Flicker,
    Candle,
    Strobe,
}

impl LevelModelLightVariation {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let value = reader.read_u32::<LittleEndian>()?;
        u8::try_from(value)
            .ok()
            .and_then(LevelModelLightVariation::from_repr)
            .ok_or(XnbError::UnknownLightField("variation", value))
    }
}

/// A placed instance of a named light inside an animated part.
#[derive(Debug)]
pub struct LevelModelLightRef {
    pub name: String,
    pub transform: Mat4,
}

impl LevelModelLightRef {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let name = reader.read_7bit_length_string()?;
        let transform = reader.read_mat4()?;
        Ok(LevelModelLightRef { name, transform })
    }
}

#[derive(Debug)]
pub struct EffectStorage {
    pub name: String,
    pub position: Vec3,
    pub forward: Vec3,
    pub range: f32,
    pub effect: String,
}

impl EffectStorage {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let name = reader.read_7bit_length_string()?;
        let position = reader.read_vec3()?;
        let forward = reader.read_vec3()?;
        let range = reader.read_f32::<LittleEndian>()?;
        let effect = reader.read_7bit_length_string()?;
        Ok(EffectStorage {
            name,
            position,
            forward,
            range,
            effect,
        })
    }
}

#[derive(Debug)]
pub struct PhysicsEntityStorage {
    pub transform: Mat4,
    pub template: String,
}

impl PhysicsEntityStorage {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let transform = reader.read_mat4()?;
        let template = reader.read_7bit_length_string()?;
        Ok(PhysicsEntityStorage {
            transform,
            template,
        })
    }
}

/// A liquid surface. The payload is a dispatched effect asset describing the
/// liquid's rendering.
#[derive(Debug)]
pub struct Liquid {
    pub effect: RenderDeferredLiquidEffect,
}

impl Liquid {
    pub fn read(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<Self> {
        let effect = Asset::read(reader, type_readers)?.expect_liquid_effect()?;
        Ok(Liquid { effect })
    }
}

#[derive(Debug)]
pub struct ForceField {
    pub color: Color,
    pub width: f32,
    pub alpha_power: f32,
    pub alpha_falloff_power: f32,
    pub max_radius: f32,
    pub ripple_distortion: f32,
    pub map_distortion: f32,
    pub vertex_color_enabled: bool,
    pub displacement_map: String,
    pub ttl: f32,
    pub vertex_buffer: VertexBuffer,
    pub index_buffer: IndexBuffer,
    pub vertex_declaration: VertexDeclaration,
    pub vertex_stride: i32,
    pub num_vertices: i32,
    pub primitive_count: i32,
}

impl ForceField {
    pub fn read(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<Self> {
        let color = Color::read(reader)?;
        let width = reader.read_f32::<LittleEndian>()?;
        let alpha_power = reader.read_f32::<LittleEndian>()?;
        let alpha_falloff_power = reader.read_f32::<LittleEndian>()?;
        let max_radius = reader.read_f32::<LittleEndian>()?;
        let ripple_distortion = reader.read_f32::<LittleEndian>()?;
        let map_distortion = reader.read_f32::<LittleEndian>()?;
        let vertex_color_enabled = reader.read_bool()?;
        let displacement_map = reader.read_7bit_length_string()?;
        let ttl = reader.read_f32::<LittleEndian>()?;

        let vertex_buffer = Asset::read(reader, type_readers)?.expect_vertex_buffer()?;
        let index_buffer = Asset::read(reader, type_readers)?.expect_index_buffer()?;
        let vertex_declaration = Asset::read(reader, type_readers)?.expect_vertex_declaration()?;

        let vertex_stride = reader.read_i32::<LittleEndian>()?;
        let num_vertices = reader.read_i32::<LittleEndian>()?;
        let primitive_count = reader.read_i32::<LittleEndian>()?;

        Ok(ForceField {
            color,
            width,
            alpha_power,
            alpha_falloff_power,
            max_radius,
            ripple_distortion,
            map_distortion,
            vertex_color_enabled,
            displacement_map,
            ttl,
            vertex_buffer,
            index_buffer,
            vertex_declaration,
            vertex_stride,
            num_vertices,
            primitive_count,
        })
    }
}

/// Raw triangle soup used for collision and camera volumes. Stored as a
/// list-typed asset slot, so the recorded type reader must be the list
/// reader.
#[derive(Debug)]
pub struct TriangleMesh {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
}

impl TriangleMesh {
    pub fn read(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<Self> {
        Asset::expect_list_type(reader, type_readers)?;

        let num_vertices = reader.read_u32::<LittleEndian>()? as usize;
        let mut vertices = Vec::with_capacity(num_vertices);
        for _ in 0..num_vertices {
            vertices.push(reader.read_vec3()?);
        }

        let num_triangles = reader.read_u32::<LittleEndian>()? as usize;
        let mut indices = Vec::with_capacity(num_triangles);
        for _ in 0..num_triangles {
            let a = reader.read_u32::<LittleEndian>()?;
            let b = reader.read_u32::<LittleEndian>()?;
            let c = reader.read_u32::<LittleEndian>()?;
            indices.push([a, b, c]);
        }

        Ok(TriangleMesh { vertices, indices })
    }
}

#[derive(Debug)]
pub struct TriggerArea {
    pub name: String,
    pub position: Vec3,
    pub side_lengths: Vec3,
    pub orientation: Quat,
}

impl TriggerArea {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let name = reader.read_7bit_length_string()?;
        let position = reader.read_vec3()?;
        let side_lengths = reader.read_vec3()?;
        let orientation = reader.read_quat()?;
        Ok(TriggerArea {
            name,
            position,
            side_lengths,
            orientation,
        })
    }
}

#[derive(Debug)]
pub struct Locator {
    pub name: String,
    pub transform: Mat4,
    pub radius: f32,
}

impl Locator {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let name = reader.read_7bit_length_string()?;
        let transform = reader.read_mat4()?;
        let radius = reader.read_f32::<LittleEndian>()?;
        Ok(Locator {
            name,
            transform,
            radius,
        })
    }
}

#[derive(Debug)]
pub struct NavMesh {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<NavMeshTriangle>,
}

impl NavMesh {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let num_vertices = reader.read_u16::<LittleEndian>()?;
        let mut vertices = Vec::with_capacity(num_vertices as usize);
        for _ in 0..num_vertices {
            vertices.push(reader.read_vec3()?);
        }

        let num_triangles = reader.read_u16::<LittleEndian>()?;
        let mut triangles = Vec::with_capacity(num_triangles as usize);
        for _ in 0..num_triangles {
            triangles.push(NavMeshTriangle::read(reader)?);
        }

        Ok(NavMesh {
            vertices,
            triangles,
        })
    }
}

#[derive(Debug)]
pub struct NavMeshTriangle {
    pub vertex_a: u16,
    pub vertex_b: u16,
    pub vertex_c: u16,
    pub neighbor_a: u16,
    pub neighbor_b: u16,
    pub neighbor_c: u16,
    pub cost_ab: f32,
    pub cost_bc: f32,
    pub cost_ca: f32,
    pub properties: MovementProperties,
}

impl NavMeshTriangle {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let vertex_a = reader.read_u16::<LittleEndian>()?;
        let vertex_b = reader.read_u16::<LittleEndian>()?;
        let vertex_c = reader.read_u16::<LittleEndian>()?;
        let neighbor_a = reader.read_u16::<LittleEndian>()?;
        let neighbor_b = reader.read_u16::<LittleEndian>()?;
        let neighbor_c = reader.read_u16::<LittleEndian>()?;
        let cost_ab = reader.read_f32::<LittleEndian>()?;
        let cost_bc = reader.read_f32::<LittleEndian>()?;
        let cost_ca = reader.read_f32::<LittleEndian>()?;
        let properties = MovementProperties::read(reader)?;
        Ok(NavMeshTriangle {
            vertex_a,
            vertex_b,
            vertex_c,
            neighbor_a,
            neighbor_b,
            neighbor_c,
            cost_ab,
            cost_bc,
            cost_ca,
            properties,
        })
    }
}

bitflags::bitflags! {
    pub struct MovementProperties: u8 {
        const WATER = 1;
        const JUMP = 2;
        const FLY = 4;
        const DYNAMIC = 128;
    }
}

impl MovementProperties {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let value = reader.read_u8()?;
        MovementProperties::from_bits(value).ok_or(XnbError::UnknownMovementProperties(value))
    }
}

fn read_effect_storages(reader: &mut impl Read) -> Result<Vec<EffectStorage>> {
    let count = reader.read_i32::<LittleEndian>()?;
    let mut storages = Vec::with_capacity(count as usize);
    for _ in 0..count {
        storages.push(EffectStorage::read(reader)?);
    }
    Ok(storages)
}

fn read_liquids(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<Vec<Liquid>> {
    let count = reader.read_i32::<LittleEndian>()?;
    let mut liquids = Vec::with_capacity(count as usize);
    for _ in 0..count {
        liquids.push(Liquid::read(reader, type_readers)?);
    }
    Ok(liquids)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn collision_material_rejects_out_of_range_values() {
        assert_eq!(
            CollisionMaterial::Lava,
            CollisionMaterial::read(&mut Cursor::new([9])).unwrap()
        );
        assert!(matches!(
            CollisionMaterial::read(&mut Cursor::new([10])),
            Err(XnbError::UnknownCollisionMaterial(10))
        ));
    }

    #[test]
    fn movement_properties_validate_their_bits() {
        let properties = MovementProperties::read(&mut Cursor::new([0x83])).unwrap();
        assert!(properties.contains(MovementProperties::WATER));
        assert!(properties.contains(MovementProperties::JUMP));
        assert!(properties.contains(MovementProperties::DYNAMIC));
        assert!(matches!(
            MovementProperties::read(&mut Cursor::new([0x08])),
            Err(XnbError::UnknownMovementProperties(0x08))
        ));
    }

    #[test]
    fn light_kind_reads_a_word_and_validates_the_value() {
        assert_eq!(
            LevelModelLightKind::Custom,
            LevelModelLightKind::read(&mut Cursor::new(10u32.to_le_bytes())).unwrap()
        );
        assert!(matches!(
            LevelModelLightKind::read(&mut Cursor::new(3u32.to_le_bytes())),
            Err(XnbError::UnknownLightField("kind", 3))
        ));
    }

    #[test]
    fn nav_mesh_reads_vertices_and_triangles() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u16.to_le_bytes());
        for value in [1.0f32, 2.0, 3.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.extend_from_slice(&1u16.to_le_bytes());
        for value in [0u16, 0, 0, 1, 1, 1] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        for value in [0.5f32, 1.5, 2.5] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.push(0x04); // fly

        let mesh = NavMesh::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(1, mesh.vertices.len());
        assert_eq!(Vec3::new(1.0, 2.0, 3.0), mesh.vertices[0]);
        assert_eq!(1, mesh.triangles.len());
        assert_eq!(0.5, mesh.triangles[0].cost_ab);
        assert_eq!(MovementProperties::FLY, mesh.triangles[0].properties);
    }

    #[test]
    fn locator_reads_name_transform_radius() {
        let mut bytes = vec![4];
        bytes.extend_from_slice(b"door");
        for i in 0..16 {
            bytes.extend_from_slice(&(i as f32).to_le_bytes());
        }
        bytes.extend_from_slice(&2.5f32.to_le_bytes());
        let locator = Locator::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!("door", locator.name);
        assert_eq!(2.5, locator.radius);
    }

    #[test]
    fn trigger_area_reads_an_oriented_box() {
        let mut bytes = vec![2];
        bytes.extend_from_slice(b"t1");
        for value in [0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0, 0.0, 0.0, 0.0, 1.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let area = TriggerArea::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!("t1", area.name);
        assert_eq!(Vec3::new(3.0, 4.0, 5.0), area.side_lengths);
        assert_eq!(Quat::from_xyzw(0.0, 0.0, 0.0, 1.0), area.orientation);
    }
}
