use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Mat4, Vec3};

use crate::asset::geometry::{IndexBuffer, VertexBuffer, VertexDeclaration};
use crate::asset::{Asset, TypeReader};
use crate::io_ext::ContentReadExt;
use crate::XnbError;

type Result<T> = std::result::Result<T, XnbError>;

#[derive(Debug)]
pub struct Model {
    pub bones: Vec<Bone>,
    pub bone_hierarchy: Vec<BoneHierarchy>,
    pub vertex_declarations: Vec<VertexDeclaration>,
    pub meshes: Vec<Mesh>,
    pub root_bone_ref: u32,
    pub tag: u8,
}

impl Model {
    pub fn read(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<Self> {
        let num_bones = reader.read_u32::<LittleEndian>()?;

        let mut bones = Vec::with_capacity(num_bones as usize);
        for _ in 0..num_bones {
            bones.push(Bone::read(reader, type_readers)?);
        }

        let mut bone_hierarchy = Vec::with_capacity(num_bones as usize);
        for _ in 0..num_bones {
            bone_hierarchy.push(BoneHierarchy::read(reader, num_bones)?);
        }

        let num_declarations = reader.read_u32::<LittleEndian>()?;
        let mut vertex_declarations = Vec::with_capacity(num_declarations as usize);
        for _ in 0..num_declarations {
            let declaration = Asset::read(reader, type_readers)?.expect_vertex_declaration()?;
            vertex_declarations.push(declaration);
        }

        let num_meshes = reader.read_u32::<LittleEndian>()?;
        let mut meshes = Vec::with_capacity(num_meshes as usize);
        for _ in 0..num_meshes {
            meshes.push(Mesh::read(reader, type_readers)?);
        }

        let root_bone_ref = read_bone_ref(reader, num_bones)?;
        let tag = reader.read_u8()?;

        Ok(Model {
            bones,
            bone_hierarchy,
            vertex_declarations,
            meshes,
            root_bone_ref,
            tag,
        })
    }
}

#[derive(Debug)]
pub struct Bone {
    pub name: String,
    pub transform: Mat4,
}

impl Bone {
    pub fn read(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<Self> {
        let name = Asset::read(reader, type_readers)?.expect_string()?;
        let transform = reader.read_mat4()?;
        Ok(Bone { name, transform })
    }
}

#[derive(Debug)]
pub struct BoneHierarchy {
    pub parent_ref: u32,
    pub children_refs: Vec<u32>,
}

impl BoneHierarchy {
    pub fn read(reader: &mut impl Read, num_bones: u32) -> Result<Self> {
        let parent_ref = read_bone_ref(reader, num_bones)?;
        let num_children = reader.read_u32::<LittleEndian>()? as usize;
        let mut children_refs = Vec::with_capacity(num_children);
        for _ in 0..num_children {
            children_refs.push(read_bone_ref(reader, num_bones)?);
        }
        Ok(BoneHierarchy {
            parent_ref,
            children_refs,
        })
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub parent_bone_ref: u32,
    pub bounds: BoundingSphere,
    pub vertex_buffer: VertexBuffer,
    pub index_buffer: IndexBuffer,
    pub tag: u8,
    pub parts: Vec<MeshPart>,
}

impl Mesh {
    pub fn read(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<Self> {
        let name = Asset::read(reader, type_readers)?.expect_string()?;

        // mesh bone references are stored single byte regardless of count
        let parent_bone_ref = read_bone_ref(reader, 0)?;
        let bounds = BoundingSphere::read(reader)?;

        let vertex_buffer = Asset::read(reader, type_readers)?.expect_vertex_buffer()?;
        let index_buffer = Asset::read(reader, type_readers)?.expect_index_buffer()?;
        let tag = reader.read_u8()?;

        let num_parts = reader.read_u32::<LittleEndian>()? as usize;
        let mut parts = Vec::with_capacity(num_parts);
        for _ in 0..num_parts {
            parts.push(MeshPart::read(reader)?);
        }

        Ok(Mesh {
            name,
            parent_bone_ref,
            bounds,
            vertex_buffer,
            index_buffer,
            tag,
            parts,
        })
    }
}

#[derive(Debug)]
pub struct MeshPart {
    pub stream_offset: u32,
    pub base_vertex: u32,
    pub vertex_count: u32,
    pub start_index: u32,
    pub primitive_count: u32,
    pub vertex_declaration_index: u32,
    pub tag: u8,
    pub shared_content_material_index: i32,
}

impl MeshPart {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let stream_offset = reader.read_u32::<LittleEndian>()?;
        let base_vertex = reader.read_u32::<LittleEndian>()?;
        let vertex_count = reader.read_u32::<LittleEndian>()?;
        let start_index = reader.read_u32::<LittleEndian>()?;
        let primitive_count = reader.read_u32::<LittleEndian>()?;
        let vertex_declaration_index = reader.read_u32::<LittleEndian>()?;
        let tag = reader.read_u8()?;
        let shared_content_material_index = reader.read_7bit_encoded_i32()?;
        Ok(MeshPart {
            stream_offset,
            base_vertex,
            vertex_count,
            start_index,
            primitive_count,
            vertex_declaration_index,
            tag,
            shared_content_material_index,
        })
    }
}

#[derive(Debug)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let center = reader.read_vec3()?;
        let radius = reader.read_f32::<LittleEndian>()?;
        Ok(BoundingSphere { center, radius })
    }
}

#[derive(Debug)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let min = reader.read_vec3()?;
        let max = reader.read_vec3()?;
        Ok(BoundingBox { min, max })
    }
}

/// Bone references shrink to one byte while the model has at most 255 bones.
pub fn read_bone_ref(reader: &mut impl Read, num_bones: u32) -> Result<u32> {
    if num_bones <= 255 {
        Ok(reader.read_u8()? as u32)
    } else {
        Ok(reader.read_u32::<LittleEndian>()?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn bone_ref_width_switches_at_256_bones() {
        let bytes = [0x07, 0x01, 0x02, 0x03, 0x04];
        let mut cursor = Cursor::new(&bytes[..]);
        assert_eq!(7, read_bone_ref(&mut cursor, 255).unwrap());
        assert_eq!(0x04030201, read_bone_ref(&mut cursor, 256).unwrap());
    }

    #[test]
    fn bone_hierarchy_reads_children() {
        let mut bytes = vec![0x01]; // parent
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.push(0x02);
        bytes.push(0x03);
        let hierarchy = BoneHierarchy::read(&mut Cursor::new(&bytes), 4).unwrap();
        assert_eq!(1, hierarchy.parent_ref);
        assert_eq!(vec![2, 3], hierarchy.children_refs);
    }

    #[test]
    fn model_reads_bones_meshes_and_parts() {
        let readers: Vec<TypeReader> = [
            "Microsoft.Xna.Framework.Content.StringReader",
            "Microsoft.Xna.Framework.Content.VertexBufferReader",
            "Microsoft.Xna.Framework.Content.IndexBufferReader",
        ]
        .iter()
        .map(|name| TypeReader {
            name: (*name).into(),
            version: 0,
        })
        .collect();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes()); // one bone
        bytes.push(0x01); // bone name: string asset
        bytes.push(4);
        bytes.extend_from_slice(b"root");
        for i in 0..16 {
            bytes.extend_from_slice(&(i as f32).to_le_bytes());
        }
        bytes.push(0xFF); // parent ref
        bytes.extend_from_slice(&0u32.to_le_bytes()); // no children
        bytes.extend_from_slice(&0u32.to_le_bytes()); // no vertex declarations
        bytes.extend_from_slice(&1u32.to_le_bytes()); // one mesh
        bytes.push(0x01); // mesh name
        bytes.push(4);
        bytes.extend_from_slice(b"body");
        bytes.push(0x00); // parent bone ref
        for value in [0.0f32, 0.0, 0.0, 5.0] {
            bytes.extend_from_slice(&value.to_le_bytes()); // bounding sphere
        }
        bytes.push(0x02); // vertex buffer asset
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        bytes.push(0x03); // index buffer asset
        bytes.push(0x01); // 16-bit
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[5, 6]);
        bytes.push(7); // mesh tag
        bytes.extend_from_slice(&1u32.to_le_bytes()); // one part
        for value in [0u32, 0, 4, 0, 2, 0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.push(0); // part tag
        bytes.push(0x00); // shared material index
        bytes.push(0x00); // root bone ref
        bytes.push(9); // model tag

        let model = Model::read(&mut Cursor::new(&bytes), &readers).unwrap();
        assert_eq!(1, model.bones.len());
        assert_eq!("root", model.bones[0].name);
        assert_eq!(255, model.bone_hierarchy[0].parent_ref);
        assert_eq!(1, model.meshes.len());
        let mesh = &model.meshes[0];
        assert_eq!("body", mesh.name);
        assert_eq!(5.0, mesh.bounds.radius);
        assert_eq!(vec![1, 2, 3, 4], mesh.vertex_buffer.data);
        assert!(mesh.index_buffer.is_16_bit);
        assert_eq!(1, mesh.parts.len());
        assert_eq!(4, mesh.parts[0].vertex_count);
        assert_eq!(9, model.tag);
    }

    #[test]
    fn mesh_part_reads_its_material_index() {
        let mut bytes = Vec::new();
        for value in [0u32, 0, 36, 0, 12, 1] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.push(0); // tag
        bytes.extend_from_slice(&[0xAC, 0x02]); // 7-bit encoded 300
        let part = MeshPart::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(36, part.vertex_count);
        assert_eq!(12, part.primitive_count);
        assert_eq!(1, part.vertex_declaration_index);
        assert_eq!(300, part.shared_content_material_index);
    }
}
