use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::asset::geometry::{IndexBuffer, VertexBuffer, VertexDeclaration};
use crate::asset::model::BoundingBox;
use crate::asset::{Asset, TypeReader};
use crate::io_ext::ContentReadExt;
use crate::XnbError;

type Result<T> = std::result::Result<T, XnbError>;

#[derive(Debug)]
pub struct BiTreeModel {
    pub trees: Vec<BiTree>,
}

impl BiTreeModel {
    pub fn read(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<Self> {
        let num_trees = reader.read_i32::<LittleEndian>()?;
        let mut trees = Vec::with_capacity(num_trees as usize);
        for _ in 0..num_trees {
            trees.push(BiTree::read(reader, type_readers)?);
        }
        Ok(BiTreeModel { trees })
    }
}

/// One drawable chunk of level geometry plus the visibility tree over its
/// index ranges.
#[derive(Debug)]
pub struct BiTree {
    pub visible: bool,
    pub cast_shadows: bool,
    pub sway: f32,
    pub entity_influence: f32,
    pub ground_level: f32,
    pub num_vertices: i32,
    pub vertex_stride: i32,
    pub vertex_declaration: VertexDeclaration,
    pub vertex_buffer: VertexBuffer,
    pub index_buffer: IndexBuffer,
    pub effect: Box<Asset>,
    pub root_node: BiTreeNode,
}

impl BiTree {
    pub fn read(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<Self> {
        let visible = reader.read_bool()?;
        let cast_shadows = reader.read_bool()?;
        let sway = reader.read_f32::<LittleEndian>()?;
        let entity_influence = reader.read_f32::<LittleEndian>()?;
        let ground_level = reader.read_f32::<LittleEndian>()?;
        let num_vertices = reader.read_i32::<LittleEndian>()?;
        let vertex_stride = reader.read_i32::<LittleEndian>()?;

        let vertex_declaration = Asset::read(reader, type_readers)?.expect_vertex_declaration()?;
        let vertex_buffer = Asset::read(reader, type_readers)?.expect_vertex_buffer()?;
        let index_buffer = Asset::read(reader, type_readers)?.expect_index_buffer()?;
        let effect = Box::new(Asset::read(reader, type_readers)?.expect_any_effect()?);
        let root_node = BiTreeNode::read(reader)?;

        Ok(BiTree {
            visible,
            cast_shadows,
            sway,
            entity_influence,
            ground_level,
            num_vertices,
            vertex_stride,
            vertex_declaration,
            vertex_buffer,
            index_buffer,
            effect,
            root_node,
        })
    }
}

/// Binary tree over index ranges. Every node owns up to two children, each
/// stored behind a presence flag.
#[derive(Debug)]
pub struct BiTreeNode {
    pub primitive_count: i32,
    pub start_index: i32,
    pub bounding_box: BoundingBox,
    pub child_a: Option<Box<BiTreeNode>>,
    pub child_b: Option<Box<BiTreeNode>>,
}

impl BiTreeNode {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let primitive_count = reader.read_i32::<LittleEndian>()?;
        let start_index = reader.read_i32::<LittleEndian>()?;
        let bounding_box = BoundingBox::read(reader)?;

        let child_a = if reader.read_bool()? {
            Some(Box::new(BiTreeNode::read(reader)?))
        } else {
            None
        };
        let child_b = if reader.read_bool()? {
            Some(Box::new(BiTreeNode::read(reader)?))
        } else {
            None
        };

        Ok(BiTreeNode {
            primitive_count,
            start_index,
            bounding_box,
            child_a,
            child_b,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = &BiTreeNode> {
        self.child_a
            .iter()
            .chain(self.child_b.iter())
            .map(|child| child.as_ref())
    }
}
