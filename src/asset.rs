use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::io_ext::ContentReadExt;
use crate::XnbError;

use crate::asset::bi_tree::BiTreeModel;
use crate::asset::effect::{AdditiveEffect, RenderDeferredEffect, RenderDeferredLiquidEffect};
use crate::asset::geometry::{IndexBuffer, VertexBuffer, VertexDeclaration};
use crate::asset::level::LevelModel;
use crate::asset::model::Model;
use crate::asset::texture::{Texture2D, Texture3D};

pub mod animation;
pub mod bi_tree;
pub mod effect;
pub mod geometry;
pub mod level;
pub mod model;
pub mod texture;

type Result<T> = std::result::Result<T, XnbError>;

const STRING_READER: &str = "Microsoft.Xna.Framework.Content.StringReader";
const TEXTURE_2D_READER: &str = "Microsoft.Xna.Framework.Content.Texture2DReader";
const TEXTURE_3D_READER: &str = "Microsoft.Xna.Framework.Content.Texture3DReader";
const MODEL_READER: &str = "Microsoft.Xna.Framework.Content.ModelReader";
const VERTEX_DECLARATION_READER: &str = "Microsoft.Xna.Framework.Content.VertexDeclarationReader";
const VERTEX_BUFFER_READER: &str = "Microsoft.Xna.Framework.Content.VertexBufferReader";
const INDEX_BUFFER_READER: &str = "Microsoft.Xna.Framework.Content.IndexBufferReader";
const LIST_READER: &str = "Microsoft.Xna.Framework.Content.ListReader";
const BI_TREE_MODEL_READER: &str = "PolygonHead.Pipeline.BiTreeModelReader";
const RENDER_DEFERRED_EFFECT_READER: &str = "PolygonHead.Pipeline.RenderDeferredEffectReader";
const RENDER_DEFERRED_LIQUID_EFFECT_READER: &str =
    "PolygonHead.Pipeline.RenderDeferredLiquidEffectReader";
const ADDITIVE_EFFECT_READER: &str = "PolygonHead.Pipeline.AdditiveEffectReader";
const LEVEL_MODEL_READER: &str = "Magicka.ContentReaders.LevelModelReader";

/// One entry of the type reader table recorded ahead of the asset graph.
/// On-wire type ids are indices into this table plus one.
#[derive(Debug, Clone)]
pub struct TypeReader {
    pub name: String,
    pub version: i32,
}

impl TypeReader {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let name = reader.read_7bit_length_string()?;
        let version = reader.read_i32::<LittleEndian>()?;
        Ok(TypeReader { name, version })
    }

    /// The reader's type name with any assembly qualification stripped.
    pub fn type_name(&self) -> &str {
        self.name.split(',').next().unwrap_or_default()
    }
}

#[derive(Debug)]
pub enum Asset {
    None,
    String(String),
    Texture2D(Texture2D),
    Texture3D(Texture3D),
    VertexDeclaration(VertexDeclaration),
    VertexBuffer(VertexBuffer),
    IndexBuffer(IndexBuffer),
    Model(Model),
    BiTreeModel(BiTreeModel),
    RenderDeferredEffect(RenderDeferredEffect),
    RenderDeferredLiquidEffect(RenderDeferredLiquidEffect),
    AdditiveEffect(AdditiveEffect),
    LevelModel(LevelModel),
}

impl Asset {
    /// Reads one asset slot: a 7-bit encoded type id, zero meaning no asset,
    /// otherwise an index into the type reader table whose reader decodes
    /// the payload.
    pub fn read(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<Self> {
        let type_id = reader.read_7bit_encoded_i32()?;
        if type_id == 0 {
            return Ok(Asset::None);
        }
        let type_reader = resolve_type_reader(type_id, type_readers)?;

        match type_reader.type_name() {
            STRING_READER => Ok(Asset::String(reader.read_7bit_length_string()?)),
            TEXTURE_2D_READER => Ok(Asset::Texture2D(Texture2D::read(reader)?)),
            TEXTURE_3D_READER => Ok(Asset::Texture3D(Texture3D::read(reader)?)),
            VERTEX_DECLARATION_READER => {
                Ok(Asset::VertexDeclaration(VertexDeclaration::read(reader)?))
            }
            VERTEX_BUFFER_READER => Ok(Asset::VertexBuffer(VertexBuffer::read(reader)?)),
            INDEX_BUFFER_READER => Ok(Asset::IndexBuffer(IndexBuffer::read(reader)?)),
            MODEL_READER => Ok(Asset::Model(Model::read(reader, type_readers)?)),
            BI_TREE_MODEL_READER => {
                Ok(Asset::BiTreeModel(BiTreeModel::read(reader, type_readers)?))
            }
            RENDER_DEFERRED_EFFECT_READER => {
                Ok(Asset::RenderDeferredEffect(RenderDeferredEffect::read(reader)?))
            }
            RENDER_DEFERRED_LIQUID_EFFECT_READER => Ok(Asset::RenderDeferredLiquidEffect(
                RenderDeferredLiquidEffect::read(reader)?,
            )),
            ADDITIVE_EFFECT_READER => Ok(Asset::AdditiveEffect(AdditiveEffect::read(reader)?)),
            LEVEL_MODEL_READER => Ok(Asset::LevelModel(LevelModel::read(reader, type_readers)?)),
            // the list reader is polymorphic; it only appears in slots whose
            // element type the surrounding reader already knows
            name if name.starts_with(LIST_READER) => Err(XnbError::UnexpectedAssetType {
                expected: "a concrete asset",
                found: type_reader.name.clone(),
            }),
            _ => Err(XnbError::UnimplementedTypeReader(type_reader.name.clone())),
        }
    }

    /// Consumes the type id of a slot the caller decodes in place, checking
    /// that it names the polymorphic list reader.
    pub fn expect_list_type(reader: &mut impl Read, type_readers: &[TypeReader]) -> Result<()> {
        let type_id = reader.read_7bit_encoded_i32()?;
        if type_id == 0 {
            return Err(XnbError::UnexpectedAssetType {
                expected: "List",
                found: "None".into(),
            });
        }
        let type_reader = resolve_type_reader(type_id, type_readers)?;
        if type_reader.type_name().starts_with(LIST_READER) {
            Ok(())
        } else {
            Err(XnbError::UnexpectedAssetType {
                expected: "List",
                found: type_reader.name.clone(),
            })
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Asset::None => "None",
            Asset::String(_) => "String",
            Asset::Texture2D(_) => "Texture2D",
            Asset::Texture3D(_) => "Texture3D",
            Asset::VertexDeclaration(_) => "VertexDeclaration",
            Asset::VertexBuffer(_) => "VertexBuffer",
            Asset::IndexBuffer(_) => "IndexBuffer",
            Asset::Model(_) => "Model",
            Asset::BiTreeModel(_) => "BiTreeModel",
            Asset::RenderDeferredEffect(_) => "RenderDeferredEffect",
            Asset::RenderDeferredLiquidEffect(_) => "RenderDeferredLiquidEffect",
            Asset::AdditiveEffect(_) => "AdditiveEffect",
            Asset::LevelModel(_) => "LevelModel",
        }
    }

    pub fn expect_string(self) -> Result<String> {
        match self {
            Asset::String(value) => Ok(value),
            other => Err(other.unexpected("String")),
        }
    }

    pub fn expect_vertex_declaration(self) -> Result<VertexDeclaration> {
        match self {
            Asset::VertexDeclaration(declaration) => Ok(declaration),
            other => Err(other.unexpected("VertexDeclaration")),
        }
    }

    pub fn expect_vertex_buffer(self) -> Result<VertexBuffer> {
        match self {
            Asset::VertexBuffer(buffer) => Ok(buffer),
            other => Err(other.unexpected("VertexBuffer")),
        }
    }

    pub fn expect_index_buffer(self) -> Result<IndexBuffer> {
        match self {
            Asset::IndexBuffer(buffer) => Ok(buffer),
            other => Err(other.unexpected("IndexBuffer")),
        }
    }

    pub fn expect_model(self) -> Result<Model> {
        match self {
            Asset::Model(model) => Ok(model),
            other => Err(other.unexpected("Model")),
        }
    }

    pub fn expect_bi_tree_model(self) -> Result<BiTreeModel> {
        match self {
            Asset::BiTreeModel(model) => Ok(model),
            other => Err(other.unexpected("BiTreeModel")),
        }
    }

    pub fn expect_liquid_effect(self) -> Result<RenderDeferredLiquidEffect> {
        match self {
            Asset::RenderDeferredLiquidEffect(effect) => Ok(effect),
            other => Err(other.unexpected("RenderDeferredLiquidEffect")),
        }
    }

    /// Narrows a slot that may hold any of the effect variants.
    pub fn expect_any_effect(self) -> Result<Asset> {
        match self {
            Asset::RenderDeferredEffect(_)
            | Asset::RenderDeferredLiquidEffect(_)
            | Asset::AdditiveEffect(_) => Ok(self),
            other => Err(other.unexpected("an effect")),
        }
    }

    fn unexpected(&self, expected: &'static str) -> XnbError {
        XnbError::UnexpectedAssetType {
            expected,
            found: self.kind_name().into(),
        }
    }
}

fn resolve_type_reader(type_id: i32, type_readers: &[TypeReader]) -> Result<&TypeReader> {
    type_readers
        .get((type_id as usize).wrapping_sub(1))
        .ok_or_else(|| XnbError::TypeIdOutOfRange(type_id, type_readers.len()))
}
