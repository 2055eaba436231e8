use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec2;

use crate::io_ext::ContentReadExt;
use crate::XnbError;

type Result<T> = std::result::Result<T, XnbError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let r = reader.read_f32::<LittleEndian>()?;
        let g = reader.read_f32::<LittleEndian>()?;
        let b = reader.read_f32::<LittleEndian>()?;
        Ok(Color { r, g, b })
    }
}

#[derive(Debug)]
pub struct RenderDeferredEffect {
    pub alpha: f32,
    pub sharpness: f32,
    pub vertex_color_enabled: bool,
    pub use_material_texture_for_reflectiveness: bool,
    pub reflection_map: String,
    pub material_0: RenderDeferredEffectMaterial,
    pub material_1: Option<RenderDeferredEffectMaterial>,
}

impl RenderDeferredEffect {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let alpha = reader.read_f32::<LittleEndian>()?;
        let sharpness = reader.read_f32::<LittleEndian>()?;
        let vertex_color_enabled = reader.read_bool()?;
        let use_material_texture_for_reflectiveness = reader.read_bool()?;
        let reflection_map = reader.read_7bit_length_string()?;
        let material_0 = RenderDeferredEffectMaterial::read(reader)?;
        let material_1 = if reader.read_bool()? {
            Some(RenderDeferredEffectMaterial::read(reader)?)
        } else {
            None
        };
        Ok(RenderDeferredEffect {
            alpha,
            sharpness,
            vertex_color_enabled,
            use_material_texture_for_reflectiveness,
            reflection_map,
            material_0,
            material_1,
        })
    }
}

#[derive(Debug)]
pub struct RenderDeferredEffectMaterial {
    pub diffuse_texture_alpha_disabled: bool,
    pub alpha_mask_enabled: bool,
    pub diffuse_color: Color,
    pub spec_amount: f32,
    pub spec_power: f32,
    pub emissive_amount: f32,
    pub normal_power: f32,
    pub reflectiveness: f32,
    pub diffuse_texture: String,
    pub material_texture: String,
    pub normal_texture: String,
}

impl RenderDeferredEffectMaterial {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let diffuse_texture_alpha_disabled = reader.read_bool()?;
        let alpha_mask_enabled = reader.read_bool()?;
        let diffuse_color = Color::read(reader)?;
        let spec_amount = reader.read_f32::<LittleEndian>()?;
        let spec_power = reader.read_f32::<LittleEndian>()?;
        let emissive_amount = reader.read_f32::<LittleEndian>()?;
        let normal_power = reader.read_f32::<LittleEndian>()?;
        let reflectiveness = reader.read_f32::<LittleEndian>()?;
        let diffuse_texture = reader.read_7bit_length_string()?;
        let material_texture = reader.read_7bit_length_string()?;
        let normal_texture = reader.read_7bit_length_string()?;
        Ok(RenderDeferredEffectMaterial {
            diffuse_texture_alpha_disabled,
            alpha_mask_enabled,
            diffuse_color,
            spec_amount,
            spec_power,
            emissive_amount,
            normal_power,
            reflectiveness,
            diffuse_texture,
            material_texture,
            normal_texture,
        })
    }
}

#[derive(Debug)]
pub struct RenderDeferredLiquidEffect {
    pub reflection_map: String,
    pub wave_height: f32,
    pub wave_speed_0: Vec2,
    pub wave_speed_1: Vec2,
    pub water_reflectiveness: f32,
    pub bottom_color: Color,
    pub deep_bottom_color: Color,
    pub water_emissive_amount: f32,
    pub water_spec_amount: f32,
    pub water_spec_power: f32,
    pub bottom_texture: String,
    pub water_normal_map: String,
    pub ice_reflectiveness: f32,
    pub ice_color: Color,
    pub ice_emissive_amount: f32,
    pub ice_spec_amount: f32,
    pub ice_spec_power: f32,
    pub ice_diffuse_map: String,
    pub ice_normal_map: String,
}

impl RenderDeferredLiquidEffect {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let reflection_map = reader.read_7bit_length_string()?;
        let wave_height = reader.read_f32::<LittleEndian>()?;
        let wave_speed_0 = reader.read_vec2()?;
        let wave_speed_1 = reader.read_vec2()?;
        let water_reflectiveness = reader.read_f32::<LittleEndian>()?;
        let bottom_color = Color::read(reader)?;
        let deep_bottom_color = Color::read(reader)?;
        let water_emissive_amount = reader.read_f32::<LittleEndian>()?;
        let water_spec_amount = reader.read_f32::<LittleEndian>()?;
        let water_spec_power = reader.read_f32::<LittleEndian>()?;
        let bottom_texture = reader.read_7bit_length_string()?;
        let water_normal_map = reader.read_7bit_length_string()?;
        let ice_reflectiveness = reader.read_f32::<LittleEndian>()?;
        let ice_color = Color::read(reader)?;
        let ice_emissive_amount = reader.read_f32::<LittleEndian>()?;
        let ice_spec_amount = reader.read_f32::<LittleEndian>()?;
        let ice_spec_power = reader.read_f32::<LittleEndian>()?;
        let ice_diffuse_map = reader.read_7bit_length_string()?;
        let ice_normal_map = reader.read_7bit_length_string()?;
        Ok(RenderDeferredLiquidEffect {
            reflection_map,
            wave_height,
            wave_speed_0,
            wave_speed_1,
            water_reflectiveness,
            bottom_color,
            deep_bottom_color,
            water_emissive_amount,
            water_spec_amount,
            water_spec_power,
            bottom_texture,
            water_normal_map,
            ice_reflectiveness,
            ice_color,
            ice_emissive_amount,
            ice_spec_amount,
            ice_spec_power,
            ice_diffuse_map,
            ice_normal_map,
        })
    }
}

#[derive(Debug)]
pub struct AdditiveEffect {
    pub color_tint: Color,
    pub vertex_color_enabled: bool,
    pub texture_enabled: bool,
    pub texture: String,
}

impl AdditiveEffect {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let color_tint = Color::read(reader)?;
        let vertex_color_enabled = reader.read_bool()?;
        let texture_enabled = reader.read_bool()?;
        let texture = reader.read_7bit_length_string()?;
        Ok(AdditiveEffect {
            color_tint,
            vertex_color_enabled,
            texture_enabled,
            texture,
        })
    }
}
