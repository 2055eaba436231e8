use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Quat, Vec3};

use crate::io_ext::ContentReadExt;
use crate::XnbError;

type Result<T> = std::result::Result<T, XnbError>;

#[derive(Debug)]
pub struct AnimationChannel {
    pub keyframes: Vec<AnimationKeyframe>,
}

impl AnimationChannel {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let num_frames = reader.read_i32::<LittleEndian>()?;
        let mut keyframes = Vec::with_capacity(num_frames as usize);
        for _ in 0..num_frames {
            keyframes.push(AnimationKeyframe::read(reader)?);
        }
        Ok(AnimationChannel { keyframes })
    }
}

#[derive(Debug)]
pub struct AnimationKeyframe {
    pub time: f32,
    pub pose: AnimationPose,
}

impl AnimationKeyframe {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let time = reader.read_f32::<LittleEndian>()?;
        let pose = AnimationPose::read(reader)?;
        Ok(AnimationKeyframe { time, pose })
    }
}

#[derive(Debug)]
pub struct AnimationPose {
    pub translation: Vec3,
    pub orientation: Quat,
    pub scale: Vec3,
}

impl AnimationPose {
    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let translation = reader.read_vec3()?;
        let orientation = reader.read_quat()?;
        let scale = reader.read_vec3()?;
        Ok(AnimationPose {
            translation,
            orientation,
            scale,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn channel_reads_keyframes_in_order() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2i32.to_le_bytes());
        for time in [0.0f32, 0.5] {
            bytes.extend_from_slice(&time.to_le_bytes());
            for value in [1.0f32, 2.0, 3.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0] {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        let channel = AnimationChannel::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(2, channel.keyframes.len());
        assert_eq!(0.5, channel.keyframes[1].time);
        assert_eq!(Vec3::new(1.0, 2.0, 3.0), channel.keyframes[0].pose.translation);
        assert_eq!(Quat::from_xyzw(0.0, 0.0, 0.0, 1.0), channel.keyframes[0].pose.orientation);
        assert_eq!(Vec3::ONE, channel.keyframes[0].pose.scale);
    }
}
