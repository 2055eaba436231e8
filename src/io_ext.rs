use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Mat4, Quat, Vec2, Vec3};

use crate::XnbError;

type Result<T> = std::result::Result<T, XnbError>;

/// Primitive decoders shared by the container and asset readers, layered
/// over [`byteorder::ReadBytesExt`].
pub trait ContentReadExt: Read {
    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Little-endian base-128 varint. Each byte contributes its low 7 bits;
    /// a clear high bit terminates. At most 5 bytes encode an i32.
    fn read_7bit_encoded_i32(&mut self) -> Result<i32> {
        let mut value: i32 = 0;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as i32) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(XnbError::VarintTooLong)
    }

    fn read_7bit_length_string(&mut self) -> Result<String> {
        let length = self.read_7bit_encoded_i32()?;
        let mut buffer = vec![0; length as usize];
        self.read_exact(&mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn read_vec2(&mut self) -> Result<Vec2> {
        let x = self.read_f32::<LittleEndian>()?;
        let y = self.read_f32::<LittleEndian>()?;
        Ok(Vec2::new(x, y))
    }

    fn read_vec3(&mut self) -> Result<Vec3> {
        let x = self.read_f32::<LittleEndian>()?;
        let y = self.read_f32::<LittleEndian>()?;
        let z = self.read_f32::<LittleEndian>()?;
        Ok(Vec3::new(x, y, z))
    }

    fn read_quat(&mut self) -> Result<Quat> {
        let x = self.read_f32::<LittleEndian>()?;
        let y = self.read_f32::<LittleEndian>()?;
        let z = self.read_f32::<LittleEndian>()?;
        let w = self.read_f32::<LittleEndian>()?;
        Ok(Quat::from_xyzw(x, y, z, w))
    }

    /// Sixteen little-endian floats as the pipeline stores them. The
    /// row-vector layout on disk coincides with glam's column storage, so
    /// the values load in place.
    fn read_mat4(&mut self) -> Result<Mat4> {
        let mut values = [0.0f32; 16];
        for value in values.iter_mut() {
            *value = self.read_f32::<LittleEndian>()?;
        }
        Ok(Mat4::from_cols_array(&values))
    }
}

impl<R: Read + ?Sized> ContentReadExt for R {}

#[cfg(test)]
pub fn encode_7bit_i32(mut value: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
        if value == 0 {
            return bytes;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_7bit_encoded_i32() {
        assert_eq!(300, Cursor::new([0xAC, 0x02]).read_7bit_encoded_i32().unwrap());
        assert_eq!(0, Cursor::new([0x00]).read_7bit_encoded_i32().unwrap());
        assert_eq!(127, Cursor::new([0x7F]).read_7bit_encoded_i32().unwrap());
        assert_eq!(128, Cursor::new([0x80, 0x01]).read_7bit_encoded_i32().unwrap());
    }

    #[test]
    fn read_7bit_encoded_i32_round_trip() {
        // Sweep the low values exhaustively, then stride through the rest
        // of the 28-bit range.
        for value in (0..0x4000u32).chain((0x4000..0x1000_0000).step_by(0x3F1)) {
            let encoded = encode_7bit_i32(value);
            let decoded = Cursor::new(&encoded).read_7bit_encoded_i32().unwrap();
            assert_eq!(value as i32, decoded);
        }
    }

    #[test]
    fn read_7bit_encoded_i32_rejects_overlong() {
        let result = Cursor::new([0x80, 0x80, 0x80, 0x80, 0x80, 0x01]).read_7bit_encoded_i32();
        assert!(matches!(result, Err(XnbError::VarintTooLong)));
    }

    #[test]
    fn read_7bit_length_string() {
        let mut bytes = vec![0x05];
        bytes.extend_from_slice(b"hello");
        assert_eq!("hello", Cursor::new(&bytes).read_7bit_length_string().unwrap());
        assert_eq!("", Cursor::new([0x00]).read_7bit_length_string().unwrap());
    }

    #[test]
    fn read_bool() {
        assert!(!Cursor::new([0x00]).read_bool().unwrap());
        assert!(Cursor::new([0x01]).read_bool().unwrap());
        assert!(Cursor::new([0xFF]).read_bool().unwrap());
    }

    #[test]
    fn read_vec3() {
        let bytes = [
            0x00, 0x00, 0x80, 0x3F, // 1.0
            0x00, 0x00, 0x00, 0x40, // 2.0
            0x00, 0x00, 0x40, 0x40, // 3.0
        ];
        let v = Cursor::new(bytes).read_vec3().unwrap();
        assert_eq!(Vec3::new(1.0, 2.0, 3.0), v);
    }

    #[test]
    fn read_mat4_row_major() {
        let mut bytes = Vec::new();
        for i in 0..16 {
            bytes.extend_from_slice(&(i as f32).to_le_bytes());
        }
        let m = Cursor::new(&bytes).read_mat4().unwrap();
        let columns = m.to_cols_array();
        assert_eq!(0.0, columns[0]);
        assert_eq!(1.0, columns[1]);
        assert_eq!(15.0, columns[15]);
    }
}
