//! Coordinate-space and color-space transform handlers, plus the texture,
//! environment, and shadow callouts to the host texture service.

use crate::{
    builtins::color::color_matrix,
    error::ErrorCode,
    instruction::{Opcode, tag_is_varying},
    math3d::Vec3,
};

use super::VirtualMachine;

impl VirtualMachine<'_, '_> {
    /// `TRANSFORM_{POINT,VECTOR,NORMAL,COLOR,MATRIX}`: transforms a value
    /// by the named coordinate (or color) space resolved from the grid.
    /// Unknown coordinate-space names resolve to identity.
    pub(super) fn transform(&mut self, opcode: Opcode, t0: u8) {
        let result = self.fetch_address();
        let space = self.fetch_address();
        let value = self.fetch_address();
        let name = self.string_value(space);

        let varying = tag_is_varying(t0);
        let count = if varying { self.lanes() } else { 1 };

        if opcode == Opcode::TransformColor {
            let matrix = color_matrix(&name).unwrap_or_else(|| {
                self.report(
                    ErrorCode::UnknownColorSpace,
                    &format!("Unknown color space '{name}' in typecast"),
                );
                color_matrix("rgb").expect("rgb is known")
            });
            for lane in 0..count {
                if varying && !self.active(lane) {
                    continue;
                }
                let c = self.load_vec3(value, if varying { lane } else { 0 });
                let out = Vec3::new(
                    matrix[0][0] * c.x + matrix[0][1] * c.y + matrix[0][2] * c.z,
                    matrix[1][0] * c.x + matrix[1][1] * c.y + matrix[1][2] * c.z,
                    matrix[2][0] * c.x + matrix[2][1] * c.y + matrix[2][2] * c.z,
                );
                self.store_vec3(result, lane, out);
            }
            return;
        }

        let matrix = self.grid.coordinate_transform(&name);
        match opcode {
            Opcode::TransformPoint => {
                for lane in 0..count {
                    if varying && !self.active(lane) {
                        continue;
                    }
                    let v = self.load_vec3(value, if varying { lane } else { 0 });
                    self.store_vec3(result, lane, matrix.transform_point(v));
                }
            }
            Opcode::TransformVector => {
                for lane in 0..count {
                    if varying && !self.active(lane) {
                        continue;
                    }
                    let v = self.load_vec3(value, if varying { lane } else { 0 });
                    self.store_vec3(result, lane, matrix.transform_vector(v));
                }
            }
            Opcode::TransformNormal => {
                let inverse_transpose = matrix.inverse().transpose();
                for lane in 0..count {
                    if varying && !self.active(lane) {
                        continue;
                    }
                    let v = self.load_vec3(value, if varying { lane } else { 0 });
                    self.store_vec3(result, lane, inverse_transpose.transform_vector(v));
                }
            }
            Opcode::TransformMatrix => {
                for lane in 0..count {
                    if varying && !self.active(lane) {
                        continue;
                    }
                    let m = self.load_mat4(value, if varying { lane } else { 0 });
                    self.store_mat4(result, lane, matrix.multiply(&m));
                }
            }
            _ => panic!("not a transform opcode"),
        }
    }

    /// `FLOAT_TEXTURE result, name, s, t`: per-lane host texture lookup
    /// taking the first channel.
    pub(super) fn float_texture(&mut self, t0: u8, t1: u8, t2: u8) {
        let result = self.fetch_address();
        let name_address = self.fetch_address();
        let s = self.fetch_address();
        let t = self.fetch_address();
        let name = self.string_value(name_address);
        let varying = tag_is_varying(t0);
        let count = if varying { self.lanes() } else { 1 };
        for lane in 0..count {
            if varying && !self.active(lane) {
                continue;
            }
            let sv = self.load_f32(s, if tag_is_varying(t1) { lane } else { 0 });
            let tv = self.load_f32(t, if tag_is_varying(t2) { lane } else { 0 });
            let value = self.context.textures.texture(&name, sv, tv).map_or(0.0, |c| c.x);
            self.store_f32(result, lane, value);
        }
    }

    /// `VEC3_TEXTURE result, name, s, t`: per-lane host texture lookup.
    pub(super) fn vec3_texture(&mut self, t0: u8, t1: u8, t2: u8) {
        let result = self.fetch_address();
        let name_address = self.fetch_address();
        let s = self.fetch_address();
        let t = self.fetch_address();
        let name = self.string_value(name_address);
        let varying = tag_is_varying(t0);
        let count = if varying { self.lanes() } else { 1 };
        for lane in 0..count {
            if varying && !self.active(lane) {
                continue;
            }
            let sv = self.load_f32(s, if tag_is_varying(t1) { lane } else { 0 });
            let tv = self.load_f32(t, if tag_is_varying(t2) { lane } else { 0 });
            let value = self.context.textures.texture(&name, sv, tv).unwrap_or(Vec3::ZERO);
            self.store_vec3(result, lane, value);
        }
    }

    /// `FLOAT_ENVIRONMENT result, name, direction`.
    pub(super) fn float_environment(&mut self, t0: u8, t1: u8) {
        let result = self.fetch_address();
        let name_address = self.fetch_address();
        let direction = self.fetch_address();
        let name = self.string_value(name_address);
        let varying = tag_is_varying(t0);
        let count = if varying { self.lanes() } else { 1 };
        for lane in 0..count {
            if varying && !self.active(lane) {
                continue;
            }
            let d = self.load_vec3(direction, if tag_is_varying(t1) { lane } else { 0 });
            let value = self.context.textures.environment(&name, d).map_or(0.0, |c| c.x);
            self.store_f32(result, lane, value);
        }
    }

    /// `VEC3_ENVIRONMENT result, name, direction`.
    pub(super) fn vec3_environment(&mut self, t0: u8, t1: u8) {
        let result = self.fetch_address();
        let name_address = self.fetch_address();
        let direction = self.fetch_address();
        let name = self.string_value(name_address);
        let varying = tag_is_varying(t0);
        let count = if varying { self.lanes() } else { 1 };
        for lane in 0..count {
            if varying && !self.active(lane) {
                continue;
            }
            let d = self.load_vec3(direction, if tag_is_varying(t1) { lane } else { 0 });
            let value = self.context.textures.environment(&name, d).unwrap_or(Vec3::ZERO);
            self.store_vec3(result, lane, value);
        }
    }

    /// `SHADOW result, name, position, bias`: per-lane occlusion lookup.
    pub(super) fn shadow(&mut self, t0: u8, t1: u8, t2: u8) {
        let result = self.fetch_address();
        let name_address = self.fetch_address();
        let position = self.fetch_address();
        let bias = self.fetch_address();
        let name = self.string_value(name_address);
        let varying = tag_is_varying(t0);
        let count = if varying { self.lanes() } else { 1 };
        for lane in 0..count {
            if varying && !self.active(lane) {
                continue;
            }
            let p = self.load_vec3(position, if tag_is_varying(t1) { lane } else { 0 });
            let b = self.load_f32(bias, if tag_is_varying(t2) { lane } else { 0 });
            let value = self.context.textures.shadow(&name, p, b).unwrap_or(0.0);
            self.store_f32(result, lane, value);
        }
    }
}
