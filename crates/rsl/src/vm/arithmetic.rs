//! Arithmetic, comparison, and logical instruction handlers.
//!
//! Every handler decodes `result, lhs, rhs` argument words and iterates
//! lanes according to the operand tags: the result is varying when either
//! operand is, and uniform operands broadcast element zero.

use crate::instruction::{FAMILY_MATRIX, FAMILY_SCALAR, FAMILY_STRING, FAMILY_VEC3, tag_family, tag_is_varying};

use super::VirtualMachine;

impl VirtualMachine<'_, '_> {
    fn operands(&mut self) -> (crate::address::Address, crate::address::Address, crate::address::Address) {
        let result = self.fetch_address();
        let lhs = self.fetch_address();
        let rhs = self.fetch_address();
        (result, lhs, rhs)
    }

    fn lane_count(&self, t0: u8, t1: u8) -> (usize, bool) {
        let varying = tag_is_varying(t0) || tag_is_varying(t1);
        (if varying { self.lanes() } else { 1 }, varying)
    }

    /// Componentwise binary operation over whatever family the operands
    /// share after conversion.
    fn elementwise(&mut self, t0: u8, t1: u8, op: fn(f32, f32) -> f32) {
        let (result, lhs, rhs) = self.operands();
        let (count, varying) = self.lane_count(t0, t1);
        let components = crate::instruction::tag_components(t0);
        for lane in 0..count {
            if varying && !self.active(lane) {
                continue;
            }
            let lhs_lane = if tag_is_varying(t0) { lane } else { 0 };
            let rhs_lane = if tag_is_varying(t1) { lane } else { 0 };
            for component in 0..components {
                let a = self.load_f32(lhs, lhs_lane * components + component);
                let b = self.load_f32(rhs, rhs_lane * components + component);
                self.store_f32(result, lane * components + component, op(a, b));
            }
        }
    }

    /// `DOT`: product-sum of three-float elements; a float result.
    pub(super) fn dot(&mut self, t0: u8, t1: u8) {
        let (result, lhs, rhs) = self.operands();
        let (count, varying) = self.lane_count(t0, t1);
        for lane in 0..count {
            if varying && !self.active(lane) {
                continue;
            }
            let a = self.load_vec3(lhs, if tag_is_varying(t0) { lane } else { 0 });
            let b = self.load_vec3(rhs, if tag_is_varying(t1) { lane } else { 0 });
            self.store_f32(result, lane, a.dot(b));
        }
    }

    /// `MULTIPLY`: componentwise for scalars and three-float types, a true
    /// matrix product for matrices.
    pub(super) fn multiply(&mut self, t0: u8, t1: u8) {
        if tag_family(t0) == FAMILY_MATRIX {
            let (result, lhs, rhs) = self.operands();
            let (count, varying) = self.lane_count(t0, t1);
            for lane in 0..count {
                if varying && !self.active(lane) {
                    continue;
                }
                let a = self.load_mat4(lhs, if tag_is_varying(t0) { lane } else { 0 });
                let b = self.load_mat4(rhs, if tag_is_varying(t1) { lane } else { 0 });
                self.store_mat4(result, lane, a.multiply(&b));
            }
            return;
        }
        self.elementwise(t0, t1, |a, b| a * b);
    }

    /// `DIVIDE`: element-wise float division for scalars and vec3s divided
    /// by a scalar; matrix division multiplies by the inverse.
    pub(super) fn divide(&mut self, t0: u8, t1: u8) {
        match (tag_family(t0), tag_family(t1)) {
            (FAMILY_SCALAR, FAMILY_SCALAR) => self.elementwise(t0, t1, |a, b| a / b),
            (FAMILY_VEC3, FAMILY_SCALAR) => {
                let (result, lhs, rhs) = self.operands();
                let (count, varying) = self.lane_count(t0, t1);
                for lane in 0..count {
                    if varying && !self.active(lane) {
                        continue;
                    }
                    let a = self.load_vec3(lhs, if tag_is_varying(t0) { lane } else { 0 });
                    let b = self.load_f32(rhs, if tag_is_varying(t1) { lane } else { 0 });
                    self.store_vec3(result, lane, a / b);
                }
            }
            (FAMILY_MATRIX, FAMILY_SCALAR) => {
                let (result, lhs, rhs) = self.operands();
                let (count, varying) = self.lane_count(t0, t1);
                for lane in 0..count {
                    if varying && !self.active(lane) {
                        continue;
                    }
                    let a = self.load_mat4(lhs, if tag_is_varying(t0) { lane } else { 0 });
                    let b = self.load_f32(rhs, if tag_is_varying(t1) { lane } else { 0 });
                    let mut out = a;
                    for value in &mut out.0 {
                        *value /= b;
                    }
                    self.store_mat4(result, lane, out);
                }
            }
            (FAMILY_SCALAR, FAMILY_MATRIX) => {
                let (result, lhs, rhs) = self.operands();
                let (count, varying) = self.lane_count(t0, t1);
                for lane in 0..count {
                    if varying && !self.active(lane) {
                        continue;
                    }
                    let a = self.load_f32(lhs, if tag_is_varying(t0) { lane } else { 0 });
                    let b = self.load_mat4(rhs, if tag_is_varying(t1) { lane } else { 0 });
                    let mut out = b.inverse();
                    for value in &mut out.0 {
                        *value *= a;
                    }
                    self.store_mat4(result, lane, out);
                }
            }
            (FAMILY_MATRIX, FAMILY_MATRIX) => {
                let (result, lhs, rhs) = self.operands();
                let (count, varying) = self.lane_count(t0, t1);
                for lane in 0..count {
                    if varying && !self.active(lane) {
                        continue;
                    }
                    let a = self.load_mat4(lhs, if tag_is_varying(t0) { lane } else { 0 });
                    let b = self.load_mat4(rhs, if tag_is_varying(t1) { lane } else { 0 });
                    self.store_mat4(result, lane, a.multiply(&b.inverse()));
                }
            }
            _ => panic!("invalid divide dispatch"),
        }
    }

    pub(super) fn add(&mut self, t0: u8, t1: u8) {
        self.elementwise(t0, t1, |a, b| a + b);
    }

    pub(super) fn subtract(&mut self, t0: u8, t1: u8) {
        self.elementwise(t0, t1, |a, b| a - b);
    }

    pub(super) fn negate(&mut self, t0: u8) {
        let result = self.fetch_address();
        let source = self.fetch_address();
        let varying = tag_is_varying(t0);
        let count = if varying { self.lanes() } else { 1 };
        let components = crate::instruction::tag_components(t0);
        for lane in 0..count {
            if varying && !self.active(lane) {
                continue;
            }
            for component in 0..components {
                let value = self.load_f32(source, lane * components + component);
                self.store_f32(result, lane * components + component, -value);
            }
        }
    }

    /// Float-only ordering comparisons; writes an integer mask.
    pub(super) fn compare(&mut self, t0: u8, t1: u8, op: fn(f32, f32) -> bool) {
        let (result, lhs, rhs) = self.operands();
        let (count, varying) = self.lane_count(t0, t1);
        for lane in 0..count {
            if varying && !self.active(lane) {
                continue;
            }
            let a = self.load_f32(lhs, if tag_is_varying(t0) { lane } else { 0 });
            let b = self.load_f32(rhs, if tag_is_varying(t1) { lane } else { 0 });
            self.store_i32(result, lane, i32::from(op(a, b)));
        }
    }

    /// `EQUAL` and `NOT_EQUAL` over any value type, including strings and
    /// matrices; writes an integer mask.
    pub(super) fn equality(&mut self, t0: u8, t1: u8, negated: bool) {
        if tag_family(t0) == FAMILY_STRING {
            let (result, lhs, rhs) = self.operands();
            let equal = self.string_value(lhs) == self.string_value(rhs);
            self.store_i32(result, 0, i32::from(equal != negated));
            return;
        }

        let (result, lhs, rhs) = self.operands();
        let (count, varying) = self.lane_count(t0, t1);
        let components = crate::instruction::tag_components(t0);
        for lane in 0..count {
            if varying && !self.active(lane) {
                continue;
            }
            let lhs_lane = if tag_is_varying(t0) { lane } else { 0 };
            let rhs_lane = if tag_is_varying(t1) { lane } else { 0 };
            let equal = (0..components).all(|component| {
                self.load_f32(lhs, lhs_lane * components + component)
                    == self.load_f32(rhs, rhs_lane * components + component)
            });
            self.store_i32(result, lane, i32::from(equal != negated));
        }
    }

    /// `AND` and `OR` over integer masks.
    pub(super) fn logical(&mut self, t0: u8, t1: u8, op: fn(bool, bool) -> bool) {
        let (result, lhs, rhs) = self.operands();
        let (count, varying) = self.lane_count(t0, t1);
        for lane in 0..count {
            if varying && !self.active(lane) {
                continue;
            }
            let a = self.load_i32(lhs, if tag_is_varying(t0) { lane } else { 0 }) != 0;
            let b = self.load_i32(rhs, if tag_is_varying(t1) { lane } else { 0 }) != 0;
            self.store_i32(result, lane, i32::from(op(a, b)));
        }
    }
}
