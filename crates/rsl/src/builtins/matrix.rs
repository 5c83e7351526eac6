//! Matrix built-ins. All uniform: one element per grid.

use crate::{
    address::Address,
    math3d::{Mat4, Vec3},
    vm::VirtualMachine,
};

/// `comp(m, row, column)`.
pub(super) fn comp(vm: &mut VirtualMachine<'_, '_>, result: Address, arguments: &[Address]) {
    let matrix = vm.load_mat4(arguments[0], 0);
    let row = (vm.load_f32(arguments[1], 0) as usize).min(3);
    let column = (vm.load_f32(arguments[2], 0) as usize).min(3);
    vm.store_f32(result, 0, matrix.get(row, column));
}

/// `setcomp(m, row, column, value)`: writes through the matrix argument.
pub(super) fn setcomp(vm: &mut VirtualMachine<'_, '_>, arguments: &[Address]) {
    let mut matrix = vm.load_mat4(arguments[0], 0);
    let row = (vm.load_f32(arguments[1], 0) as usize).min(3);
    let column = (vm.load_f32(arguments[2], 0) as usize).min(3);
    let value = vm.load_f32(arguments[3], 0);
    matrix.set(row, column, value);
    vm.store_mat4(arguments[0], 0, matrix);
}

pub(super) fn determinant(vm: &mut VirtualMachine<'_, '_>, result: Address, argument: Address) {
    let value = vm.load_mat4(argument, 0).determinant();
    vm.store_f32(result, 0, value);
}

/// `translate(m, v)`.
pub(super) fn translate(vm: &mut VirtualMachine<'_, '_>, result: Address, arguments: &[Address]) {
    let matrix = vm.load_mat4(arguments[0], 0);
    let v = vm.load_vec3(arguments[1], 0);
    vm.store_mat4(result, 0, matrix.multiply(&Mat4::translation(v)));
}

/// `rotate(m, angle, axis)`.
pub(super) fn rotate(vm: &mut VirtualMachine<'_, '_>, result: Address, arguments: &[Address]) {
    let matrix = vm.load_mat4(arguments[0], 0);
    let angle = vm.load_f32(arguments[1], 0);
    let axis = vm.load_vec3(arguments[2], 0);
    vm.store_mat4(result, 0, matrix.multiply(&Mat4::rotation(angle, axis)));
}

/// `scale(m, p)`.
pub(super) fn scale(vm: &mut VirtualMachine<'_, '_>, result: Address, arguments: &[Address]) {
    let matrix = vm.load_mat4(arguments[0], 0);
    let p = vm.load_vec3(arguments[1], 0);
    vm.store_mat4(result, 0, matrix.multiply(&Mat4::scaling(p)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_composes_on_the_right() {
        let m = Mat4::IDENTITY.multiply(&Mat4::translation(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(m.transform_point(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
    }
}
