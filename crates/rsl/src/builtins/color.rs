//! Color built-ins: component access and color-space conversion.

use crate::{
    address::Address,
    error::ErrorCode,
    math3d::Vec3,
    symbol::SymbolParameter,
    value::ValueStorage,
    vm::VirtualMachine,
};

/// The 3x3 matrix taking RGB into a named color space. `rgb` is identity;
/// unknown names are reported as `unknown-color-space` by callers.
pub(crate) fn color_matrix(name: &str) -> Option<[[f32; 3]; 3]> {
    match name {
        "rgb" => Some([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
        "xyz" => Some([
            [0.412_453, 0.357_580, 0.180_423],
            [0.212_671, 0.715_160, 0.072_169],
            [0.019_334, 0.119_193, 0.950_227],
        ]),
        "yiq" => Some([
            [0.299, 0.587, 0.114],
            [0.595_716, -0.274_453, -0.321_263],
            [0.211_456, -0.522_591, 0.311_135],
        ]),
        _ => None,
    }
}

fn lane_count(vm: &VirtualMachine<'_, '_>, storage: ValueStorage) -> usize {
    if storage.is_varying() { vm.lanes() } else { 1 }
}

/// `comp(c, index)`.
pub(super) fn comp(vm: &mut VirtualMachine<'_, '_>, storage: ValueStorage, result: Address, arguments: &[Address]) {
    let index = (vm.load_f32(arguments[1], 0) as usize).min(2);
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let value = vm.load_vec3(arguments[0], lane).to_array()[index];
        vm.store_f32(result, lane, value);
    }
}

/// `setcomp(c, index, value)`: writes through the first argument.
pub(super) fn setcomp(vm: &mut VirtualMachine<'_, '_>, arguments: &[Address], parameters: &[SymbolParameter]) {
    let index = (vm.load_f32(arguments[1], 0) as usize).min(2);
    let varying = parameters[0].storage().is_varying();
    let count = if varying { vm.lanes() } else { 1 };
    let value_varying = parameters[2].storage().is_varying();
    for lane in 0..count {
        if varying && !vm.active(lane) {
            continue;
        }
        let mut color = vm.load_vec3(arguments[0], lane).to_array();
        color[index] = vm.load_f32(arguments[2], if value_varying { lane } else { 0 });
        vm.store_vec3(arguments[0], lane, Vec3::from_array(color));
    }
}

/// `ctransform(space, c)`: converts from RGB to the named color space.
pub(super) fn ctransform(
    vm: &mut VirtualMachine<'_, '_>,
    storage: ValueStorage,
    result: Address,
    arguments: &[Address],
) {
    let name = vm.string_value(arguments[0]);
    let matrix = color_matrix(&name).unwrap_or_else(|| {
        vm.report(
            ErrorCode::UnknownColorSpace,
            &format!("Unknown color space '{name}' passed to ctransform()"),
        );
        color_matrix("rgb").expect("rgb is known")
    });
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let c = vm.load_vec3(arguments[1], lane);
        let value = Vec3::new(
            matrix[0][0] * c.x + matrix[0][1] * c.y + matrix[0][2] * c.z,
            matrix[1][0] * c.x + matrix[1][1] * c.y + matrix[1][2] * c.z,
            matrix[2][0] * c.x + matrix[2][1] * c.y + matrix[2][2] * c.z,
        );
        vm.store_vec3(result, lane, value);
    }
}
