//! Geometric built-ins: component access, vector measures, reflection and
//! refraction, coordinate-space transforms, and grid-derived quantities.

use crate::{
    address::Address,
    math3d::{Mat4, Vec3},
    symbol::SymbolParameter,
    value::ValueStorage,
    vm::VirtualMachine,
};

use super::{Builtin, math};

fn lane_count(vm: &VirtualMachine<'_, '_>, storage: ValueStorage) -> usize {
    if storage.is_varying() { vm.lanes() } else { 1 }
}

fn element(parameters: &[SymbolParameter], index: usize, lane: usize) -> usize {
    if parameters[index].storage().is_varying() { lane } else { 0 }
}

/// `xcomp`/`ycomp`/`zcomp`.
pub(super) fn component(
    vm: &mut VirtualMachine<'_, '_>,
    storage: ValueStorage,
    result: Address,
    argument: Address,
    index: usize,
) {
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let value = vm.load_vec3(argument, lane).to_array()[index];
        vm.store_f32(result, lane, value);
    }
}

/// `setxcomp`/`setycomp`/`setzcomp`: writes through the first argument.
pub(super) fn set_component(
    vm: &mut VirtualMachine<'_, '_>,
    arguments: &[Address],
    parameters: &[SymbolParameter],
    index: usize,
) {
    let varying = parameters[0].storage().is_varying();
    let count = if varying { vm.lanes() } else { 1 };
    for lane in 0..count {
        if varying && !vm.active(lane) {
            continue;
        }
        let mut value = vm.load_vec3(arguments[0], lane).to_array();
        value[index] = vm.load_f32(arguments[1], element(parameters, 1, lane));
        vm.store_vec3(arguments[0], lane, Vec3::from_array(value));
    }
}

pub(super) fn length(vm: &mut VirtualMachine<'_, '_>, storage: ValueStorage, result: Address, argument: Address) {
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let value = vm.load_vec3(argument, lane).length();
        vm.store_f32(result, lane, value);
    }
}

pub(super) fn normalize(vm: &mut VirtualMachine<'_, '_>, storage: ValueStorage, result: Address, argument: Address) {
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let value = vm.load_vec3(argument, lane).normalize();
        vm.store_vec3(result, lane, value);
    }
}

pub(super) fn distance(vm: &mut VirtualMachine<'_, '_>, storage: ValueStorage, result: Address, arguments: &[Address]) {
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let a = vm.load_vec3(arguments[0], lane);
        let b = vm.load_vec3(arguments[1], lane);
        vm.store_f32(result, lane, (a - b).length());
    }
}

/// `rotate(q, angle, p1, p2)`: rotates `q` by `angle` radians about the
/// line through `p1` and `p2`.
pub(super) fn rotate(
    vm: &mut VirtualMachine<'_, '_>,
    storage: ValueStorage,
    result: Address,
    arguments: &[Address],
    parameters: &[SymbolParameter],
) {
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let q = vm.load_vec3(arguments[0], element(parameters, 0, lane));
        let angle = vm.load_f32(arguments[1], element(parameters, 1, lane));
        let p1 = vm.load_vec3(arguments[2], element(parameters, 2, lane));
        let p2 = vm.load_vec3(arguments[3], element(parameters, 3, lane));
        let rotation = Mat4::rotation(angle, p2 - p1);
        let value = rotation.transform_vector(q - p1) + p1;
        vm.store_vec3(result, lane, value);
    }
}

/// `area(P)`: the micropolygon area from the surface derivatives.
pub(super) fn area(vm: &mut VirtualMachine<'_, '_>, result: Address, p: Address) {
    let du = vm.grid.du();
    let dv = vm.grid.dv();
    let dpdu = math::du_vec3_values(vm, p);
    let dpdv = math::dv_vec3_values(vm, p);
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        let value = (dpdu[lane] * du).cross(dpdv[lane] * dv).length();
        vm.store_f32(result, lane, value);
    }
}

/// `faceforward(N, I[, Nref])`: flips `N` to face against `I`.
pub(super) fn faceforward(
    vm: &mut VirtualMachine<'_, '_>,
    storage: ValueStorage,
    result: Address,
    n: Address,
    i: Address,
    nref: Option<Address>,
) {
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let normal = vm.load_vec3(n, lane);
        let incident = vm.load_vec3(i, lane);
        let reference = nref.map_or(normal, |address| vm.load_vec3(address, lane));
        let value = if (-incident).dot(reference) < 0.0 { -normal } else { normal };
        vm.store_vec3(result, lane, value);
    }
}

/// `reflect(I, N)`.
pub(super) fn reflect(vm: &mut VirtualMachine<'_, '_>, storage: ValueStorage, result: Address, arguments: &[Address]) {
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let i = vm.load_vec3(arguments[0], lane);
        let n = vm.load_vec3(arguments[1], lane);
        let value = i - n * (2.0 * i.dot(n));
        vm.store_vec3(result, lane, value);
    }
}

/// `refract(I, N, eta)`: zero past the critical angle.
pub(super) fn refract(
    vm: &mut VirtualMachine<'_, '_>,
    storage: ValueStorage,
    result: Address,
    arguments: &[Address],
    parameters: &[SymbolParameter],
) {
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let i = vm.load_vec3(arguments[0], lane);
        let n = vm.load_vec3(arguments[1], lane);
        let eta = vm.load_f32(arguments[2], element(parameters, 2, lane));
        let cos_i = i.dot(n);
        let k = 1.0 - eta * eta * (1.0 - cos_i * cos_i);
        let value = if k < 0.0 {
            Vec3::ZERO
        } else {
            i * eta - n * (eta * cos_i + k.sqrt())
        };
        vm.store_vec3(result, lane, value);
    }
}

/// `fresnel(I, N, eta, Kr, Kt)`: writes the reflectance and transmittance
/// through its output arguments.
pub(super) fn fresnel(vm: &mut VirtualMachine<'_, '_>, arguments: &[Address], parameters: &[SymbolParameter]) {
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        let i = vm.load_vec3(arguments[0], lane);
        let n = vm.load_vec3(arguments[1], lane);
        let eta = vm.load_f32(arguments[2], element(parameters, 2, lane));

        let c = i.normalize().dot(n.normalize()).abs().min(1.0);
        let g_squared = eta * eta + c * c - 1.0;
        let kr = if g_squared < 0.0 {
            // Total internal reflection.
            1.0
        } else {
            let g = g_squared.sqrt();
            let a = (g - c) / (g + c);
            let b = (c * (g + c) - 1.0) / (c * (g - c) + 1.0);
            0.5 * a * a * (1.0 + b * b)
        };
        vm.store_f32(arguments[3], lane, kr);
        vm.store_f32(arguments[4], lane, 1.0 - kr);
    }
}

/// The `transform`/`vtransform`/`ntransform` family by named space or
/// matrix, with or without a from-space.
pub(super) fn transform(
    vm: &mut VirtualMachine<'_, '_>,
    builtin: Builtin,
    storage: ValueStorage,
    result: Address,
    arguments: &[Address],
) {
    // Resolve the matrix mapping the source space to the target space.
    let matrix = match builtin {
        Builtin::Transform | Builtin::VectorTransform | Builtin::NormalTransform => {
            let name = vm.string_value(arguments[0]);
            vm.grid.coordinate_transform(&name)
        }
        Builtin::TransformFrom | Builtin::VectorTransformFrom | Builtin::NormalTransformFrom => {
            let from = vm.string_value(arguments[0]);
            let to = vm.string_value(arguments[1]);
            vm.grid.coordinate_transform(&to).multiply(&vm.grid.coordinate_transform(&from).inverse())
        }
        Builtin::TransformMatrix | Builtin::VectorTransformMatrix | Builtin::NormalTransformMatrix => {
            vm.load_mat4(arguments[0], 0)
        }
        Builtin::TransformFromMatrix | Builtin::VectorTransformFromMatrix | Builtin::NormalTransformFromMatrix => {
            let from = vm.string_value(arguments[0]);
            vm.load_mat4(arguments[1], 0).multiply(&vm.grid.coordinate_transform(&from).inverse())
        }
        _ => unreachable!("not a transform built-in"),
    };

    let value_argument = *arguments.last().expect("transform has a value argument");
    let as_point = matches!(
        builtin,
        Builtin::Transform | Builtin::TransformFrom | Builtin::TransformMatrix | Builtin::TransformFromMatrix
    );
    let as_normal = matches!(
        builtin,
        Builtin::NormalTransform
            | Builtin::NormalTransformFrom
            | Builtin::NormalTransformMatrix
            | Builtin::NormalTransformFromMatrix
    );
    let normal_matrix = matrix.inverse().transpose();

    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let value = vm.load_vec3(value_argument, lane);
        let out = if as_point {
            matrix.transform_point(value)
        } else if as_normal {
            normal_matrix.transform_vector(value)
        } else {
            matrix.transform_vector(value)
        };
        vm.store_vec3(result, lane, out);
    }
}

/// `depth(P)`: the camera-space depth of a point.
pub(super) fn depth(vm: &mut VirtualMachine<'_, '_>, storage: ValueStorage, result: Address, p: Address) {
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let value = vm.load_vec3(p, lane).z;
        vm.store_f32(result, lane, value);
    }
}

/// `calculatenormal(P)`: the cross product of the surface derivatives.
pub(super) fn calculatenormal(vm: &mut VirtualMachine<'_, '_>, result: Address, p: Address) {
    let dpdu = math::du_vec3_values(vm, p);
    let dpdv = math::dv_vec3_values(vm, p);
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        vm.store_vec3(result, lane, dpdu[lane].cross(dpdv[lane]));
    }
}
