//! Mathematical built-ins: trigonometry, interpolation, rounding,
//! derivatives, and the seeded random generators.

use rand::Rng;

use crate::{
    address::Address,
    math3d::Vec3,
    symbol::SymbolParameter,
    value::ValueStorage,
    vm::VirtualMachine,
};

fn lane_count(vm: &VirtualMachine<'_, '_>, storage: ValueStorage) -> usize {
    if storage.is_varying() { vm.lanes() } else { 1 }
}

fn element(parameters: &[SymbolParameter], index: usize, lane: usize) -> usize {
    if parameters[index].storage().is_varying() { lane } else { 0 }
}

/// Applies `f` elementwise to a float argument whose storage matches the
/// result's.
pub(super) fn unary_float(
    vm: &mut VirtualMachine<'_, '_>,
    storage: ValueStorage,
    result: Address,
    argument: Address,
    f: impl Fn(f32) -> f32,
) {
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let value = vm.load_f32(argument, lane);
        vm.store_f32(result, lane, f(value));
    }
}

/// Applies `f` elementwise to two float arguments, each read with its
/// registered parameter stride.
pub(super) fn binary_float(
    vm: &mut VirtualMachine<'_, '_>,
    storage: ValueStorage,
    result: Address,
    arguments: &[Address],
    parameters: &[SymbolParameter],
    f: impl Fn(f32, f32) -> f32,
) {
    let varying = storage.is_varying();
    for lane in 0..lane_count(vm, storage) {
        if varying && !vm.active(lane) {
            continue;
        }
        let a = vm.load_f32(arguments[0], element(parameters, 0, lane));
        let b = vm.load_f32(arguments[1], element(parameters, 1, lane));
        vm.store_f32(result, lane, f(a, b));
    }
}

/// `mix(x, y, alpha)` over floats.
pub(super) fn mix_float(
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
        let x = vm.load_f32(arguments[0], element(parameters, 0, lane));
        let y = vm.load_f32(arguments[1], element(parameters, 1, lane));
        let alpha = vm.load_f32(arguments[2], element(parameters, 2, lane));
        vm.store_f32(result, lane, x * (1.0 - alpha) + y * alpha);
    }
}

/// `mix(x, y, alpha)` over three-float values with a float alpha.
pub(super) fn mix_vec3(
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
        let x = vm.load_vec3(arguments[0], element(parameters, 0, lane));
        let y = vm.load_vec3(arguments[1], element(parameters, 1, lane));
        let alpha = vm.load_f32(arguments[2], element(parameters, 2, lane));
        vm.store_vec3(result, lane, x * (1.0 - alpha) + y * alpha);
    }
}

/// `smoothstep(min, max, x)`: Hermite interpolation clamped to `[0, 1]`.
pub(super) fn smoothstep(
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
        let min = vm.load_f32(arguments[0], element(parameters, 0, lane));
        let max = vm.load_f32(arguments[1], element(parameters, 1, lane));
        let x = vm.load_f32(arguments[2], element(parameters, 2, lane));
        let t = ((x - min) / (max - min)).clamp(0.0, 1.0);
        vm.store_f32(result, lane, t * t * (3.0 - 2.0 * t));
    }
}

// --- derivatives ---
//
// Central differences across the grid's u rows and v columns, with
// one-sided differences at the edges.

pub(super) fn du_float_values(vm: &VirtualMachine<'_, '_>, p: Address) -> Vec<f32> {
    let width = vm.grid.width();
    let height = vm.grid.height();
    let du = vm.grid.du();
    let value = |lane: usize| vm.load_f32(p, lane);
    let mut out = vec![0.0f32; width * height];
    if width < 2 {
        return out;
    }
    for y in 0..height {
        let row = y * width;
        out[row] = (value(row + 1) - value(row)) / du;
        for x in 1..width - 1 {
            out[row + x] = (value(row + x + 1) - value(row + x - 1)) / (2.0 * du);
        }
        out[row + width - 1] = (value(row + width - 1) - value(row + width - 2)) / du;
    }
    out
}

pub(super) fn dv_float_values(vm: &VirtualMachine<'_, '_>, p: Address) -> Vec<f32> {
    let width = vm.grid.width();
    let height = vm.grid.height();
    let dv = vm.grid.dv();
    let value = |lane: usize| vm.load_f32(p, lane);
    let mut out = vec![0.0f32; width * height];
    if height < 2 {
        return out;
    }
    for x in 0..width {
        out[x] = (value(width + x) - value(x)) / dv;
        for y in 1..height - 1 {
            out[y * width + x] = (value((y + 1) * width + x) - value((y - 1) * width + x)) / (2.0 * dv);
        }
        let last = (height - 1) * width + x;
        out[last] = (value(last) - value(last - width)) / dv;
    }
    out
}

pub(super) fn du_vec3_values(vm: &VirtualMachine<'_, '_>, p: Address) -> Vec<Vec3> {
    let width = vm.grid.width();
    let height = vm.grid.height();
    let du = vm.grid.du();
    let value = |lane: usize| vm.load_vec3(p, lane);
    let mut out = vec![Vec3::ZERO; width * height];
    if width < 2 {
        return out;
    }
    for y in 0..height {
        let row = y * width;
        out[row] = (value(row + 1) - value(row)) / du;
        for x in 1..width - 1 {
            out[row + x] = (value(row + x + 1) - value(row + x - 1)) / (2.0 * du);
        }
        out[row + width - 1] = (value(row + width - 1) - value(row + width - 2)) / du;
    }
    out
}

pub(super) fn dv_vec3_values(vm: &VirtualMachine<'_, '_>, p: Address) -> Vec<Vec3> {
    let width = vm.grid.width();
    let height = vm.grid.height();
    let dv = vm.grid.dv();
    let value = |lane: usize| vm.load_vec3(p, lane);
    let mut out = vec![Vec3::ZERO; width * height];
    if height < 2 {
        return out;
    }
    for x in 0..width {
        out[x] = (value(width + x) - value(x)) / dv;
        for y in 1..height - 1 {
            out[y * width + x] = (value((y + 1) * width + x) - value((y - 1) * width + x)) / (2.0 * dv);
        }
        let last = (height - 1) * width + x;
        out[last] = (value(last) - value(last - width)) / dv;
    }
    out
}

pub(super) fn du_float(vm: &mut VirtualMachine<'_, '_>, result: Address, p: Address) {
    let values = du_float_values(vm, p);
    for (lane, value) in values.into_iter().enumerate() {
        if vm.active(lane) {
            vm.store_f32(result, lane, value);
        }
    }
}

pub(super) fn dv_float(vm: &mut VirtualMachine<'_, '_>, result: Address, p: Address) {
    let values = dv_float_values(vm, p);
    for (lane, value) in values.into_iter().enumerate() {
        if vm.active(lane) {
            vm.store_f32(result, lane, value);
        }
    }
}

pub(super) fn du_vec3(vm: &mut VirtualMachine<'_, '_>, result: Address, p: Address) {
    let values = du_vec3_values(vm, p);
    for (lane, value) in values.into_iter().enumerate() {
        if vm.active(lane) {
            vm.store_vec3(result, lane, value);
        }
    }
}

pub(super) fn dv_vec3(vm: &mut VirtualMachine<'_, '_>, result: Address, p: Address) {
    let values = dv_vec3_values(vm, p);
    for (lane, value) in values.into_iter().enumerate() {
        if vm.active(lane) {
            vm.store_vec3(result, lane, value);
        }
    }
}

/// `Deriv(y, x)`: dy/dx as the sum of the u- and v-direction difference
/// quotients.
pub(super) fn deriv_float(vm: &mut VirtualMachine<'_, '_>, result: Address, y: Address, x: Address) {
    let dy_du = du_float_values(vm, y);
    let dx_du = du_float_values(vm, x);
    let dy_dv = dv_float_values(vm, y);
    let dx_dv = dv_float_values(vm, x);
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        let value = dy_du[lane] / dx_du[lane] + dy_dv[lane] / dx_dv[lane];
        vm.store_f32(result, lane, value);
    }
}

/// `Deriv(y, x)` for the three-float types; the vec3 difference quotients
/// divide componentwise by the scalar denominator.
pub(super) fn deriv_vec3(vm: &mut VirtualMachine<'_, '_>, result: Address, y: Address, x: Address) {
    let dy_du = du_vec3_values(vm, y);
    let dx_du = du_float_values(vm, x);
    let dy_dv = dv_vec3_values(vm, y);
    let dx_dv = dv_float_values(vm, x);
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        let value = dy_du[lane] / dx_du[lane] + dy_dv[lane] / dx_dv[lane];
        vm.store_vec3(result, lane, value);
    }
}

// --- random ---

pub(super) fn uniform_float_random(vm: &mut VirtualMachine<'_, '_>, result: Address) {
    let value = vm.context.rng.r#gen::<f32>();
    vm.store_f32(result, 0, value);
}

pub(super) fn uniform_vec3_random(vm: &mut VirtualMachine<'_, '_>, result: Address) {
    let value = Vec3::new(vm.context.rng.r#gen(), vm.context.rng.r#gen(), vm.context.rng.r#gen());
    vm.store_vec3(result, 0, value);
}

pub(super) fn float_random(vm: &mut VirtualMachine<'_, '_>, result: Address) {
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        let value = vm.context.rng.r#gen::<f32>();
        vm.store_f32(result, lane, value);
    }
}

pub(super) fn vec3_random(vm: &mut VirtualMachine<'_, '_>, result: Address) {
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        let value = Vec3::new(vm.context.rng.r#gen(), vm.context.rng.r#gen(), vm.context.rng.r#gen());
        vm.store_vec3(result, lane, value);
    }
}
