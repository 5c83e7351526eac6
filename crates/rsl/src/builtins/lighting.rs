//! Surface-side lighting built-ins, accumulating over the lights the
//! hosting grid has collected from its light shaders.

use crate::{
    address::Address,
    grid::{Light, LightGeometry},
    math3d::Vec3,
    vm::VirtualMachine,
};

/// The surface-to-light direction at `p`, with the light's own cone gate.
/// `None` for ambient lights and for lanes outside a light's cone.
fn light_direction(light: &Light, p: Vec3) -> Option<Vec3> {
    match light.geometry {
        LightGeometry::Ambient => None,
        LightGeometry::Solar { direction, .. } => Some(-direction),
        LightGeometry::Illuminate { position, axis, angle } => {
            let inside = match (axis, angle) {
                (Some(axis), Some(angle)) => (p - position).normalize().dot(axis.normalize()) >= angle.cos(),
                _ => true,
            };
            inside.then(|| (position - p).normalize())
        }
    }
}

fn surface_positions(vm: &VirtualMachine<'_, '_>) -> Option<Address> {
    vm.grid.find_symbol("P").map(crate::symbol::Symbol::address)
}

/// `ambient()`: the summed color of the non-directional lights.
pub(super) fn ambient(vm: &mut VirtualMachine<'_, '_>, result: Address) {
    let lights = vm.grid.lights().to_vec();
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        let mut sum = Vec3::ZERO;
        for light in &lights {
            if light.geometry == LightGeometry::Ambient {
                sum = sum + light.color_at(lane);
            }
        }
        vm.store_vec3(result, lane, sum);
    }
}

/// `diffuse(N)`: Lambertian accumulation over the directional lights.
pub(super) fn diffuse(vm: &mut VirtualMachine<'_, '_>, result: Address, n: Address) {
    let lights = vm.grid.lights().to_vec();
    let positions = surface_positions(vm);
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        let normal = vm.load_vec3(n, lane).normalize();
        let p = positions.map_or(Vec3::ZERO, |address| vm.load_vec3(address, lane));
        let mut sum = Vec3::ZERO;
        for light in &lights {
            if let Some(to_light) = light_direction(light, p) {
                let attenuation = normal.dot(to_light).max(0.0);
                sum = sum + light.color_at(lane) * attenuation;
            }
        }
        vm.store_vec3(result, lane, sum);
    }
}

/// `specular(N, V, roughness)`: Blinn highlight accumulation.
pub(super) fn specular(vm: &mut VirtualMachine<'_, '_>, result: Address, arguments: &[Address]) {
    let lights = vm.grid.lights().to_vec();
    let positions = surface_positions(vm);
    let roughness = vm.load_f32(arguments[2], 0).max(1.0e-4);
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        let normal = vm.load_vec3(arguments[0], lane).normalize();
        let viewer = vm.load_vec3(arguments[1], lane).normalize();
        let p = positions.map_or(Vec3::ZERO, |address| vm.load_vec3(address, lane));
        let mut sum = Vec3::ZERO;
        for light in &lights {
            if let Some(to_light) = light_direction(light, p) {
                let half = (to_light + viewer).normalize();
                let highlight = normal.dot(half).max(0.0).powf(1.0 / roughness);
                sum = sum + light.color_at(lane) * highlight;
            }
        }
        vm.store_vec3(result, lane, sum);
    }
}

/// `specularbrdf(L, N, V, roughness)`: the Blinn term for one explicit
/// light direction.
pub(super) fn specularbrdf(vm: &mut VirtualMachine<'_, '_>, result: Address, arguments: &[Address]) {
    let roughness = vm.load_f32(arguments[3], 0).max(1.0e-4);
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        let to_light = vm.load_vec3(arguments[0], lane).normalize();
        let normal = vm.load_vec3(arguments[1], lane).normalize();
        let viewer = vm.load_vec3(arguments[2], lane).normalize();
        let half = (to_light + viewer).normalize();
        let highlight = normal.dot(half).max(0.0).powf(1.0 / roughness);
        vm.store_vec3(result, lane, Vec3::splat(highlight));
    }
}

/// `phong(N, V, size)`: reflected-ray highlight accumulation.
pub(super) fn phong(vm: &mut VirtualMachine<'_, '_>, result: Address, arguments: &[Address]) {
    let lights = vm.grid.lights().to_vec();
    let positions = surface_positions(vm);
    let size = vm.load_f32(arguments[2], 0);
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        let normal = vm.load_vec3(arguments[0], lane).normalize();
        let viewer = vm.load_vec3(arguments[1], lane).normalize();
        let p = positions.map_or(Vec3::ZERO, |address| vm.load_vec3(address, lane));
        let mut sum = Vec3::ZERO;
        for light in &lights {
            if let Some(to_light) = light_direction(light, p) {
                let reflected = normal * (2.0 * normal.dot(to_light)) - to_light;
                let highlight = reflected.dot(viewer).max(0.0).powf(size);
                sum = sum + light.color_at(lane) * highlight;
            }
        }
        vm.store_vec3(result, lane, sum);
    }
}

/// `trace(P, R)`: no ray tracer sits behind the execution boundary, so the
/// traced color is black.
pub(super) fn trace(vm: &mut VirtualMachine<'_, '_>, result: Address) {
    for lane in 0..vm.lanes() {
        if !vm.active(lane) {
            continue;
        }
        vm.store_vec3(result, lane, Vec3::ZERO);
    }
}
