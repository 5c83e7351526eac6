//! The lighting protocol: light emission from light shaders and the
//! per-light iteration behind the `illuminance` loop.
//!
//! `AMBIENT`, `SOLAR`, and `ILLUMINATE` execute before the statements that
//! compute the light's `Cl` and `Ol`, so each opens a pending light that
//! records the color and opacity addresses; the pending light is finalized
//! (its lane values copied out of grid memory) when the next light
//! statement opens or the program halts.

use crate::{
    address::Address,
    grid::{Light, LightGeometry},
    instruction::tag_is_varying,
    math3d::Vec3,
};

use super::VirtualMachine;

/// A light opened by `AMBIENT`/`SOLAR`/`ILLUMINATE` whose color and
/// opacity are read at finalization.
pub(super) struct PendingLight {
    geometry: LightGeometry,
    color: Address,
    opacity: Address,
}

impl VirtualMachine<'_, '_> {
    pub(super) fn finalize_pending_light(&mut self) {
        let Some(pending) = self.pending_light.take() else { return };
        let lanes = self.lanes();
        let read = |address: Address| {
            if address.is_null() {
                vec![Vec3::ZERO]
            } else {
                (0..lanes).map(|lane| self.load_vec3(address, lane)).collect()
            }
        };
        let color = read(pending.color);
        let opacity = read(pending.opacity);
        self.grid.add_light(Light {
            geometry: pending.geometry,
            color,
            opacity,
        });
    }

    fn open_light(&mut self, geometry: LightGeometry, color: Address, opacity: Address) {
        self.finalize_pending_light();
        self.pending_light = Some(PendingLight {
            geometry,
            color,
            opacity,
        });
    }

    /// `AMBIENT color, opacity`: opens a non-directional light.
    pub(super) fn ambient(&mut self) {
        let color = self.fetch_address();
        let opacity = self.fetch_address();
        self.open_light(LightGeometry::Ambient, color, opacity);
    }

    /// Bare `SOLAR`: a directional light shining down the light's local z
    /// axis, taken from the grid's transform.
    pub(super) fn solar(&mut self) {
        let direction = self.grid.transform().transform_vector(Vec3::new(0.0, 0.0, 1.0)).normalize();
        // The body still assigns Cl and Ol through their grid symbols;
        // resolve those addresses from the grid's own symbols.
        let color = self.grid.find_symbol("Cl").map_or(Address::NULL, |s| s.address());
        let opacity = self.grid.find_symbol("Ol").map_or(Address::NULL, |s| s.address());
        self.open_light(
            LightGeometry::Solar {
                direction,
                angle: None,
            },
            color,
            opacity,
        );
    }

    /// `SOLAR_AXIS_ANGLE axis, angle, color, opacity`.
    pub(super) fn solar_axis_angle(&mut self) {
        let axis = self.fetch_address();
        let angle = self.fetch_address();
        let color = self.fetch_address();
        let opacity = self.fetch_address();
        let direction = self.load_vec3(axis, 0).normalize();
        let angle = self.load_f32(angle, 0);
        self.open_light(
            LightGeometry::Solar {
                direction,
                angle: Some(angle),
            },
            color,
            opacity,
        );
    }

    /// `ILLUMINATE position[, axis, angle], Ps, L, color, opacity`: opens a
    /// positional light and writes the per-lane light-to-surface direction
    /// into `L` for the statement body.
    pub(super) fn illuminate(&mut self, axis_angle: bool) {
        let position_address = self.fetch_address();
        let (axis, angle) = if axis_angle {
            let axis_address = self.fetch_address();
            let angle_address = self.fetch_address();
            (
                Some(self.load_vec3(axis_address, 0).normalize()),
                Some(self.load_f32(angle_address, 0)),
            )
        } else {
            (None, None)
        };
        let surface_position = self.fetch_address();
        let light_direction = self.fetch_address();
        let color = self.fetch_address();
        let opacity = self.fetch_address();

        let position = self.load_vec3(position_address, 0);
        for lane in 0..self.lanes() {
            if !self.active(lane) {
                continue;
            }
            let ps = self.load_vec3(surface_position, lane);
            self.store_vec3(light_direction, lane, ps - position);
        }

        self.open_light(
            LightGeometry::Illuminate {
                position,
                axis,
                angle,
            },
            color,
            opacity,
        );
    }

    /// `JUMP_ILLUMINANCE distance`: advances the light iterator to the next
    /// light with a direction; with none left, resets the iterator and
    /// jumps past the loop.
    pub(super) fn jump_illuminance(&mut self, distance: i32) {
        let lights = self.grid.lights();
        let next = (self.light_cursor..lights.len()).find(|&i| lights[i].geometry != LightGeometry::Ambient);
        match next {
            Some(index) => {
                self.current_light = Some(index);
                self.light_cursor = index + 1;
            }
            None => {
                self.current_light = None;
                self.light_cursor = 0;
                self.jump(distance);
            }
        }
    }

    /// `ILLUMINANCE_AXIS_ANGLE position, axis, angle, L, color, opacity,
    /// mask`: the per-light per-lane cone test. Writes the surface-to-light
    /// vector into `L`, the light's lane color and opacity into `Cl` and
    /// `Ol`, and a per-lane integer into `mask` that the following
    /// `GENERATE_MASK` turns into the loop body's active mask.
    pub(super) fn illuminance_axis_angle(&mut self, t0: u8, t1: u8, t2: u8) {
        let position = self.fetch_address();
        let axis = self.fetch_address();
        let angle = self.fetch_address();
        let light_direction = self.fetch_address();
        let light_color = self.fetch_address();
        let light_opacity = self.fetch_address();
        let mask = self.fetch_address();

        let light = self
            .current_light
            .map(|index| self.grid.lights()[index].clone())
            .expect("illuminance body runs with a current light");

        for lane in 0..self.lanes() {
            if !self.active(lane) {
                continue;
            }
            let p = self.load_vec3(position, if tag_is_varying(t0) { lane } else { 0 });
            let gather_axis = self.load_vec3(axis, if tag_is_varying(t1) { lane } else { 0 });
            let gather_angle = self.load_f32(angle, if tag_is_varying(t2) { lane } else { 0 });

            let (to_light, inside_light) = match light.geometry {
                LightGeometry::Solar { direction, .. } => (-direction, true),
                LightGeometry::Illuminate {
                    position: light_position,
                    axis: light_axis,
                    angle: light_angle,
                } => {
                    let to_light = light_position - p;
                    let inside = match (light_axis, light_angle) {
                        (Some(light_axis), Some(light_angle)) => {
                            (p - light_position).normalize().dot(light_axis) >= light_angle.cos()
                        }
                        _ => true,
                    };
                    (to_light, inside)
                }
                LightGeometry::Ambient => unreachable!("ambient lights are skipped by the iterator"),
            };

            let inside_gather = to_light.normalize().dot(gather_axis.normalize()) >= gather_angle.cos();

            self.store_vec3(light_direction, lane, to_light);
            self.store_vec3(light_color, lane, light.color_at(lane));
            self.store_vec3(light_opacity, lane, light.opacity_at(lane));
            self.store_i32(mask, lane, i32::from(inside_gather && inside_light));
        }
    }
}
