//! The grid of surface samples a shader executes over.
//!
//! A grid is a `width x height` sheet of lanes. Binding a shader lays out
//! the shader's `GRID` segment symbols over the grid's backing memory and
//! sizes the string table; the virtual machine then reads and writes lane
//! values through the addressing contract: a `GRID` offset indexes the
//! backing memory after subtracting the offset of the first visible
//! symbol.
//!
//! The grid also carries the execution environment the lighting protocol
//! needs: the object-to-camera transform, a registry of named coordinate
//! systems, and the list of lights emitted by light shaders.

use indexmap::IndexMap;

use crate::{
    address::Segment,
    math3d::{Mat4, Vec3},
    shader::Shader,
    symbol::Symbol,
    value::{ValueStorage, ValueType},
};

/// The geometry of one light emitted by a light shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightGeometry {
    /// Non-directional; contributes to `ambient()` only.
    Ambient,
    /// Directional light. `direction` points from the light toward the
    /// scene; a cone `angle` gates it when present.
    Solar { direction: Vec3, angle: Option<f32> },
    /// Positional light, optionally restricted to a cone around `axis`.
    Illuminate {
        position: Vec3,
        axis: Option<Vec3>,
        angle: Option<f32>,
    },
}

/// One light's contribution to a grid: its geometry plus per-lane color
/// and opacity (a single element when the light shader computed uniform
/// values).
#[derive(Debug, Clone)]
pub struct Light {
    pub geometry: LightGeometry,
    pub color: Vec<Vec3>,
    pub opacity: Vec<Vec3>,
}

impl Light {
    /// The color this light contributes at `lane`.
    #[must_use]
    pub fn color_at(&self, lane: usize) -> Vec3 {
        self.color.get(lane).or_else(|| self.color.first()).copied().unwrap_or(Vec3::ZERO)
    }

    /// The opacity this light contributes at `lane`.
    #[must_use]
    pub fn opacity_at(&self, lane: usize) -> Vec3 {
        self.opacity.get(lane).or_else(|| self.opacity.first()).copied().unwrap_or(Vec3::ZERO)
    }
}

/// A sheet of surface samples with named per-lane and per-grid values.
#[derive(Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    du: f32,
    dv: f32,
    symbols: Vec<Symbol>,
    memory: Vec<u8>,
    strings: Vec<String>,
    lights: Vec<Light>,
    transform: Mat4,
    coordinate_systems: IndexMap<String, Mat4>,
}

impl Grid {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        debug_assert!(width >= 1 && height >= 1);
        let du = if width > 1 { 1.0 / (width as f32 - 1.0) } else { 1.0 };
        let dv = if height > 1 { 1.0 / (height as f32 - 1.0) } else { 1.0 };
        Self {
            width,
            height,
            du,
            dv,
            symbols: Vec::new(),
            memory: Vec::new(),
            strings: Vec::new(),
            lights: Vec::new(),
            transform: Mat4::IDENTITY,
            coordinate_systems: IndexMap::new(),
        }
    }

    /// Lays this grid out for `shader`: adopts its grid and string symbols,
    /// zeroes fresh backing memory, and sizes the string table. Lights,
    /// the transform, and coordinate systems are kept.
    ///
    /// # Panics
    ///
    /// Panics if the grid has more lanes than the shader was compiled for.
    pub fn bind(&mut self, shader: &Shader) {
        assert!(
            self.size() <= shader.lanes_max(),
            "grid of {} lanes exceeds the shader's {} lane capacity",
            self.size(),
            shader.lanes_max()
        );
        self.symbols = shader
            .symbols()
            .iter()
            .filter(|s| s.segment() == Segment::Grid || s.segment() == Segment::String)
            .cloned()
            .collect();
        self.memory = vec![0; shader.grid_memory_size() as usize];
        let string_count = self.symbols.iter().filter(|s| s.segment() == Segment::String).count();
        self.strings = vec![String::new(); string_count];
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// The number of lanes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.width * self.height
    }

    #[must_use]
    pub fn du(&self) -> f32 {
        self.du
    }

    #[must_use]
    pub fn dv(&self) -> f32 {
        self.dv
    }

    pub fn set_du(&mut self, du: f32) {
        self.du = du;
    }

    pub fn set_dv(&mut self, dv: f32) {
        self.dv = dv;
    }

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    #[must_use]
    pub fn find_symbol(&self, identifier: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.identifier() == identifier)
    }

    /// The base that `GRID` segment offsets are relative to: the offset of
    /// the first visible grid symbol.
    #[must_use]
    pub fn base_offset(&self) -> u32 {
        self.symbols
            .iter()
            .find(|s| s.segment() == Segment::Grid)
            .map_or(0, Symbol::offset)
    }

    pub(crate) fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub(crate) fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn value_range(&self, identifier: &str) -> Option<(usize, usize, ValueType)> {
        let symbol = self.find_symbol(identifier)?;
        if symbol.segment() != Segment::Grid {
            return None;
        }
        let elements = if symbol.storage() == ValueStorage::Varying {
            self.size()
        } else {
            1
        };
        let start = (symbol.offset() - self.base_offset()) as usize;
        Some((start, elements, symbol.ty()))
    }

    /// Reads the float elements of a grid value: one per lane for varying
    /// symbols, a single element otherwise.
    #[must_use]
    pub fn float_values(&self, identifier: &str) -> Option<Vec<f32>> {
        let (start, elements, ty) = self.value_range(identifier)?;
        if ty != ValueType::Float {
            return None;
        }
        Some(
            (0..elements)
                .map(|i| {
                    let at = start + i * 4;
                    f32::from_le_bytes(self.memory[at..at + 4].try_into().expect("four bytes"))
                })
                .collect(),
        )
    }

    /// Reads the integer elements of a grid value.
    #[must_use]
    pub fn int_values(&self, identifier: &str) -> Option<Vec<i32>> {
        let (start, elements, ty) = self.value_range(identifier)?;
        if ty != ValueType::Integer {
            return None;
        }
        Some(
            (0..elements)
                .map(|i| {
                    let at = start + i * 4;
                    i32::from_le_bytes(self.memory[at..at + 4].try_into().expect("four bytes"))
                })
                .collect(),
        )
    }

    /// Reads the three-float elements of a grid value.
    #[must_use]
    pub fn vec3_values(&self, identifier: &str) -> Option<Vec<Vec3>> {
        let (start, elements, ty) = self.value_range(identifier)?;
        if !ty.is_vec3() {
            return None;
        }
        Some(
            (0..elements)
                .map(|i| {
                    let at = start + i * 12;
                    let component = |j: usize| {
                        f32::from_le_bytes(self.memory[at + j * 4..at + j * 4 + 4].try_into().expect("four bytes"))
                    };
                    Vec3::new(component(0), component(1), component(2))
                })
                .collect(),
        )
    }

    /// Writes the float elements of a grid value. A single value broadcasts
    /// across all elements; otherwise `values` must supply one per element.
    pub fn set_float(&mut self, identifier: &str, values: &[f32]) {
        let Some((start, elements, ty)) = self.value_range(identifier) else {
            return;
        };
        if ty != ValueType::Float {
            return;
        }
        for i in 0..elements {
            let value = if values.len() == 1 { values[0] } else { values[i] };
            let at = start + i * 4;
            self.memory[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Writes the three-float elements of a grid value, broadcasting a
    /// single value across all elements.
    pub fn set_vec3(&mut self, identifier: &str, values: &[Vec3]) {
        let Some((start, elements, ty)) = self.value_range(identifier) else {
            return;
        };
        if !ty.is_vec3() {
            return;
        }
        for i in 0..elements {
            let value = if values.len() == 1 { values[0] } else { values[i] };
            let at = start + i * 12;
            for (j, component) in value.to_array().iter().enumerate() {
                self.memory[at + j * 4..at + j * 4 + 4].copy_from_slice(&component.to_le_bytes());
            }
        }
    }

    /// Writes a string symbol's value through its string table index.
    pub fn set_string_value(&mut self, identifier: &str, value: &str) {
        let Some(symbol) = self.find_symbol(identifier) else { return };
        if symbol.segment() != Segment::String {
            return;
        }
        let index = symbol.offset() as usize;
        self.set_string(index, value.to_owned());
    }

    /// The text at a string table index, or empty for an unset slot.
    #[must_use]
    pub fn string(&self, index: usize) -> &str {
        self.strings.get(index).map_or("", String::as_str)
    }

    /// Stores text at a string table index, growing the table when the
    /// index is past its current length.
    pub fn set_string(&mut self, index: usize, value: String) {
        if index >= self.strings.len() {
            self.strings.resize(index + 1, String::new());
        }
        self.strings[index] = value;
    }

    // --- lights ---

    #[must_use]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn clear_lights(&mut self) {
        self.lights.clear();
    }

    // --- transforms ---

    /// The object-to-camera transform this grid was diced under.
    #[must_use]
    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Registers a named coordinate system as its camera-to-space matrix.
    pub fn add_coordinate_system(&mut self, name: &str, transform: Mat4) {
        self.coordinate_systems.insert(name.to_owned(), transform);
    }

    /// The camera-to-space matrix for a named coordinate system. `camera`
    /// and `current` are identity, as is any unknown name.
    #[must_use]
    pub fn coordinate_transform(&self, name: &str) -> Mat4 {
        self.coordinate_systems.get(name).copied().unwrap_or(Mat4::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SilentErrorPolicy;

    use super::*;

    fn surface_shader() -> Shader {
        let mut errors = SilentErrorPolicy::default();
        Shader::load("surface s() { Ci = Cs; Oi = Os; }", "s.sl", &mut errors).expect("shader compiles")
    }

    #[test]
    fn bind_sizes_memory_and_filters_symbols() {
        let shader = surface_shader();
        let mut grid = Grid::new(4, 4);
        grid.bind(&shader);
        assert_eq!(grid.memory().len(), shader.grid_memory_size() as usize);
        assert!(grid.find_symbol("Ci").is_some());
        assert!(grid.find_symbol("sin").is_none());
    }

    #[test]
    fn float_round_trip_broadcasts_single_values() {
        let shader = surface_shader();
        let mut grid = Grid::new(2, 2);
        grid.bind(&shader);
        grid.set_float("s", &[0.25]);
        assert_eq!(grid.float_values("s").unwrap(), vec![0.25; 4]);
        grid.set_float("s", &[0.0, 0.1, 0.2, 0.3]);
        assert_eq!(grid.float_values("s").unwrap()[3], 0.3);
    }

    #[test]
    fn vec3_round_trip() {
        let shader = surface_shader();
        let mut grid = Grid::new(2, 2);
        grid.bind(&shader);
        grid.set_vec3("Cs", &[Vec3::new(1.0, 0.5, 0.25)]);
        let values = grid.vec3_values("Cs").unwrap();
        assert_eq!(values.len(), 4);
        assert_eq!(values[2], Vec3::new(1.0, 0.5, 0.25));
    }

    #[test]
    fn string_table_grows_on_write() {
        let mut grid = Grid::new(1, 1);
        grid.set_string(2, "shadowmap".to_owned());
        assert_eq!(grid.string(2), "shadowmap");
        assert_eq!(grid.string(0), "");
        assert_eq!(grid.string(9), "");
    }

    #[test]
    fn unknown_coordinate_system_is_identity() {
        let mut grid = Grid::new(1, 1);
        assert_eq!(grid.coordinate_transform("nonesuch"), Mat4::IDENTITY);
        let world = Mat4::translation(Vec3::new(0.0, 0.0, 5.0));
        grid.add_coordinate_system("world", world);
        assert_eq!(grid.coordinate_transform("world"), world);
    }
}
