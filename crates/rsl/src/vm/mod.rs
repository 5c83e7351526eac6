//! The byte-code virtual machine.
//!
//! Decodes one instruction word at a time, dispatches on the opcode and its
//! per-operand `(type, storage)` tags, and executes SIMD-style across the
//! grid's lanes. Varying operands iterate `[0, width * height)`; uniform
//! and constant operands broadcast their single element. A stack of
//! per-lane masks guards every lane-parallel write; reads are
//! unconditional.
//!
//! Invalid opcodes, out-of-range addresses, and tag combinations the
//! compiler cannot emit are programming errors and abort.

mod arithmetic;
mod lighting;
mod transform;

use lighting::PendingLight;

use crate::{
    address::{Address, Segment},
    builtins,
    context::ShadingContext,
    error::ErrorCode,
    grid::Grid,
    instruction::{Opcode, tag_is_varying},
    shader::Shader,
};

/// Which of a shader's two entry points to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// The parameter initializers.
    Initialize,
    /// The shader body.
    Shade,
}

/// Runs one entry point of `shader` over `grid`.
pub fn execute(shader: &Shader, entry: EntryPoint, grid: &mut Grid, context: &mut ShadingContext<'_>) {
    let address = match entry {
        EntryPoint::Initialize => shader.initialize_address(),
        EntryPoint::Shade => shader.shade_address(),
    };
    let mut machine = VirtualMachine::new(shader, grid, context);
    machine.run(address);
}

pub(crate) struct VirtualMachine<'a, 'c> {
    shader: &'a Shader,
    pub(crate) grid: &'a mut Grid,
    pub(crate) context: &'a mut ShadingContext<'c>,
    temporary: Vec<u8>,
    masks: Vec<Vec<bool>>,
    light_cursor: usize,
    current_light: Option<usize>,
    pending_light: Option<PendingLight>,
    pc: usize,
}

impl<'a, 'c> VirtualMachine<'a, 'c> {
    fn new(shader: &'a Shader, grid: &'a mut Grid, context: &'a mut ShadingContext<'c>) -> Self {
        Self {
            shader,
            grid,
            context,
            temporary: vec![0; shader.temporary_memory_size() as usize],
            masks: Vec::new(),
            light_cursor: 0,
            current_light: None,
            pending_light: None,
            pc: 0,
        }
    }

    fn run(&mut self, start: usize) {
        self.pc = start;
        loop {
            let word = self.fetch_word();
            let opcode = Opcode::from_repr((word & 0xff) as u8).expect("invalid opcode");
            let t0 = (word >> 8) as u8;
            let t1 = (word >> 16) as u8;
            let t2 = (word >> 24) as u8;

            match opcode {
                Opcode::Null => {}
                Opcode::Halt => {
                    self.finalize_pending_light();
                    break;
                }
                Opcode::Reset => {
                    let cursor = self.fetch_int();
                    self.light_cursor = usize::try_from(cursor.max(0)).expect("light cursor fits usize");
                    self.current_light = None;
                }
                Opcode::Jump => {
                    let distance = self.fetch_int();
                    self.jump(distance);
                }
                Opcode::JumpEmpty => {
                    let distance = self.fetch_int();
                    if !self.any_active() {
                        self.jump(distance);
                    }
                }
                Opcode::JumpNotEmpty => {
                    let distance = self.fetch_int();
                    if self.any_active() {
                        self.jump(distance);
                    }
                }
                Opcode::JumpIlluminance => {
                    let distance = self.fetch_int();
                    self.jump_illuminance(distance);
                }
                Opcode::ClearMask => {
                    self.masks.pop();
                }
                Opcode::GenerateMask => self.generate_mask(t0),
                Opcode::InvertMask => self.invert_mask(),
                Opcode::TransformPoint
                | Opcode::TransformVector
                | Opcode::TransformNormal
                | Opcode::TransformColor
                | Opcode::TransformMatrix => self.transform(opcode, t0),
                Opcode::Dot => self.dot(t0, t1),
                Opcode::Multiply => self.multiply(t0, t1),
                Opcode::Divide => self.divide(t0, t1),
                Opcode::Add => self.add(t0, t1),
                Opcode::Subtract => self.subtract(t0, t1),
                Opcode::Negate => self.negate(t0),
                Opcode::Greater => self.compare(t0, t1, |a, b| a > b),
                Opcode::GreaterEqual => self.compare(t0, t1, |a, b| a >= b),
                Opcode::Less => self.compare(t0, t1, |a, b| a < b),
                Opcode::LessEqual => self.compare(t0, t1, |a, b| a <= b),
                Opcode::Equal => self.equality(t0, t1, false),
                Opcode::NotEqual => self.equality(t0, t1, true),
                Opcode::And => self.logical(t0, t1, |a, b| a && b),
                Opcode::Or => self.logical(t0, t1, |a, b| a || b),
                Opcode::Convert => self.convert(t0),
                Opcode::Promote => self.promote(t0),
                Opcode::Assign => self.assign(t0, t1, None),
                Opcode::AddAssign => self.assign(t0, t1, Some(|a, b| a + b)),
                Opcode::SubtractAssign => self.assign(t0, t1, Some(|a, b| a - b)),
                Opcode::MultiplyAssign => self.assign(t0, t1, Some(|a, b| a * b)),
                Opcode::DivideAssign => self.assign(t0, t1, Some(|a, b| a / b)),
                Opcode::StringAssign => self.string_assign(),
                Opcode::FloatTexture => self.float_texture(t0, t1, t2),
                Opcode::Vec3Texture => self.vec3_texture(t0, t1, t2),
                Opcode::FloatEnvironment => self.float_environment(t0, t1),
                Opcode::Vec3Environment => self.vec3_environment(t0, t1),
                Opcode::Shadow => self.shadow(t0, t1, t2),
                Opcode::Call => self.call(),
                Opcode::Ambient => self.ambient(),
                Opcode::Solar => self.solar(),
                Opcode::SolarAxisAngle => self.solar_axis_angle(),
                Opcode::Illuminate => self.illuminate(false),
                Opcode::IlluminateAxisAngle => self.illuminate(true),
                Opcode::IlluminanceAxisAngle => self.illuminance_axis_angle(t0, t1, t2),
            }
        }
    }

    // --- decode ---

    fn fetch_word(&mut self) -> u32 {
        let code = self.shader.code();
        let word = u32::from_le_bytes(code[self.pc..self.pc + 4].try_into().expect("four code bytes"));
        self.pc += 4;
        word
    }

    fn fetch_int(&mut self) -> i32 {
        self.fetch_word().cast_signed()
    }

    fn fetch_address(&mut self) -> Address {
        Address::from_word(self.fetch_word())
    }

    /// Applies a relative jump distance, anchored just past the distance
    /// argument.
    fn jump(&mut self, distance: i32) {
        let target = i64::try_from(self.pc).expect("program counter fits i64") + i64::from(distance);
        self.pc = usize::try_from(target).expect("jump target is in range");
    }

    // --- lanes and masks ---

    /// The number of lanes in the hosting grid.
    pub(crate) fn lanes(&self) -> usize {
        self.grid.size()
    }

    /// Whether `lane` is active under the current mask.
    pub(crate) fn active(&self, lane: usize) -> bool {
        self.masks.last().is_none_or(|mask| mask[lane])
    }

    fn any_active(&self) -> bool {
        self.masks.last().is_none_or(|mask| mask.iter().any(|&active| active))
    }

    /// Pushes a mask that is active where the integer operand is nonzero,
    /// intersected with the previously active mask.
    fn generate_mask(&mut self, t0: u8) {
        let operand = self.fetch_address();
        let varying = tag_is_varying(t0);
        let mask: Vec<bool> = (0..self.lanes())
            .map(|lane| self.active(lane) && self.load_i32(operand, if varying { lane } else { 0 }) != 0)
            .collect();
        self.masks.push(mask);
    }

    /// Flips the top mask relative to its parent.
    fn invert_mask(&mut self) {
        let depth = self.masks.len();
        debug_assert!(depth > 0, "invert with no mask pushed");
        for lane in 0..self.lanes() {
            let parent = if depth >= 2 { self.masks[depth - 2][lane] } else { true };
            let top = &mut self.masks[depth - 1][lane];
            *top = parent && !*top;
        }
    }

    // --- memory ---

    fn read_bytes(&self, address: Address, byte_offset: usize, length: usize) -> &[u8] {
        let start = address.offset() as usize + byte_offset;
        match address.segment() {
            Segment::Constant => &self.shader.constants()[start..start + length],
            Segment::Grid => {
                let base = self.grid.base_offset() as usize;
                &self.grid.memory()[start - base..start - base + length]
            }
            Segment::Temporary => &self.temporary[start..start + length],
            Segment::String | Segment::Null => panic!("invalid segment read"),
        }
    }

    fn write_bytes(&mut self, address: Address, byte_offset: usize, bytes: &[u8]) {
        let start = address.offset() as usize + byte_offset;
        match address.segment() {
            Segment::Grid => {
                let base = self.grid.base_offset() as usize;
                self.grid.memory_mut()[start - base..start - base + bytes.len()].copy_from_slice(bytes);
            }
            Segment::Temporary => self.temporary[start..start + bytes.len()].copy_from_slice(bytes),
            Segment::Constant | Segment::String | Segment::Null => panic!("invalid segment write"),
        }
    }

    /// Reads the float at `element` (in four-byte units) past `address`.
    pub(crate) fn load_f32(&self, address: Address, element: usize) -> f32 {
        f32::from_le_bytes(self.read_bytes(address, element * 4, 4).try_into().expect("four bytes"))
    }

    pub(crate) fn store_f32(&mut self, address: Address, element: usize, value: f32) {
        self.write_bytes(address, element * 4, &value.to_le_bytes());
    }

    pub(crate) fn load_i32(&self, address: Address, element: usize) -> i32 {
        i32::from_le_bytes(self.read_bytes(address, element * 4, 4).try_into().expect("four bytes"))
    }

    pub(crate) fn store_i32(&mut self, address: Address, element: usize, value: i32) {
        self.write_bytes(address, element * 4, &value.to_le_bytes());
    }

    /// Reads the three-float element at `element` (in twelve-byte units).
    pub(crate) fn load_vec3(&self, address: Address, element: usize) -> crate::math3d::Vec3 {
        let base = element * 3;
        crate::math3d::Vec3::new(
            self.load_f32(address, base),
            self.load_f32(address, base + 1),
            self.load_f32(address, base + 2),
        )
    }

    pub(crate) fn store_vec3(&mut self, address: Address, element: usize, value: crate::math3d::Vec3) {
        let base = element * 3;
        self.store_f32(address, base, value.x);
        self.store_f32(address, base + 1, value.y);
        self.store_f32(address, base + 2, value.z);
    }

    /// Reads the sixteen-float element at `element` (in 64-byte units).
    pub(crate) fn load_mat4(&self, address: Address, element: usize) -> crate::math3d::Mat4 {
        let base = element * 16;
        let mut values = [0.0f32; 16];
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.load_f32(address, base + i);
        }
        crate::math3d::Mat4(values)
    }

    pub(crate) fn store_mat4(&mut self, address: Address, element: usize, value: crate::math3d::Mat4) {
        let base = element * 16;
        for (i, component) in value.0.iter().enumerate() {
            self.store_f32(address, base + i, *component);
        }
    }

    /// Resolves a string operand: the text of a constant literal, or the
    /// string table entry a `STRING` segment address names.
    pub(crate) fn string_value(&self, address: Address) -> String {
        match address.segment() {
            Segment::Constant => {
                let constants = self.shader.constants();
                let start = address.offset() as usize;
                let end = constants[start..].iter().position(|&b| b == 0).map_or(constants.len(), |p| start + p);
                String::from_utf8_lossy(&constants[start..end]).into_owned()
            }
            Segment::String => self.grid.string(address.offset() as usize).to_owned(),
            _ => String::new(),
        }
    }

    /// Reports a host-side failure; execution continues with defaults.
    pub(crate) fn report(&mut self, code: ErrorCode, message: &str) {
        self.context.errors.error(code, message);
    }

    // --- conversion, promotion, assignment ---

    /// Broadcasts a float to a wider type of the same storage: every
    /// component for the three-float types, the diagonal for matrices.
    fn convert(&mut self, t0: u8) {
        let result = self.fetch_address();
        let source = self.fetch_address();
        let varying = tag_is_varying(t0);
        let count = if varying { self.lanes() } else { 1 };
        let components = crate::instruction::tag_components(t0);
        for lane in 0..count {
            if varying && !self.active(lane) {
                continue;
            }
            let value = self.load_f32(source, if varying { lane } else { 0 });
            match components {
                3 => self.store_vec3(result, lane, crate::math3d::Vec3::splat(value)),
                16 => {
                    let mut matrix = crate::math3d::Mat4([0.0; 16]);
                    for i in 0..4 {
                        matrix.set(i, i, value);
                    }
                    self.store_mat4(result, lane, matrix);
                }
                _ => self.store_f32(result, lane, value),
            }
        }
    }

    /// Copies a uniform value across all lanes to produce a varying value
    /// of the same type.
    fn promote(&mut self, t0: u8) {
        let result = self.fetch_address();
        let source = self.fetch_address();
        let components = crate::instruction::tag_components(t0);
        for lane in 0..self.lanes() {
            if !self.active(lane) {
                continue;
            }
            for component in 0..components {
                let value = self.load_f32(source, component);
                self.store_f32(result, lane * components + component, value);
            }
        }
    }

    /// `ASSIGN` and its compound forms; lane writes only where the mask is
    /// active. `op` folds the destination with the source for the compound
    /// forms.
    fn assign(&mut self, t0: u8, t1: u8, op: Option<fn(f32, f32) -> f32>) {
        let destination = self.fetch_address();
        let source = self.fetch_address();
        let destination_varying = tag_is_varying(t0);
        let source_varying = tag_is_varying(t1);
        let components = crate::instruction::tag_components(t0);
        let count = if destination_varying { self.lanes() } else { 1 };
        for lane in 0..count {
            if destination_varying && !self.active(lane) {
                continue;
            }
            let source_lane = if source_varying { lane } else { 0 };
            for component in 0..components {
                let value = self.load_f32(source, source_lane * components + component);
                let value = match op {
                    Some(op) => op(self.load_f32(destination, lane * components + component), value),
                    None => value,
                };
                self.store_f32(destination, lane * components + component, value);
            }
        }
    }

    /// Copies the string value into the destination's string table slot.
    fn string_assign(&mut self) {
        let destination = self.fetch_address();
        let source = self.fetch_address();
        let text = self.string_value(source);
        if destination.segment() == Segment::String {
            self.grid.set_string(destination.offset() as usize, text);
        }
    }

    // --- calls ---

    /// `CALL symbol_index, argc, result, args…`: resolves the built-in
    /// through the shader's symbol table and invokes it. The result
    /// address is the first entry of the argument list.
    fn call(&mut self) {
        let shader = self.shader;
        let index = usize::try_from(self.fetch_int()).expect("symbol index is non-negative");
        let argc = usize::try_from(self.fetch_int()).expect("argument count is non-negative");
        let mut addresses = Vec::with_capacity(argc + 1);
        addresses.push(self.fetch_address());
        for _ in 0..argc {
            addresses.push(self.fetch_address());
        }

        let symbol = shader.symbol(index);
        let builtin = symbol.function().expect("call target is a function");
        builtins::call(self, builtin, symbol.storage(), symbol.parameters(), &addresses);
    }
}
