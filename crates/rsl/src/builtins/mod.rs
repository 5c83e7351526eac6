//! The RSL standard library: built-in function identities, their symbol
//! table registration, and dispatch from the virtual machine's `CALL`
//! instruction.
//!
//! Each built-in is identified by a [`Builtin`] capability value stored on
//! its function symbol; the VM matches on it rather than on a function
//! pointer. Implementations live in the per-family modules.

pub(crate) mod color;
mod geometry;
mod lighting;
mod math;
mod matrix;

use std::f32::consts::PI;

use strum::Display;

use crate::{
    address::Address,
    symbol::SymbolParameter,
    symbol_table::{SymbolBuilder, SymbolTable},
    value::{ValueStorage, ValueType},
    vm::VirtualMachine,
};

/// Identity of a built-in function.
///
/// Overloads that differ only in storage share a value (the registered
/// signature supplies the strides); overloads that differ in element shape
/// (float against vec3) are distinct values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Builtin {
    // mathematical
    Radians,
    Degrees,
    Sin,
    Asin,
    Cos,
    Acos,
    Tan,
    Atan,
    Atan2,
    Pow,
    Exp,
    Sqrt,
    InverseSqrt,
    Log,
    Logb,
    Mod,
    Abs,
    Sign,
    MixFloat,
    MixVec3,
    Floor,
    Ceil,
    Round,
    Step,
    Smoothstep,
    DuFloat,
    DuVec3,
    DvFloat,
    DvVec3,
    DerivFloat,
    DerivVec3,
    UniformFloatRandom,
    UniformVec3Random,
    FloatRandom,
    Vec3Random,
    // geometric
    XComp,
    YComp,
    ZComp,
    SetXComp,
    SetYComp,
    SetZComp,
    Length,
    Normalize,
    Distance,
    Rotate,
    Area,
    FaceForward,
    FaceForwardEx,
    Reflect,
    Refract,
    Fresnel,
    Transform,
    TransformFrom,
    TransformMatrix,
    TransformFromMatrix,
    VectorTransform,
    VectorTransformFrom,
    VectorTransformMatrix,
    VectorTransformFromMatrix,
    NormalTransform,
    NormalTransformFrom,
    NormalTransformMatrix,
    NormalTransformFromMatrix,
    Depth,
    CalculateNormal,
    // color
    Comp,
    SetComp,
    ColorTransform,
    // matrix
    CompMatrix,
    SetCompMatrix,
    Determinant,
    TranslateMatrix,
    RotateMatrix,
    ScaleMatrix,
    // shading and lighting
    Ambient,
    Diffuse,
    Specular,
    SpecularBrdf,
    Phong,
    Trace,
}

/// Invokes a built-in.
///
/// `args[0]` is the result address; the remaining entries follow the
/// registered parameter list, whose types and storages the compiler has
/// already converted and promoted the arguments to.
pub(crate) fn call(
    vm: &mut VirtualMachine<'_, '_>,
    builtin: Builtin,
    return_storage: ValueStorage,
    parameters: &[SymbolParameter],
    args: &[Address],
) {
    let result = args[0];
    let arguments = &args[1..];
    match builtin {
        Builtin::Radians => math::unary_float(vm, return_storage, result, arguments[0], f32::to_radians),
        Builtin::Degrees => math::unary_float(vm, return_storage, result, arguments[0], f32::to_degrees),
        Builtin::Sin => math::unary_float(vm, return_storage, result, arguments[0], f32::sin),
        Builtin::Asin => math::unary_float(vm, return_storage, result, arguments[0], f32::asin),
        Builtin::Cos => math::unary_float(vm, return_storage, result, arguments[0], f32::cos),
        Builtin::Acos => math::unary_float(vm, return_storage, result, arguments[0], f32::acos),
        Builtin::Tan => math::unary_float(vm, return_storage, result, arguments[0], f32::tan),
        Builtin::Atan => math::unary_float(vm, return_storage, result, arguments[0], f32::atan),
        Builtin::Atan2 => math::binary_float(vm, return_storage, result, arguments, parameters, f32::atan2),
        Builtin::Pow => math::binary_float(vm, return_storage, result, arguments, parameters, f32::powf),
        Builtin::Exp => math::unary_float(vm, return_storage, result, arguments[0], f32::exp),
        Builtin::Sqrt => math::unary_float(vm, return_storage, result, arguments[0], f32::sqrt),
        Builtin::InverseSqrt => math::unary_float(vm, return_storage, result, arguments[0], |x| 1.0 / x.sqrt()),
        Builtin::Log => math::unary_float(vm, return_storage, result, arguments[0], f32::ln),
        Builtin::Logb => math::binary_float(vm, return_storage, result, arguments, parameters, f32::log),
        Builtin::Mod => math::binary_float(vm, return_storage, result, arguments, parameters, |a, b| {
            a - (a / b).floor() * b
        }),
        Builtin::Abs => math::unary_float(vm, return_storage, result, arguments[0], f32::abs),
        Builtin::Sign => math::unary_float(vm, return_storage, result, arguments[0], f32::signum),
        Builtin::MixFloat => math::mix_float(vm, return_storage, result, arguments, parameters),
        Builtin::MixVec3 => math::mix_vec3(vm, return_storage, result, arguments, parameters),
        Builtin::Floor => math::unary_float(vm, return_storage, result, arguments[0], f32::floor),
        Builtin::Ceil => math::unary_float(vm, return_storage, result, arguments[0], f32::ceil),
        Builtin::Round => math::unary_float(vm, return_storage, result, arguments[0], f32::round),
        Builtin::Step => math::binary_float(vm, return_storage, result, arguments, parameters, |edge, x| {
            if x < edge { 0.0 } else { 1.0 }
        }),
        Builtin::Smoothstep => math::smoothstep(vm, return_storage, result, arguments, parameters),
        Builtin::DuFloat => math::du_float(vm, result, arguments[0]),
        Builtin::DuVec3 => math::du_vec3(vm, result, arguments[0]),
        Builtin::DvFloat => math::dv_float(vm, result, arguments[0]),
        Builtin::DvVec3 => math::dv_vec3(vm, result, arguments[0]),
        Builtin::DerivFloat => math::deriv_float(vm, result, arguments[0], arguments[1]),
        Builtin::DerivVec3 => math::deriv_vec3(vm, result, arguments[0], arguments[1]),
        Builtin::UniformFloatRandom => math::uniform_float_random(vm, result),
        Builtin::UniformVec3Random => math::uniform_vec3_random(vm, result),
        Builtin::FloatRandom => math::float_random(vm, result),
        Builtin::Vec3Random => math::vec3_random(vm, result),
        Builtin::XComp => geometry::component(vm, return_storage, result, arguments[0], 0),
        Builtin::YComp => geometry::component(vm, return_storage, result, arguments[0], 1),
        Builtin::ZComp => geometry::component(vm, return_storage, result, arguments[0], 2),
        Builtin::SetXComp => geometry::set_component(vm, arguments, parameters, 0),
        Builtin::SetYComp => geometry::set_component(vm, arguments, parameters, 1),
        Builtin::SetZComp => geometry::set_component(vm, arguments, parameters, 2),
        Builtin::Length => geometry::length(vm, return_storage, result, arguments[0]),
        Builtin::Normalize => geometry::normalize(vm, return_storage, result, arguments[0]),
        Builtin::Distance => geometry::distance(vm, return_storage, result, arguments),
        Builtin::Rotate => geometry::rotate(vm, return_storage, result, arguments, parameters),
        Builtin::Area => geometry::area(vm, result, arguments[0]),
        Builtin::FaceForward => geometry::faceforward(vm, return_storage, result, arguments[0], arguments[1], None),
        Builtin::FaceForwardEx => {
            geometry::faceforward(vm, return_storage, result, arguments[0], arguments[1], Some(arguments[2]));
        }
        Builtin::Reflect => geometry::reflect(vm, return_storage, result, arguments),
        Builtin::Refract => geometry::refract(vm, return_storage, result, arguments, parameters),
        Builtin::Fresnel => geometry::fresnel(vm, arguments, parameters),
        Builtin::Transform
        | Builtin::TransformFrom
        | Builtin::TransformMatrix
        | Builtin::TransformFromMatrix
        | Builtin::VectorTransform
        | Builtin::VectorTransformFrom
        | Builtin::VectorTransformMatrix
        | Builtin::VectorTransformFromMatrix
        | Builtin::NormalTransform
        | Builtin::NormalTransformFrom
        | Builtin::NormalTransformMatrix
        | Builtin::NormalTransformFromMatrix => {
            geometry::transform(vm, builtin, return_storage, result, arguments);
        }
        Builtin::Depth => geometry::depth(vm, return_storage, result, arguments[0]),
        Builtin::CalculateNormal => geometry::calculatenormal(vm, result, arguments[0]),
        Builtin::Comp => color::comp(vm, return_storage, result, arguments),
        Builtin::SetComp => color::setcomp(vm, arguments, parameters),
        Builtin::ColorTransform => color::ctransform(vm, return_storage, result, arguments),
        Builtin::CompMatrix => matrix::comp(vm, result, arguments),
        Builtin::SetCompMatrix => matrix::setcomp(vm, arguments),
        Builtin::Determinant => matrix::determinant(vm, result, arguments[0]),
        Builtin::TranslateMatrix => matrix::translate(vm, result, arguments),
        Builtin::RotateMatrix => matrix::rotate(vm, result, arguments),
        Builtin::ScaleMatrix => matrix::scale(vm, result, arguments),
        Builtin::Ambient => lighting::ambient(vm, result),
        Builtin::Diffuse => lighting::diffuse(vm, result, arguments[0]),
        Builtin::Specular => lighting::specular(vm, result, arguments),
        Builtin::SpecularBrdf => lighting::specularbrdf(vm, result, arguments),
        Builtin::Phong => lighting::phong(vm, result, arguments),
        Builtin::Trace => lighting::trace(vm, result),
    }
}

impl SymbolBuilder<'_> {
    /// The grid variables a surface shader sees.
    #[must_use]
    pub fn surface_symbols(self) -> Self {
        self.variable("P", ValueType::Point, ValueStorage::Varying)
            .variable("N", ValueType::Normal, ValueStorage::Varying)
            .variable("I", ValueType::Vector, ValueStorage::Varying)
            .variable("s", ValueType::Float, ValueStorage::Varying)
            .variable("t", ValueType::Float, ValueStorage::Varying)
            .variable("Ci", ValueType::Color, ValueStorage::Varying)
            .variable("Oi", ValueType::Color, ValueStorage::Varying)
            .variable("Cs", ValueType::Color, ValueStorage::Varying)
            .variable("Os", ValueType::Color, ValueStorage::Varying)
    }

    /// The grid variables a light shader sees.
    #[must_use]
    pub fn light_symbols(self) -> Self {
        self.variable("Ps", ValueType::Point, ValueStorage::Varying)
            .variable("N", ValueType::Normal, ValueStorage::Varying)
            .variable("Cl", ValueType::Color, ValueStorage::Varying)
            .variable("Ol", ValueType::Color, ValueStorage::Varying)
    }

    /// The grid variables a volume shader sees.
    #[must_use]
    pub fn volume_symbols(self) -> Self {
        self.variable("P", ValueType::Point, ValueStorage::Varying)
            .variable("I", ValueType::Vector, ValueStorage::Varying)
            .variable("Ci", ValueType::Color, ValueStorage::Varying)
            .variable("Oi", ValueType::Color, ValueStorage::Varying)
    }

    /// The grid variables a displacement shader sees.
    #[must_use]
    pub fn displacement_symbols(self) -> Self {
        self.variable("P", ValueType::Point, ValueStorage::Varying)
            .variable("N", ValueType::Normal, ValueStorage::Varying)
            .variable("I", ValueType::Vector, ValueStorage::Varying)
            .variable("s", ValueType::Float, ValueStorage::Varying)
            .variable("t", ValueType::Float, ValueStorage::Varying)
    }

    /// The grid variables an imager shader sees.
    #[must_use]
    pub fn imager_symbols(self) -> Self {
        self.variable("P", ValueType::Point, ValueStorage::Varying)
            .variable("Ci", ValueType::Color, ValueStorage::Varying)
            .variable("Oi", ValueType::Color, ValueStorage::Varying)
            .variable("alpha", ValueType::Float, ValueStorage::Varying)
    }

    /// The per-light variables visible inside an `illuminance` body.
    #[must_use]
    pub fn illuminance_symbols(self) -> Self {
        self.variable("L", ValueType::Vector, ValueStorage::Varying)
            .variable("Cl", ValueType::Color, ValueStorage::Varying)
            .variable("Ol", ValueType::Color, ValueStorage::Varying)
    }

    /// The extra variable visible inside `solar` and `illuminate` bodies.
    #[must_use]
    pub fn lighting_symbols(self) -> Self {
        self.variable("L", ValueType::Vector, ValueStorage::Varying)
    }
}

/// Populates the root scope with the RSL standard library.
///
/// Functions that operate equally on uniform and varying data are
/// registered twice so that the matched overload reports the storage of its
/// result; derivative and lighting functions only exist in varying form.
pub(crate) fn register_default_symbols(table: &mut SymbolTable) {
    use Builtin as B;
    use ValueStorage::{Uniform, Varying};
    use ValueType::{Color, Float, Matrix, Normal, Null, Point, String, Vector};

    let _ = table.add_symbols().constant("PI", PI);

    let _ = table
        .add_symbols()
        .function("radians", B::Radians, Float, Uniform)
        .parameter(Float, Uniform)
        .function("radians", B::Radians, Float, Varying)
        .parameter(Float, Varying)
        .function("degrees", B::Degrees, Float, Uniform)
        .parameter(Float, Uniform)
        .function("degrees", B::Degrees, Float, Varying)
        .parameter(Float, Varying);

    let _ = table
        .add_symbols()
        .function("sin", B::Sin, Float, Uniform)
        .parameter(Float, Uniform)
        .function("sin", B::Sin, Float, Varying)
        .parameter(Float, Varying)
        .function("asin", B::Asin, Float, Uniform)
        .parameter(Float, Uniform)
        .function("asin", B::Asin, Float, Varying)
        .parameter(Float, Varying)
        .function("cos", B::Cos, Float, Uniform)
        .parameter(Float, Uniform)
        .function("cos", B::Cos, Float, Varying)
        .parameter(Float, Varying)
        .function("acos", B::Acos, Float, Uniform)
        .parameter(Float, Uniform)
        .function("acos", B::Acos, Float, Varying)
        .parameter(Float, Varying)
        .function("tan", B::Tan, Float, Uniform)
        .parameter(Float, Uniform)
        .function("tan", B::Tan, Float, Varying)
        .parameter(Float, Varying)
        .function("atan", B::Atan, Float, Uniform)
        .parameter(Float, Uniform)
        .function("atan", B::Atan, Float, Varying)
        .parameter(Float, Varying)
        .function("atan", B::Atan2, Float, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .function("atan", B::Atan2, Float, Varying)
        .parameter(Float, Varying)
        .parameter(Float, Varying);

    let _ = table
        .add_symbols()
        .function("pow", B::Pow, Float, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .function("pow", B::Pow, Float, Varying)
        .parameter(Float, Varying)
        .parameter(Float, Varying)
        .function("exp", B::Exp, Float, Uniform)
        .parameter(Float, Uniform)
        .function("exp", B::Exp, Float, Varying)
        .parameter(Float, Varying)
        .function("sqrt", B::Sqrt, Float, Uniform)
        .parameter(Float, Uniform)
        .function("sqrt", B::Sqrt, Float, Varying)
        .parameter(Float, Varying)
        .function("inversesqrt", B::InverseSqrt, Float, Uniform)
        .parameter(Float, Uniform)
        .function("inversesqrt", B::InverseSqrt, Float, Varying)
        .parameter(Float, Varying)
        .function("log", B::Log, Float, Uniform)
        .parameter(Float, Uniform)
        .function("log", B::Log, Float, Varying)
        .parameter(Float, Varying)
        .function("log", B::Logb, Float, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .function("log", B::Logb, Float, Varying)
        .parameter(Float, Varying)
        .parameter(Float, Varying);

    let _ = table
        .add_symbols()
        .function("mod", B::Mod, Float, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .function("mod", B::Mod, Float, Varying)
        .parameter(Float, Varying)
        .parameter(Float, Varying)
        .function("abs", B::Abs, Float, Uniform)
        .parameter(Float, Uniform)
        .function("abs", B::Abs, Float, Varying)
        .parameter(Float, Varying)
        .function("sign", B::Sign, Float, Uniform)
        .parameter(Float, Uniform)
        .function("sign", B::Sign, Float, Varying)
        .parameter(Float, Varying);

    let _ = table
        .add_symbols()
        .function("mix", B::MixFloat, Float, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .function("mix", B::MixFloat, Float, Varying)
        .parameter(Float, Varying)
        .parameter(Float, Varying)
        .parameter(Float, Varying)
        .function("mix", B::MixVec3, Point, Uniform)
        .parameter(Point, Uniform)
        .parameter(Point, Uniform)
        .parameter(Float, Uniform)
        .function("mix", B::MixVec3, Point, Varying)
        .parameter(Point, Varying)
        .parameter(Point, Varying)
        .parameter(Float, Varying);

    let _ = table
        .add_symbols()
        .function("floor", B::Floor, Float, Uniform)
        .parameter(Float, Uniform)
        .function("floor", B::Floor, Float, Varying)
        .parameter(Float, Varying)
        .function("ceil", B::Ceil, Float, Uniform)
        .parameter(Float, Uniform)
        .function("ceil", B::Ceil, Float, Varying)
        .parameter(Float, Varying)
        .function("round", B::Round, Float, Uniform)
        .parameter(Float, Uniform)
        .function("round", B::Round, Float, Varying)
        .parameter(Float, Varying);

    let _ = table
        .add_symbols()
        .function("step", B::Step, Float, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .function("step", B::Step, Float, Varying)
        .parameter(Float, Uniform)
        .parameter(Float, Varying)
        .function("smoothstep", B::Smoothstep, Float, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .function("smoothstep", B::Smoothstep, Float, Varying)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Varying);

    let _ = table
        .add_symbols()
        .function("Du", B::DuFloat, Float, Varying)
        .parameter(Float, Varying)
        .function("Du", B::DuVec3, Color, Varying)
        .parameter(Color, Varying)
        .function("Du", B::DuVec3, Vector, Varying)
        .parameter(Point, Varying)
        .function("Du", B::DuVec3, Vector, Varying)
        .parameter(Vector, Varying)
        .function("Dv", B::DvFloat, Float, Varying)
        .parameter(Float, Varying)
        .function("Dv", B::DvVec3, Color, Varying)
        .parameter(Color, Varying)
        .function("Dv", B::DvVec3, Vector, Varying)
        .parameter(Point, Varying)
        .function("Dv", B::DvVec3, Vector, Varying)
        .parameter(Vector, Varying)
        .function("Deriv", B::DerivFloat, Float, Varying)
        .parameter(Float, Varying)
        .parameter(Float, Varying)
        .function("Deriv", B::DerivVec3, Color, Varying)
        .parameter(Color, Varying)
        .parameter(Float, Varying)
        .function("Deriv", B::DerivVec3, Point, Varying)
        .parameter(Point, Varying)
        .parameter(Float, Varying)
        .function("Deriv", B::DerivVec3, Vector, Varying)
        .parameter(Vector, Varying)
        .parameter(Float, Varying);

    // Varying overloads precede uniform ones; an unqualified declaration
    // resolves to the per-lane generators.
    let _ = table
        .add_symbols()
        .function("random", B::FloatRandom, Float, Varying)
        .function("random", B::Vec3Random, Point, Varying)
        .function("random", B::Vec3Random, Color, Varying)
        .function("random", B::UniformFloatRandom, Float, Uniform)
        .function("random", B::UniformVec3Random, Point, Uniform)
        .function("random", B::UniformVec3Random, Color, Uniform);

    let _ = table
        .add_symbols()
        .function("xcomp", B::XComp, Float, Uniform)
        .parameter(Point, Uniform)
        .function("xcomp", B::XComp, Float, Varying)
        .parameter(Point, Varying)
        .function("ycomp", B::YComp, Float, Uniform)
        .parameter(Point, Uniform)
        .function("ycomp", B::YComp, Float, Varying)
        .parameter(Point, Varying)
        .function("zcomp", B::ZComp, Float, Uniform)
        .parameter(Point, Uniform)
        .function("zcomp", B::ZComp, Float, Varying)
        .parameter(Point, Varying)
        .function("setxcomp", B::SetXComp, Null, Varying)
        .parameter(Point, Uniform)
        .parameter(Float, Uniform)
        .function("setxcomp", B::SetXComp, Null, Varying)
        .parameter(Point, Varying)
        .parameter(Float, Varying)
        .function("setycomp", B::SetYComp, Null, Varying)
        .parameter(Point, Uniform)
        .parameter(Float, Uniform)
        .function("setycomp", B::SetYComp, Null, Varying)
        .parameter(Point, Varying)
        .parameter(Float, Varying)
        .function("setzcomp", B::SetZComp, Null, Varying)
        .parameter(Point, Uniform)
        .parameter(Float, Uniform)
        .function("setzcomp", B::SetZComp, Null, Varying)
        .parameter(Point, Varying)
        .parameter(Float, Varying)
        .function("length", B::Length, Float, Uniform)
        .parameter(Vector, Uniform)
        .function("length", B::Length, Float, Varying)
        .parameter(Vector, Varying)
        .function("normalize", B::Normalize, Vector, Varying)
        .parameter(Vector, Varying)
        .function("distance", B::Distance, Float, Uniform)
        .parameter(Point, Uniform)
        .parameter(Point, Uniform)
        .function("distance", B::Distance, Float, Varying)
        .parameter(Point, Varying)
        .parameter(Point, Varying)
        .function("rotate", B::Rotate, Vector, Uniform)
        .parameter(Point, Uniform)
        .parameter(Float, Uniform)
        .parameter(Point, Uniform)
        .parameter(Point, Uniform)
        .function("rotate", B::Rotate, Vector, Varying)
        .parameter(Point, Varying)
        .parameter(Float, Uniform)
        .parameter(Point, Uniform)
        .parameter(Point, Uniform)
        .function("area", B::Area, Float, Varying)
        .parameter(Point, Varying)
        .function("faceforward", B::FaceForward, Vector, Varying)
        .parameter(Vector, Varying)
        .parameter(Vector, Varying)
        .function("faceforward", B::FaceForwardEx, Vector, Varying)
        .parameter(Vector, Varying)
        .parameter(Vector, Varying)
        .parameter(Vector, Varying)
        .function("reflect", B::Reflect, Vector, Varying)
        .parameter(Vector, Varying)
        .parameter(Vector, Varying)
        .function("refract", B::Refract, Vector, Varying)
        .parameter(Vector, Varying)
        .parameter(Vector, Varying)
        .parameter(Float, Uniform)
        .function("fresnel", B::Fresnel, Null, Varying)
        .parameter(Vector, Varying)
        .parameter(Vector, Varying)
        .parameter(Float, Uniform)
        .parameter(Float, Varying)
        .parameter(Float, Varying)
        .function("transform", B::Transform, Point, Varying)
        .parameter(String, Uniform)
        .parameter(Point, Varying)
        .function("transform", B::TransformFrom, Point, Varying)
        .parameter(String, Uniform)
        .parameter(String, Uniform)
        .parameter(Point, Varying)
        .function("transform", B::TransformMatrix, Point, Varying)
        .parameter(Matrix, Uniform)
        .parameter(Point, Varying)
        .function("transform", B::TransformFromMatrix, Point, Varying)
        .parameter(String, Uniform)
        .parameter(Matrix, Uniform)
        .parameter(Point, Varying)
        .function("vtransform", B::VectorTransform, Point, Varying)
        .parameter(String, Uniform)
        .parameter(Point, Varying)
        .function("vtransform", B::VectorTransformFrom, Point, Varying)
        .parameter(String, Uniform)
        .parameter(String, Uniform)
        .parameter(Point, Varying)
        .function("vtransform", B::VectorTransformMatrix, Point, Varying)
        .parameter(Matrix, Uniform)
        .parameter(Point, Varying)
        .function("vtransform", B::VectorTransformFromMatrix, Point, Varying)
        .parameter(String, Uniform)
        .parameter(Matrix, Uniform)
        .parameter(Point, Varying)
        .function("ntransform", B::NormalTransform, Point, Varying)
        .parameter(String, Uniform)
        .parameter(Point, Varying)
        .function("ntransform", B::NormalTransformFrom, Point, Varying)
        .parameter(String, Uniform)
        .parameter(String, Uniform)
        .parameter(Point, Varying)
        .function("ntransform", B::NormalTransformMatrix, Point, Varying)
        .parameter(Matrix, Uniform)
        .parameter(Point, Varying)
        .function("ntransform", B::NormalTransformFromMatrix, Point, Varying)
        .parameter(String, Uniform)
        .parameter(Matrix, Uniform)
        .parameter(Point, Varying)
        .function("depth", B::Depth, Float, Varying)
        .parameter(Point, Varying)
        .function("calculatenormal", B::CalculateNormal, Point, Varying)
        .parameter(Point, Varying);

    let _ = table
        .add_symbols()
        .function("comp", B::Comp, Float, Varying)
        .parameter(Color, Varying)
        .parameter(Float, Uniform)
        .function("comp", B::Comp, Float, Uniform)
        .parameter(Color, Uniform)
        .parameter(Float, Uniform)
        .function("setcomp", B::SetComp, Null, Varying)
        .parameter(Color, Varying)
        .parameter(Float, Uniform)
        .parameter(Float, Varying)
        .function("setcomp", B::SetComp, Null, Uniform)
        .parameter(Color, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .function("mix", B::MixVec3, Color, Uniform)
        .parameter(Color, Uniform)
        .parameter(Color, Uniform)
        .parameter(Float, Uniform)
        .function("mix", B::MixVec3, Color, Varying)
        .parameter(Color, Varying)
        .parameter(Color, Varying)
        .parameter(Float, Varying)
        .function("ctransform", B::ColorTransform, Color, Varying)
        .parameter(String, Uniform)
        .parameter(Color, Varying)
        .function("ctransform", B::ColorTransform, Color, Uniform)
        .parameter(String, Uniform)
        .parameter(Color, Uniform);

    let _ = table
        .add_symbols()
        .function("comp", B::CompMatrix, Float, Uniform)
        .parameter(Matrix, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .function("setcomp", B::SetCompMatrix, Float, Uniform)
        .parameter(Matrix, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .parameter(Float, Uniform)
        .function("determinant", B::Determinant, Float, Uniform)
        .parameter(Matrix, Uniform)
        .function("translate", B::TranslateMatrix, Matrix, Uniform)
        .parameter(Matrix, Uniform)
        .parameter(Vector, Uniform)
        .function("rotate", B::RotateMatrix, Matrix, Uniform)
        .parameter(Matrix, Uniform)
        .parameter(Float, Uniform)
        .parameter(Vector, Uniform)
        .function("scale", B::ScaleMatrix, Matrix, Uniform)
        .parameter(Matrix, Uniform)
        .parameter(Point, Uniform);

    let _ = table
        .add_symbols()
        .function("ambient", B::Ambient, Color, Varying)
        .function("diffuse", B::Diffuse, Color, Varying)
        .parameter(Normal, Varying)
        .function("specular", B::Specular, Color, Varying)
        .parameter(Normal, Varying)
        .parameter(Vector, Varying)
        .parameter(Float, Uniform)
        .function("specularbrdf", B::SpecularBrdf, Color, Varying)
        .parameter(Vector, Varying)
        .parameter(Vector, Varying)
        .parameter(Vector, Varying)
        .parameter(Float, Uniform)
        .function("phong", B::Phong, Color, Varying)
        .parameter(Normal, Varying)
        .parameter(Vector, Varying)
        .parameter(Float, Uniform)
        .function("trace", B::Trace, Color, Varying)
        .parameter(Point, Varying)
        .parameter(Point, Varying);
}
