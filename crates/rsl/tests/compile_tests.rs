//! Compile-boundary tests: error surfacing, stage summaries, and
//! pre-registered symbols.

use pretty_assertions::assert_eq;
use rsl::{
    CollectingErrorPolicy, EntryPoint, ErrorCode, ErrorPolicy, Grid, NoTextures, Shader, ShadingContext,
    SilentErrorPolicy, SymbolTable, ValueStorage, ValueType, Vec3, execute,
};

fn failure_code(source: &str) -> (ErrorCode, CollectingErrorPolicy) {
    let mut errors = CollectingErrorPolicy::default();
    let result = Shader::load(source, "test.sl", &mut errors);
    (result.expect_err("compilation fails").code, errors)
}

#[test]
fn syntax_errors_surface_parsing_failed() {
    let (code, errors) = failure_code("surface broken( { }");
    assert_eq!(code, ErrorCode::ParsingFailed);
    assert!(errors.contains(ErrorCode::SyntaxError));
}

#[test]
fn unknown_identifier_surfaces_semantic_analysis_failed() {
    let (code, errors) = failure_code("surface broken() { Ci = missing; }");
    assert_eq!(code, ErrorCode::SemanticAnalysisFailed);
    assert!(errors.contains(ErrorCode::SemanticError));
}

#[test]
fn call_with_wrong_argument_types_is_semantic() {
    let (code, errors) = failure_code(r#"surface broken() { Ci = sin("not a number") * Cs; }"#);
    assert_eq!(code, ErrorCode::SemanticAnalysisFailed);
    let message = &errors
        .diagnostics()
        .iter()
        .find(|d| d.code == ErrorCode::SemanticError)
        .expect("a semantic diagnostic")
        .message;
    assert!(message.contains("sin"), "message names the function: {message}");
}

#[test]
fn call_with_wrong_arity_is_semantic() {
    let (code, _errors) = failure_code("surface broken() { Ci = Cs * mix(0.5); }");
    assert_eq!(code, ErrorCode::SemanticAnalysisFailed);
}

#[test]
fn unconditional_illuminance_is_semantic() {
    let (code, errors) = failure_code("surface broken() { illuminance(P) { Ci += Cl; } }");
    assert_eq!(code, ErrorCode::SemanticAnalysisFailed);
    assert!(
        errors
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("unconditional 'illuminance'"))
    );
}

#[test]
fn break_level_outside_loop_nesting_fails_code_generation() {
    let (code, errors) = failure_code("surface broken() { while (s > 0) { break 2; } }");
    assert_eq!(code, ErrorCode::CodeGenerationFailed);
    assert!(errors.contains(ErrorCode::CodeGenerationError));
}

#[test]
fn cross_product_is_rejected_in_code_generation() {
    let (code, _errors) = failure_code("surface broken() { vector v = N ^ I; }");
    assert_eq!(code, ErrorCode::CodeGenerationFailed);
}

#[test]
fn diagnostics_carry_source_lines() {
    let source = "surface broken() {\n    Ci = Cs;\n    Oi = missing;\n}";
    let (_code, errors) = failure_code(source);
    assert!(
        errors.diagnostics().iter().any(|d| d.message.starts_with("(3):")),
        "{:?}",
        errors.diagnostics()
    );
}

#[test]
fn pre_registered_symbols_become_grid_parameters() {
    let mut symbol_table = SymbolTable::new();
    let _ = symbol_table
        .add_symbols()
        .variable("Kd", ValueType::Float, ValueStorage::Uniform);

    let mut errors = CollectingErrorPolicy::default();
    let shader = Shader::load_with_symbols("surface lit() { Ci = Cs * Kd; }", "lit.sl", &mut symbol_table, &mut errors)
        .expect("shader compiles");
    assert_eq!(errors.total_errors(), 0, "{:?}", errors.diagnostics());

    let kd = shader.find_symbol("Kd").expect("Kd is published");
    assert_eq!(kd.storage(), ValueStorage::Uniform);

    let mut grid = Grid::new(2, 2);
    grid.bind(&shader);
    grid.set_float("Kd", &[0.5]);
    grid.set_vec3("Cs", &[Vec3::new(1.0, 0.0, 1.0)]);

    let mut textures = NoTextures;
    let mut silent = SilentErrorPolicy::default();
    let mut context = ShadingContext::new(0, &mut textures, &mut silent);
    execute(&shader, EntryPoint::Shade, &mut grid, &mut context);

    assert_eq!(grid.vec3_values("Ci").unwrap(), vec![Vec3::new(0.5, 0.0, 0.5); 4]);
}

#[test]
fn opening_a_missing_file_reports_its_error_code() {
    let mut errors = CollectingErrorPolicy::default();
    let result = Shader::load_file("/nonexistent/shader.sl", &mut errors);
    assert_eq!(result.expect_err("load fails").code, ErrorCode::OpeningFileFailed);
    assert!(errors.contains(ErrorCode::OpeningFileFailed));
}
