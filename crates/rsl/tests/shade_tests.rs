//! End-to-end tests: compile shader source and execute it over small
//! grids, checking per-lane results.

use pretty_assertions::assert_eq;
use rsl::{
    CollectingErrorPolicy, EntryPoint, ErrorPolicy, Grid, LightGeometry, NoTextures, Shader, ShadingContext,
    SilentErrorPolicy, Vec3, disassemble, execute,
};

fn compile(source: &str) -> Shader {
    let mut errors = CollectingErrorPolicy::default();
    let shader = Shader::load(source, "test.sl", &mut errors);
    assert_eq!(errors.total_errors(), 0, "{:?}", errors.diagnostics());
    shader.expect("shader compiles")
}

fn run(shader: &Shader, entry: EntryPoint, grid: &mut Grid) {
    let mut textures = NoTextures;
    let mut errors = SilentErrorPolicy::default();
    let mut context = ShadingContext::new(7, &mut textures, &mut errors);
    execute(shader, entry, grid, &mut context);
}

fn shade(shader: &Shader, grid: &mut Grid) {
    run(shader, EntryPoint::Initialize, grid);
    run(shader, EntryPoint::Shade, grid);
}

/// Fills `s` with values linear in `[0, 1]` across the u direction.
fn linear_s(grid: &mut Grid, width: usize, height: usize) {
    let mut values = Vec::with_capacity(width * height);
    for _ in 0..height {
        for x in 0..width {
            values.push(x as f32 / (width as f32 - 1.0));
        }
    }
    grid.set_float("s", &values);
}

#[test]
fn null_surface_shader_copies_inputs() {
    let shader = compile("surface null() { Ci = Cs; Oi = Os; }");
    let mut grid = Grid::new(4, 4);
    grid.bind(&shader);
    grid.set_vec3("Cs", &[Vec3::new(1.0, 0.0, 0.0)]);
    grid.set_vec3("Os", &[Vec3::new(1.0, 1.0, 1.0)]);

    shade(&shader, &mut grid);

    assert_eq!(grid.vec3_values("Ci").unwrap(), vec![Vec3::new(1.0, 0.0, 0.0); 16]);
    assert_eq!(grid.vec3_values("Oi").unwrap(), vec![Vec3::new(1.0, 1.0, 1.0); 16]);
}

#[test]
fn ambient_light_shader_emits_an_ambient_light() {
    let shader = compile("light amb(float intensity = 1;) { Cl = intensity * color(1, 1, 1); }");
    let mut grid = Grid::new(4, 4);
    grid.bind(&shader);

    run(&shader, EntryPoint::Initialize, &mut grid);
    assert_eq!(grid.float_values("intensity").unwrap(), vec![1.0]);

    grid.set_float("intensity", &[0.5]);
    run(&shader, EntryPoint::Shade, &mut grid);

    assert_eq!(grid.lights().len(), 1);
    let light = &grid.lights()[0];
    assert_eq!(light.geometry, LightGeometry::Ambient);
    for lane in 0..grid.size() {
        assert_eq!(light.color_at(lane), Vec3::new(0.5, 0.5, 0.5));
    }
}

#[test]
fn ambient_builtin_accumulates_the_light_color() {
    let light_shader = compile("light amb(float intensity = 1;) { Cl = intensity * color(1, 1, 1); }");
    let mut grid = Grid::new(4, 4);
    grid.bind(&light_shader);
    run(&light_shader, EntryPoint::Initialize, &mut grid);
    grid.set_float("intensity", &[0.5]);
    run(&light_shader, EntryPoint::Shade, &mut grid);

    let surface = compile("surface lit() { Ci = ambient(); }");
    grid.bind(&surface);
    shade(&surface, &mut grid);

    assert_eq!(grid.vec3_values("Ci").unwrap(), vec![Vec3::new(0.5, 0.5, 0.5); 16]);
}

#[test]
fn varying_conditional_writes_lanes_by_mask() {
    let shader = compile("surface checker() { if (s > 0.5) Ci = color(1, 0, 0); else Ci = color(0, 0, 1); }");
    let mut grid = Grid::new(8, 8);
    grid.bind(&shader);
    linear_s(&mut grid, 8, 8);

    shade(&shader, &mut grid);

    let s = grid.float_values("s").unwrap();
    let ci = grid.vec3_values("Ci").unwrap();
    for lane in 0..64 {
        let expected = if s[lane] > 0.5 {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            Vec3::new(0.0, 0.0, 1.0)
        };
        assert_eq!(ci[lane], expected, "lane {lane} with s = {}", s[lane]);
    }
}

#[test]
fn uniform_float_converts_and_promotes_before_multiply() {
    let shader = compile("surface scale() { float k = 2; P = k * P; }");

    // The generated stream converts the float to a point and promotes the
    // uniform operand to varying before multiplying.
    let listing = disassemble(&shader);
    let position = |needle: &str| listing.find(needle).unwrap_or_else(|| panic!("{needle} in listing"));
    assert!(position("convert") < position("promote"));
    assert!(position("promote") < position("multiply"));

    let mut grid = Grid::new(2, 2);
    grid.bind(&shader);
    let positions: Vec<Vec3> = (0..4).map(|i| Vec3::new(i as f32, 1.0, -(i as f32))).collect();
    grid.set_vec3("P", &positions);

    shade(&shader, &mut grid);

    let result = grid.vec3_values("P").unwrap();
    for lane in 0..4 {
        assert_eq!(result[lane], positions[lane] * 2.0, "lane {lane}");
    }
}

#[test]
fn random_overloads_resolve_by_return_type() {
    let shader = compile("surface noise() { Ci = color random(); float f = random(); Oi = f * color(1, 1, 1); }");
    let mut grid = Grid::new(4, 4);
    grid.bind(&shader);

    shade(&shader, &mut grid);

    let ci = grid.vec3_values("Ci").unwrap();
    let oi = grid.vec3_values("Oi").unwrap();
    for lane in 0..16 {
        for component in ci[lane].to_array() {
            assert!((0.0..1.0).contains(&component), "Ci out of range at lane {lane}");
        }
        // The float generator feeds all three components equally.
        assert_eq!(oi[lane].x, oi[lane].y);
        assert_eq!(oi[lane].y, oi[lane].z);
        assert!((0.0..1.0).contains(&oi[lane].x));
    }
    // Per-lane generators produce varying values.
    assert!(ci.iter().any(|&c| c != ci[0]));
    assert!(oi.iter().any(|&c| c != oi[0]));
}

#[test]
fn random_is_deterministic_for_a_seed() {
    let shader = compile("surface noise() { Ci = color random(); }");
    let mut first = Grid::new(4, 4);
    first.bind(&shader);
    shade(&shader, &mut first);
    let mut second = Grid::new(4, 4);
    second.bind(&shader);
    shade(&shader, &mut second);
    assert_eq!(first.vec3_values("Ci").unwrap(), second.vec3_values("Ci").unwrap());
}

#[test]
fn while_loop_with_break_stops_at_the_break_iteration() {
    let shader = compile(
        "surface counter() {
            float i = 0;
            while (i < 10) {
                i += 1;
                if (i == 3)
                    break;
            }
            Oi = i * color(1, 1, 1);
        }",
    );
    let mut grid = Grid::new(2, 2);
    grid.bind(&shader);

    shade(&shader, &mut grid);

    assert_eq!(grid.vec3_values("Oi").unwrap(), vec![Vec3::new(3.0, 3.0, 3.0); 4]);
}

#[test]
fn while_loop_without_break_runs_to_the_condition() {
    let shader = compile(
        "surface counter() {
            float i = 0;
            while (i < 10)
                i += 1;
            Oi = i * color(1, 1, 1);
        }",
    );
    let mut grid = Grid::new(2, 2);
    grid.bind(&shader);
    shade(&shader, &mut grid);
    assert_eq!(grid.vec3_values("Oi").unwrap(), vec![Vec3::new(10.0, 10.0, 10.0); 4]);
}

#[test]
fn for_loop_with_continue_skips_the_accumulation() {
    let shader = compile(
        "surface skipper() {
            float i, total = 0;
            for (i = 0; i < 5; i += 1) {
                if (i == 2)
                    continue;
                total += 1;
            }
            Oi = total * color(1, 1, 1);
        }",
    );
    let mut grid = Grid::new(2, 2);
    grid.bind(&shader);
    shade(&shader, &mut grid);
    assert_eq!(grid.vec3_values("Oi").unwrap(), vec![Vec3::new(4.0, 4.0, 4.0); 4]);
}

#[test]
fn nested_conditionals_respect_mask_nesting() {
    let shader = compile(
        "surface bands() {
            if (s > 0.25) {
                if (s > 0.75)
                    Ci = color(1, 0, 0);
                else
                    Ci = color(0, 1, 0);
            } else {
                Ci = color(0, 0, 1);
            }
        }",
    );
    let mut grid = Grid::new(8, 1);
    grid.bind(&shader);
    linear_s(&mut grid, 8, 1);

    shade(&shader, &mut grid);

    let s = grid.float_values("s").unwrap();
    let ci = grid.vec3_values("Ci").unwrap();
    for lane in 0..8 {
        let expected = if s[lane] > 0.75 {
            Vec3::new(1.0, 0.0, 0.0)
        } else if s[lane] > 0.25 {
            Vec3::new(0.0, 1.0, 0.0)
        } else {
            Vec3::new(0.0, 0.0, 1.0)
        };
        assert_eq!(ci[lane], expected, "lane {lane} with s = {}", s[lane]);
    }
}

#[test]
fn masked_assignment_leaves_inactive_lanes_untouched() {
    let shader = compile("surface partial() { Ci = color(0, 1, 0); if (s > 0.5) Ci = color(1, 0, 0); }");
    let mut grid = Grid::new(8, 1);
    grid.bind(&shader);
    linear_s(&mut grid, 8, 1);

    shade(&shader, &mut grid);

    let s = grid.float_values("s").unwrap();
    let ci = grid.vec3_values("Ci").unwrap();
    for lane in 0..8 {
        let expected = if s[lane] > 0.5 {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            Vec3::new(0.0, 1.0, 0.0)
        };
        assert_eq!(ci[lane], expected, "lane {lane}");
    }
}

#[test]
fn illuminate_light_feeds_the_illuminance_loop() {
    let light_shader = compile(
        "light point_light(float intensity = 1;) {
            illuminate((0, 0, 0)) {
                Cl = intensity * color(1, 1, 1);
            }
        }",
    );
    let mut grid = Grid::new(2, 2);
    grid.bind(&light_shader);
    run(&light_shader, EntryPoint::Initialize, &mut grid);
    run(&light_shader, EntryPoint::Shade, &mut grid);

    assert_eq!(grid.lights().len(), 1);
    assert!(matches!(grid.lights()[0].geometry, LightGeometry::Illuminate { .. }));

    let surface = compile(
        "surface gather() {
            Ci = color(0, 0, 0);
            illuminance(P, N, PI) {
                Ci += Cl;
            }
        }",
    );
    grid.bind(&surface);
    grid.set_vec3("P", &[Vec3::new(0.0, 0.0, 1.0)]);
    grid.set_vec3("N", &[Vec3::new(0.0, 0.0, -1.0)]);
    shade(&surface, &mut grid);

    assert_eq!(grid.vec3_values("Ci").unwrap(), vec![Vec3::new(1.0, 1.0, 1.0); 4]);
}

#[test]
fn diffuse_accumulates_a_point_light() {
    let light_shader = compile(
        "light point_light() {
            illuminate((0, 0, 0)) {
                Cl = color(1, 1, 1);
            }
        }",
    );
    let mut grid = Grid::new(2, 2);
    grid.bind(&light_shader);
    run(&light_shader, EntryPoint::Initialize, &mut grid);
    run(&light_shader, EntryPoint::Shade, &mut grid);

    let surface = compile("surface lambert() { Ci = diffuse(N); }");
    grid.bind(&surface);
    // The light sits at the origin; the surface at z = 1 faces it head on.
    grid.set_vec3("P", &[Vec3::new(0.0, 0.0, 1.0)]);
    grid.set_vec3("N", &[Vec3::new(0.0, 0.0, -1.0)]);
    shade(&surface, &mut grid);

    let ci = grid.vec3_values("Ci").unwrap();
    for lane in 0..4 {
        assert!((ci[lane].x - 1.0).abs() < 1.0e-5, "lane {lane}: {:?}", ci[lane]);
    }
}

#[test]
fn solar_light_with_axis_reaches_facing_surfaces() {
    let light_shader = compile(
        "light sun() {
            solar((0, 0, 1), 0) {
                Cl = color(1, 1, 0);
            }
        }",
    );
    let mut grid = Grid::new(2, 2);
    grid.bind(&light_shader);
    run(&light_shader, EntryPoint::Initialize, &mut grid);
    run(&light_shader, EntryPoint::Shade, &mut grid);

    assert_eq!(grid.lights().len(), 1);
    assert!(matches!(
        grid.lights()[0].geometry,
        LightGeometry::Solar { direction, .. } if direction == Vec3::new(0.0, 0.0, 1.0)
    ));

    let surface = compile("surface lambert() { Ci = diffuse(N); }");
    grid.bind(&surface);
    grid.set_vec3("P", &[Vec3::new(0.0, 0.0, 5.0)]);
    grid.set_vec3("N", &[Vec3::new(0.0, 0.0, -1.0)]);
    shade(&surface, &mut grid);

    let ci = grid.vec3_values("Ci").unwrap();
    for lane in 0..4 {
        assert!((ci[lane].x - 1.0).abs() < 1.0e-5 && ci[lane].z == 0.0, "lane {lane}: {:?}", ci[lane]);
    }
}

#[test]
fn builtin_math_runs_per_lane() {
    let shader = compile("surface waves() { Ci = (sin(s * PI) + 1) * color(1, 1, 1); }");
    let mut grid = Grid::new(8, 1);
    grid.bind(&shader);
    linear_s(&mut grid, 8, 1);

    shade(&shader, &mut grid);

    let s = grid.float_values("s").unwrap();
    let ci = grid.vec3_values("Ci").unwrap();
    for lane in 0..8 {
        let expected = (s[lane] * std::f32::consts::PI).sin() + 1.0;
        assert!((ci[lane].x - expected).abs() < 1.0e-5, "lane {lane}");
    }
}

#[test]
fn string_parameters_reach_the_string_table() {
    let shader = compile(r#"surface tagged(string label = "wood";) { Ci = Cs; }"#);
    let mut grid = Grid::new(2, 2);
    grid.bind(&shader);
    run(&shader, EntryPoint::Initialize, &mut grid);

    let label = shader.find_symbol("label").expect("label is published");
    assert_eq!(grid.string(label.offset() as usize), "wood");
}
