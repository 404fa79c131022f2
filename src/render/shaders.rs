/// Shared bind group 0 declaration, prepended to both shader modules.
const GLOBALS: &str = r#"
struct GlobalUniform {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    ambient: vec4<f32>,
    light_directions: array<vec4<f32>, 4>,
    light_colors: array<vec4<f32>, 4>,
    params: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

fn tonemap(color: vec3<f32>) -> vec3<f32> {
    let exposed = color * globals.params.y;
    return exposed / (vec3<f32>(1.0) + exposed);
}
"#;

const MESH: &str = r#"
struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
    surface: vec4<f32>,
}

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.proj * globals.view * world_position;
    out.world_pos = world_position.xyz;

    let world_normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;
    out.normal = normalize(world_normal);
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var normal = normalize(input.normal);
    let to_eye = normalize(globals.camera_position.xyz - input.world_pos);
    // planes and open meshes are lit from whichever side faces the camera
    if dot(normal, to_eye) < 0.0 {
        normal = -normal;
    }

    let metalness = object.surface.x;
    let shininess = mix(256.0, 4.0, object.surface.y);
    let base = object.color.rgb;
    var lit = globals.ambient.rgb * base * (1.0 - 0.5 * metalness);

    let count = u32(globals.params.x);
    for (var i = 0u; i < count; i = i + 1u) {
        let light_dir = globals.light_directions[i].xyz;
        let radiance = globals.light_colors[i].rgb;
        let diffuse = max(dot(normal, light_dir), 0.0);
        let half_dir = normalize(light_dir + to_eye);
        let specular = pow(max(dot(normal, half_dir), 0.0), shininess);
        let tint = mix(vec3<f32>(0.04), base, metalness);
        lit += radiance * (diffuse * base * (1.0 - metalness) + specular * tint);
    }

    let alpha = object.color.a;
    return vec4<f32>(tonemap(lit) * alpha, alpha);
}
"#;

const POINTS: &str = r#"
struct PointsConstants {
    model: mat4x4<f32>,
    colors: array<vec4<f32>, 3>,
    style: vec4<f32>,
}

@group(1) @binding(0)
var<uniform> points: PointsConstants;

struct InstanceInput {
    @location(0) position: vec3<f32>,
    @location(1) random: f32,
    @location(2) color_random: f32,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) corner: vec2<f32>,
    @location(1) color: vec3<f32>,
}

fn corner(index: u32) -> vec2<f32> {
    switch index {
        case 0u: { return vec2<f32>(-1.0, -1.0); }
        case 1u: { return vec2<f32>(1.0, -1.0); }
        case 2u: { return vec2<f32>(1.0, 1.0); }
        case 3u: { return vec2<f32>(-1.0, -1.0); }
        case 4u: { return vec2<f32>(1.0, 1.0); }
        default: { return vec2<f32>(-1.0, 1.0); }
    }
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32, input: InstanceInput) -> VertexOutput {
    var out: VertexOutput;
    let gradient = points.style.y > 0.5;
    let time = globals.params.z;

    var local = input.position;
    var size = points.style.x;
    if gradient {
        // each particle drifts on its own phase
        let phase = time * 0.5 + input.random * 6.2831853;
        local += vec3<f32>(sin(phase), cos(phase * 0.7), sin(phase * 1.3)) * 0.02;
        size *= 0.5 + input.random;
    }

    let view_position = globals.view * points.model * vec4<f32>(local, 1.0);
    let offset = corner(index);
    let billboard = view_position + vec4<f32>(offset * size * 0.5, 0.0, 0.0);
    out.position = globals.proj * billboard;
    out.corner = offset;

    if !gradient {
        out.color = points.colors[0].rgb;
    } else if input.color_random < 0.33 {
        out.color = points.colors[0].rgb;
    } else if input.color_random < 0.66 {
        out.color = points.colors[1].rgb;
    } else {
        out.color = points.colors[2].rgb;
    }
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var alpha = 1.0;
    if points.style.y > 0.5 {
        let distance = length(input.corner);
        if distance > 1.0 {
            discard;
        }
        alpha = 1.0 - smoothstep(0.0, 1.0, distance);
    }
    return vec4<f32>(tonemap(input.color) * alpha, alpha);
}
"#;

pub fn mesh_source() -> String {
    format!("{GLOBALS}{MESH}")
}

pub fn points_source() -> String {
    format!("{GLOBALS}{POINTS}")
}
