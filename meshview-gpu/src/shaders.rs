//! WGSL shaders for scene rendering

/// Lit, textured, shadowed meshes. `vs_main`/`fs_main` draw the scene,
/// `vs_shadow` renders the sun's depth map.
pub const SCENE_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    eye: vec4<f32>,
    sun_direction: vec4<f32>,
    sun_color: vec4<f32>,
    sky_color: vec4<f32>,
    ground_color: vec4<f32>,
};

struct Model {
    model: mat4x4<f32>,
    normal: mat4x4<f32>,
    base_color: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> globals: Globals;

@group(1) @binding(0) var<uniform> model: Model;
@group(1) @binding(1) var base_texture: texture_2d<f32>;
@group(1) @binding(2) var base_sampler: sampler;

@group(2) @binding(0) var shadow_map: texture_depth_2d;
@group(2) @binding(1) var shadow_sampler: sampler_comparison;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) light_position: vec4<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let world = model.model * vec4<f32>(in.position, 1.0);
    var out: VertexOutput;
    out.clip_position = globals.view_proj * world;
    out.world_position = world.xyz;
    out.normal = (model.normal * vec4<f32>(in.normal, 0.0)).xyz;
    out.uv = in.uv;
    out.light_position = globals.light_view_proj * world;
    return out;
}

@vertex
fn vs_shadow(in: VertexInput) -> @builtin(position) vec4<f32> {
    return globals.light_view_proj * model.model * vec4<f32>(in.position, 1.0);
}

// 3x3 PCF; 1 is fully lit
fn shadow_factor(light_position: vec4<f32>) -> f32 {
    if (globals.sun_color.w < 0.5) {
        return 1.0;
    }
    let ndc = light_position.xyz / light_position.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    if (uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 || ndc.z > 1.0) {
        return 1.0;
    }

    let texel = 1.0 / vec2<f32>(textureDimensions(shadow_map));
    var lit = 0.0;
    for (var x = -1; x <= 1; x++) {
        for (var y = -1; y <= 1; y++) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            lit += textureSampleCompareLevel(shadow_map, shadow_sampler, uv + offset, ndc.z - 0.002);
        }
    }
    return lit / 9.0;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let albedo = textureSample(base_texture, base_sampler, in.uv) * model.base_color;

    let view_dir = normalize(globals.eye.xyz - in.world_position);
    var n = normalize(in.normal);
    // Double sided
    if (dot(n, view_dir) < 0.0) {
        n = -n;
    }

    let hemisphere = mix(globals.ground_color.rgb, globals.sky_color.rgb, n.y * 0.5 + 0.5) * globals.sky_color.w;

    let l = normalize(globals.sun_direction.xyz);
    let sun = globals.sun_color.rgb * globals.sun_direction.w * shadow_factor(in.light_position);
    let diffuse = max(dot(n, l), 0.0) * sun;

    let roughness = clamp(model.params.y, 0.04, 1.0);
    let h = normalize(l + view_dir);
    let shininess = mix(256.0, 4.0, roughness);
    let specular = pow(max(dot(n, h), 0.0), shininess) * (1.0 - roughness) * sun;

    let color = albedo.rgb * (hemisphere + diffuse) + specular;
    return vec4<f32>(color, albedo.a);
}
"#;
