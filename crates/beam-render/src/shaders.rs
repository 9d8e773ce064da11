// ── Fullscreen vertex shader (shared by all passes) ────────────────

pub const FULLSCREEN_VERTEX: &str = r#"#version 330 core

out vec2 v_uv;

// Corners (-1,-1), (3,-1), (-1,3): one triangle over all of clip space.
void main() {
    vec2 pos = vec2(float((gl_VertexID & 1) << 2) - 1.0, float((gl_VertexID & 2) << 1) - 1.0);
    v_uv = pos * 0.5 + 0.5;
    gl_Position = vec4(pos, 0.0, 1.0);
}
"#;

// ── Kaleidoscope shader ─────────────────────────────────────────────
//
// Mirrors beam_transform::pipeline::shade step for step. Keep the two in
// sync: the CPU version is what the tests check.

pub const KALEIDO_FRAGMENT: &str = r#"#version 330 core

in vec2 v_uv;
out vec4 frag_color;

uniform sampler2D u_source;

uniform float u_axis;
uniform float u_aspect;

uniform float u_master_angle;
uniform float u_master_zoom;
uniform vec2  u_master_translate;
uniform vec2  u_master_tilt;
uniform float u_master_rgb;

uniform float u_mode;
uniform float u_scroll;
uniform float u_room_shape;
uniform float u_fov;
uniform float u_curve;
uniform float u_twist;
uniform float u_flux;

uniform float u_camera_angle;
uniform float u_camera_zoom;
uniform vec2  u_camera_translate;
uniform vec2  u_camera_tilt;
uniform vec2  u_flip;
uniform float u_warp;
uniform float u_sensor_rgb;

uniform float u_negative;
uniform float u_hue;
uniform float u_contrast;
uniform float u_saturation;
uniform float u_bloom;

const float PI = 3.14159265;
const float TAU = 6.2831853;

vec2 rotate(vec2 v, float a) {
    float c = cos(a);
    float s = sin(a);
    return vec2(v.x * c - v.y * s, v.x * s + v.y * c);
}

vec2 tilt(vec2 v, vec2 t) {
    float z = 1.0 + v.x * t.x + v.y * t.y;
    return v / max(z, 0.1);
}

vec2 tile_mirror(vec2 v) {
    return abs(mod(v + 1.0, 2.0) - 1.0);
}

vec3 hue_shift(vec3 c, float a) {
    const vec3 k = vec3(0.57735);
    float co = cos(a);
    return c * co + cross(k, c) * sin(a) + k * dot(k, c) * (1.0 - co);
}

vec3 sample_camera(vec2 uv, float rgb_shift) {
    vec2 c = tilt(uv - 0.5, u_camera_tilt);
    c *= u_camera_zoom;
    float aspect = mix(u_aspect, 1.0, u_warp);
    c.x *= aspect;
    c = rotate(c, radians(u_camera_angle));
    c.x /= aspect;
    c += u_camera_translate;

    vec2 st = c + 0.5;
    st.x += rgb_shift;
    st = (st - 0.5) * u_flip + 0.5;
    return texture(u_source, tile_mirror(st)).rgb;
}

vec2 master_coord(vec2 v, float offset) {
    float blend = smoothstep(0.0, 1.0, u_mode);
    vec2 tilt_amt = mix(u_master_tilt, vec2(0.0), blend);
    vec2 translate = u_master_translate + mix(vec2(0.0), u_master_tilt * 2.0, blend);

    vec2 uv = tilt(v - 0.5, tilt_amt);
    uv.x *= u_aspect;
    uv.x += offset;
    uv = (uv + translate) * u_master_zoom * 4.0;
    uv = rotate(uv, -radians(u_master_angle));

    if (u_axis > 1.1) {
        float r = length(uv);
        float slice = TAU / u_axis;
        float a = mod(atan(uv.y, uv.x), slice);
        if (mod(u_axis, 2.0) < 0.1) a = abs(a - slice * 0.5);
        uv = vec2(cos(a), sin(a)) * r;
    }

    float angle = atan(uv.y, uv.x);
    float dist = mix(length(uv), max(abs(uv.x), abs(uv.y)), u_room_shape);
    dist += sin(angle * 4.0 + dist * 10.0) * u_flux * dist;
    float safe = max(dist, 0.01);

    float projection = (u_fov * 0.8 + 0.2) / safe;
    vec2 tunnel = vec2((angle + (1.0 / safe) * u_twist) / PI, projection + u_scroll);
    if (abs(u_curve - 1.0) > 0.01) tunnel *= 1.0 + (u_curve - 1.0) * (1.0 - safe);

    vec2 flat_uv = vec2(uv.x / u_aspect, uv.y);
    return tile_mirror(mix(flat_uv, tunnel * 0.8, blend));
}

void main() {
    vec3 color = vec3(0.0);
    for (int i = 0; i < 3; i++) {
        float m_off = (i == 0) ? u_master_rgb : (i == 2) ? -u_master_rgb : 0.0;
        float s_off = (i == 0) ? u_sensor_rgb : (i == 2) ? -u_sensor_rgb : 0.0;
        vec3 smp = sample_camera(master_coord(v_uv, m_off), s_off);
        color[i] = smp[i];
    }

    color = abs(color - u_negative);
    if (u_hue > 0.01) color = hue_shift(color, u_hue * TAU);
    color = (color - 0.5) * u_contrast + 0.5;
    float l = dot(color, vec3(0.299, 0.587, 0.114));
    color = mix(vec3(l), color, u_saturation);
    if (u_bloom > 0.01) color += smoothstep(0.4, 1.0, l) * color * u_bloom * 2.0;

    frag_color = vec4(color, 1.0);
}
"#;

// ── Blit shader ─────────────────────────────────────────────────────

pub const BLIT_FRAGMENT: &str = r#"#version 330 core

in vec2 v_uv;
out vec4 frag_color;

uniform sampler2D u_texture;

void main() {
    frag_color = texture(u_texture, v_uv);
}
"#;

/// Every uniform the kaleidoscope program must expose.
pub const KALEIDO_UNIFORMS: &[&str] = &[
    "u_source",
    "u_axis",
    "u_aspect",
    "u_master_angle",
    "u_master_zoom",
    "u_master_translate",
    "u_master_tilt",
    "u_master_rgb",
    "u_mode",
    "u_scroll",
    "u_room_shape",
    "u_fov",
    "u_curve",
    "u_twist",
    "u_flux",
    "u_camera_angle",
    "u_camera_zoom",
    "u_camera_translate",
    "u_camera_tilt",
    "u_flip",
    "u_warp",
    "u_sensor_rgb",
    "u_negative",
    "u_hue",
    "u_contrast",
    "u_saturation",
    "u_bloom",
];
