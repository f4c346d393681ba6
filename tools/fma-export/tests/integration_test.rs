//! Integration tests for fma-export
//!
//! Tests the full pipeline: write OBJ fixtures -> export -> decode and verify output

use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

use tempfile::tempdir;

use fma_export::fma_common::{
    ModelFlags, BONE_RECORD_SIZE, FACE_RECORD_SIZE, MESH_RECORD_SIZE, PRIMITIVE_RESTART,
    VERTEX_RECORD_SIZE,
};
use fma_export::{
    encode_model, load_obj, ExportOptions, GeometryMode, Material, Mesh, Object, Scene, Transform,
};

const TRIANGLE_OBJ: &str = "\
mtllib tri.mtl
o Tri
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
usemtl Red
f 1//1 2//1 3//1
";

const TRIANGLE_MTL: &str = "\
newmtl Red
Kd 1 0 0
Ks 0 0 0
Ns 8
";

const CUBE_OBJ: &str = "\
o Cube
v -1 -1 -1
v 1 -1 -1
v 1 1 -1
v -1 1 -1
v -1 -1 1
v 1 -1 1
v 1 1 1
v -1 1 1
vn 0 0 1
vn 0 0 -1
vn 1 0 0
vn -1 0 0
vn 0 1 0
vn 0 -1 0
f 5//1 6//1 7//1 8//1
f 2//2 1//2 4//2 3//2
f 6//3 2//3 3//3 7//3
f 1//4 5//4 8//4 4//4
f 8//5 7//5 3//5 4//5
f 1//6 2//6 6//6 5//6
";

// ============================================================================
// Test-side decoding
// ============================================================================

fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn u64_at(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap())
}

fn f32_at(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SegmentInfo {
    start: usize,
    count: usize,
}

#[derive(Debug)]
struct DecodedHeader {
    version: u32,
    flags: u64,
    strings: SegmentInfo,
    strings_len: usize,
    materials: SegmentInfo,
    meshes: SegmentInfo,
    bones: SegmentInfo,
    faces: SegmentInfo,
    indices: SegmentInfo,
    vertices: SegmentInfo,
    layout: String,
}

fn decode_header(data: &[u8]) -> DecodedHeader {
    assert!(data.len() >= 160, "file too short for a header");
    assert_eq!(&data[..5], b"##fma", "bad magic");

    let segment = |offset: usize| SegmentInfo {
        start: u64_at(data, offset) as usize,
        count: u64_at(data, offset + 8) as usize,
    };
    let layout_len = u16::from_le_bytes([data[136], data[137]]) as usize;

    DecodedHeader {
        version: u32::from_be_bytes([0, data[5], data[6], data[7]]),
        flags: u64::from_be_bytes(data[8..16].try_into().unwrap()),
        strings: segment(16),
        strings_len: u64_at(data, 32) as usize,
        materials: segment(40),
        meshes: segment(56),
        bones: segment(72),
        faces: segment(88),
        indices: segment(104),
        vertices: segment(120),
        layout: String::from_utf8(data[138..138 + layout_len].to_vec()).unwrap(),
    }
}

/// Read a string record at an absolute file offset.
fn string_at(data: &[u8], offset: usize) -> String {
    let len = u16::from_le_bytes([data[offset], data[offset + 1]]) as usize;
    assert_eq!(data[offset + 2 + len], 0, "string record must be NUL-terminated");
    String::from_utf8(data[offset + 2..offset + 2 + len].to_vec()).unwrap()
}

/// Resolve a string pointer stored in a record.
fn pointed_string(data: &[u8], header: &DecodedHeader, pointer: u64) -> String {
    string_at(data, header.strings.start + pointer as usize)
}

fn index_stream(data: &[u8], header: &DecodedHeader) -> Vec<u32> {
    (0..header.indices.count)
        .map(|i| u32_at(data, header.indices.start + 4 * i))
        .collect()
}

fn vertex_position(data: &[u8], header: &DecodedHeader, index: usize) -> [f32; 3] {
    let base = header.vertices.start + index * VERTEX_RECORD_SIZE;
    [f32_at(data, base), f32_at(data, base + 4), f32_at(data, base + 8)]
}

fn write_fixture(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write fixture");
    path
}

// ============================================================================
// Library pipeline
// ============================================================================

/// One object, one triangle, one material in triangle-fan mode
#[test]
fn test_single_triangle_scenario() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_fixture(dir.path(), "tri.obj", TRIANGLE_OBJ);
    write_fixture(dir.path(), "tri.mtl", TRIANGLE_MTL);

    let scene = load_obj(&obj_path).expect("Failed to load OBJ");
    let model = encode_model(&scene, &ExportOptions::default()).expect("Failed to export");
    let data = &model.bytes;
    let header = decode_header(data);

    assert_eq!(header.version, 4);
    assert_eq!(header.flags, ModelFlags::TRIANGLE_FAN.bits());
    assert_eq!(header.layout, "f44444222222222");
    assert_eq!(header.materials.count, 1);
    assert_eq!(header.meshes.count, 1);
    assert_eq!(header.bones.count, 1);
    assert_eq!(header.faces.count, 1);
    assert_eq!(header.vertices.count, 3);
    assert_eq!(index_stream(data, &header), vec![0, 1, 2, PRIMITIVE_RESTART]);

    // Material table points at the material's file name
    let pointer = u64_at(data, header.materials.start);
    assert_eq!(pointed_string(data, &header, pointer), "Red.mtl.fma");

    // Bone names the object and carries the placeholder parent
    let bone = header.bones.start;
    assert_eq!(pointed_string(data, &header, u64_at(data, bone)), "Tri");
    assert_eq!(
        pointed_string(data, &header, u64_at(data, bone + 8)),
        "null_bone_parent"
    );
    assert_eq!(u64_at(data, bone + 16), 0);
    assert_eq!(&data[bone + 60..bone + 64], b"pad4");

    // Y-up OBJ coordinates come back unchanged in FMA axes
    assert_eq!(vertex_position(data, &header, 1), [1.0, 0.0, 0.0]);
    assert_eq!(vertex_position(data, &header, 2), [0.0, 1.0, 0.0]);
    let vertex = header.vertices.start;
    let normal = [
        f32_at(data, vertex + 20),
        f32_at(data, vertex + 24),
        f32_at(data, vertex + 28),
    ];
    assert_eq!(normal, [0.0, 0.0, 1.0]);

    // Face: 3 loops starting at index 0, material 0, normal +Z
    let face = header.faces.start;
    assert_eq!(u32_at(data, face), 3);
    assert_eq!(u32_at(data, face + 4), 0);
    assert_eq!(u32_at(data, face + 8), 0);
    assert_eq!(f32_at(data, face + 20), 1.0);
}

/// Segment starts follow from the previous segment's start, count and record size
#[test]
fn test_layout_additivity_in_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_fixture(dir.path(), "cube.obj", CUBE_OBJ);

    let scene = load_obj(&obj_path).expect("Failed to load OBJ");
    let model = encode_model(&scene, &ExportOptions::default()).expect("Failed to export");
    let data = &model.bytes;
    let header = decode_header(data);

    assert_eq!(header.strings.start % 8, 0);
    assert_eq!(header.strings_len % 8, 0);
    assert_eq!(header.materials.start, header.strings.start + header.strings_len);
    assert_eq!(header.meshes.start, header.materials.start + header.materials.count * 8);
    assert_eq!(
        header.bones.start,
        header.meshes.start + header.meshes.count * MESH_RECORD_SIZE
    );
    assert_eq!(
        header.faces.start,
        header.bones.start + header.bones.count * BONE_RECORD_SIZE
    );
    assert_eq!(
        header.vertices.start,
        header.faces.start + header.faces.count * FACE_RECORD_SIZE
    );
    assert_eq!(
        header.indices.start,
        header.vertices.start + header.vertices.count * VERTEX_RECORD_SIZE
    );
    assert_eq!(data.len(), header.indices.start + header.indices.count * 4);

    // Per-face normals keep every cube corner distinct
    assert_eq!(header.vertices.count, 24);
    assert_eq!(header.faces.count, 6);
}

/// Restarts equal the face count; the rest equals the loop count
#[test]
fn test_index_count_conservation() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_fixture(dir.path(), "cube.obj", CUBE_OBJ);

    let scene = load_obj(&obj_path).expect("Failed to load OBJ");
    let model = encode_model(&scene, &ExportOptions::default()).expect("Failed to export");
    let header = decode_header(&model.bytes);
    let stream = index_stream(&model.bytes, &header);

    let restarts = stream.iter().filter(|i| **i == PRIMITIVE_RESTART).count();
    assert_eq!(restarts, header.faces.count);

    let loops: usize = (0..header.faces.count)
        .map(|f| u32_at(&model.bytes, header.faces.start + f * FACE_RECORD_SIZE) as usize)
        .sum();
    assert_eq!(stream.len() - restarts, loops);
    assert!(stream
        .iter()
        .filter(|i| **i != PRIMITIVE_RESTART)
        .all(|i| (*i as usize) < header.vertices.count));

    // Every face points at the start of its own run
    let mut expected = 0;
    for f in 0..header.faces.count {
        let face = header.faces.start + f * FACE_RECORD_SIZE;
        assert_eq!(u32_at(&model.bytes, face + 4), expected);
        expected += u32_at(&model.bytes, face) + 1;
    }
}

/// Two objects sharing a mesh and a material
#[test]
fn test_shared_mesh_scenario() {
    let mut mesh = Mesh::new("Shared");
    mesh.positions = vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let n = [0.0, 0.0, 1.0];
    mesh.add_face(&[(0, n, None), (1, n, None), (2, n, None)]);
    mesh.materials.push(Material::new("Stone"));
    let mesh = Arc::new(mesh);

    let mut scene = Scene::new();
    scene.push(Object::new("First", mesh.clone()));
    scene.push(Object::new("Second", mesh).with_transform(Transform {
        position: [5.0, 0.0, 0.0],
        ..Default::default()
    }));

    let model = encode_model(&scene, &ExportOptions::default()).expect("Failed to export");
    let data = &model.bytes;
    let header = decode_header(data);

    assert_eq!(header.meshes.count, 1);
    assert_eq!(header.materials.count, 1);
    assert_eq!(header.bones.count, 2);
    for b in 0..2 {
        let bone = header.bones.start + b * BONE_RECORD_SIZE;
        assert_eq!(u64_at(data, bone + 16), 0, "bone {} must reference mesh 0", b);
    }
    let second = header.bones.start + BONE_RECORD_SIZE;
    assert_eq!(pointed_string(data, &header, u64_at(data, second)), "Second");
    assert_eq!(f32_at(data, second + 24), 5.0);
}

/// Mesh centers and face normals share the axes of the vertex records
#[test]
fn test_sphere_and_face_normal_axes_match_vertices() {
    let mut mesh = Mesh::new("Raised");
    mesh.positions = vec![[0.0, 0.0, 2.0], [3.0, 0.0, 2.0], [0.0, 3.0, 2.0]];
    let n = [0.0, 0.0, 1.0];
    mesh.add_face(&[(0, n, None), (1, n, None), (2, n, None)]);

    let mut scene = Scene::new();
    scene.push(Object::new("Raised", Arc::new(mesh)));
    let model = encode_model(&scene, &ExportOptions::default()).expect("Failed to export");
    let data = &model.bytes;
    let header = decode_header(data);
    assert_eq!(header.vertices.count, 3);

    let mut mean = [0.0f32; 3];
    for i in 0..header.vertices.count {
        let p = vertex_position(data, &header, i);
        for axis in 0..3 {
            mean[axis] += p[axis] / header.vertices.count as f32;
        }
    }
    let mesh_record = header.meshes.start;
    for axis in 0..3 {
        let center = f32_at(data, mesh_record + 24 + 4 * axis);
        assert!(
            (center - mean[axis]).abs() < 1e-5,
            "center axis {}: {} vs vertex mean {}",
            axis,
            center,
            mean[axis]
        );
    }
    // Source +Z lands on +Y
    assert!((f32_at(data, mesh_record + 28) - 2.0).abs() < 1e-5);

    let face = header.faces.start;
    let vertex = header.vertices.start;
    for axis in 0..3 {
        assert_eq!(
            f32_at(data, face + 12 + 4 * axis),
            f32_at(data, vertex + 20 + 4 * axis),
            "face and vertex normals differ on axis {}",
            axis
        );
    }
}

/// Mirrored instances write each face in reverse
#[test]
fn test_winding_flip_for_mirrored_instance() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_fixture(dir.path(), "cube.obj", CUBE_OBJ);
    let loaded = load_obj(&obj_path).expect("Failed to load OBJ");
    let cube = loaded.objects[0].mesh.clone();

    let mut scene = Scene::new();
    scene.push(Object::new("Normal", cube.clone()));
    scene.push(Object::new("Mirror", cube).with_transform(Transform {
        scale: [1.0, 1.0, -1.0],
        ..Default::default()
    }));

    let model = encode_model(&scene, &ExportOptions::default()).expect("Failed to export");
    let header = decode_header(&model.bytes);
    assert_eq!(header.meshes.count, 2);
    assert_eq!(header.vertices.count, 24);

    let stream = index_stream(&model.bytes, &header);
    let faces: Vec<&[u32]> = stream
        .split(|i| *i == PRIMITIVE_RESTART)
        .filter(|f| !f.is_empty())
        .collect();
    assert_eq!(faces.len(), 12);
    for (forward, mirrored) in faces[..6].iter().zip(&faces[6..]) {
        let reversed: Vec<u32> = forward.iter().rev().copied().collect();
        assert_eq!(*mirrored, reversed.as_slice());
    }
}

#[test]
fn test_triangle_list_rejects_quads() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_fixture(dir.path(), "cube.obj", CUBE_OBJ);
    let scene = load_obj(&obj_path).expect("Failed to load OBJ");

    let options = ExportOptions {
        geometry: GeometryMode::TriangleList,
        ..Default::default()
    };
    let err = encode_model(&scene, &options).unwrap_err();
    assert!(!err.is_internal());
    assert!(err.to_string().contains("triangle-list"));
}

// ============================================================================
// Binary
// ============================================================================

fn run_fma_export(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fma-export"))
        .args(args)
        .output()
        .expect("Failed to run fma-export")
}

#[test]
fn test_cli_model_with_materials() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_fixture(dir.path(), "tri.obj", TRIANGLE_OBJ);
    write_fixture(dir.path(), "tri.mtl", TRIANGLE_MTL);
    let out_path = dir.path().join("out").join("tri.fma");

    let output = run_fma_export(&[
        "model",
        obj_path.to_str().unwrap(),
        "-o",
        out_path.to_str().unwrap(),
        "--materials",
    ]);
    assert!(
        output.status.success(),
        "fma-export model failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let data = std::fs::read(&out_path).expect("Failed to read model");
    let header = decode_header(&data);
    assert_eq!(header.bones.count, 1);

    let material = std::fs::read(dir.path().join("out").join("Red.mtl.fma"))
        .expect("Material file should exist next to the model");
    assert_eq!(&material[..8], b"##fma\x00\x00\x04");
    // All four slots inline
    assert_eq!(u64::from_be_bytes(material[8..16].try_into().unwrap()), 0b11110);
    // Diffuse color from Kd, in the high half of a big-endian u64
    assert_eq!(&material[16..20], &[0xFF, 0x00, 0x00, 0xFF]);
    assert_eq!(&material[20..24], &[0, 0, 0, 0]);
    assert_eq!(f32_at(&material, 48), 8.0);
    assert_eq!(&material[52..56], b"pad4");
}

#[test]
fn test_cli_failed_export_leaves_no_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_fixture(dir.path(), "cube.obj", CUBE_OBJ);
    let out_path = dir.path().join("cube.fma");

    let output = run_fma_export(&[
        "model",
        obj_path.to_str().unwrap(),
        "--geometry",
        "triangle-list",
    ]);
    assert!(!output.status.success());
    assert!(!out_path.exists(), "failed export must not create the model");

    let output = run_fma_export(&[
        "model",
        obj_path.to_str().unwrap(),
        "--geometry",
        "quads",
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_material_command() {
    let dir = tempdir().expect("Failed to create temp dir");
    let out_path = dir.path().join("glass.mtl.fma");

    let output = run_fma_export(&[
        "material",
        "glass",
        "-o",
        out_path.to_str().unwrap(),
        "--diffuse",
        "textures/glass.png",
        "--transparent",
        "--comment",
        "",
    ]);
    assert!(
        output.status.success(),
        "fma-export material failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let data = std::fs::read(&out_path).expect("Failed to read material");
    // Transparent, diffuse is a texture, the others inline
    assert_eq!(u64::from_be_bytes(data[8..16].try_into().unwrap()), 0b11101);

    // Diffuse slot is a string offset; no comment, so strings start after the header
    let strings_start = u64_at(&data, 56) as usize;
    assert_eq!(strings_start, 80);
    let pointer = u64_at(&data, 16) as usize;
    assert_eq!(string_at(&data, strings_start + pointer), "textures/glass.png");
}

#[test]
fn test_cli_build_and_check() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_fixture(dir.path(), "cube.obj", CUBE_OBJ);
    let manifest = write_fixture(
        dir.path(),
        "fma-export.toml",
        r#"
[export]
input = "cube.obj"
output = "build/cube.fma"
materials = true

[[material]]
name = "metal"
diffuse = { color = 0x808080FF }
"#,
    );

    let output = run_fma_export(&["check", manifest.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "fma-export check failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let output = run_fma_export(&["build", manifest.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "fma-export build failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let data = std::fs::read(dir.path().join("build").join("cube.fma")).expect("Model missing");
    assert_eq!(decode_header(&data).faces.count, 6);
    assert!(dir.path().join("build").join("default.mtl.fma").exists());

    let metal = std::fs::read(dir.path().join("metal.mtl.fma")).expect("Material missing");
    assert_eq!(&metal[16..20], &[0x80, 0x80, 0x80, 0xFF]);
}

#[test]
fn test_cli_check_rejects_bad_manifest() {
    let dir = tempdir().expect("Failed to create temp dir");
    let manifest = write_fixture(
        dir.path(),
        "fma-export.toml",
        r#"
[export]
input = "missing.obj"
"#,
    );

    let output = run_fma_export(&["check", manifest.to_str().unwrap()]);
    assert!(!output.status.success());
}
