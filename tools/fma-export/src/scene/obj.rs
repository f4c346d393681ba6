//! Wavefront OBJ/MTL scene loading
//!
//! Every `o` or `g` statement starts a new object with its own mesh. OBJ is
//! Y-up, so positions and normals are turned to the Z-up source convention
//! on load; the exporter's axis conversion then restores the original
//! orientation.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use hashbrown::HashMap;

use super::{newell_normal, Material, Mesh, Object, Scene};
use crate::error::ExportError;

/// A face corner: position index, optional texture coordinate and normal.
type FaceVertex = (usize, Option<usize>, Option<usize>);

/// Parsed OBJ file, before materials are attached.
#[derive(Debug, Clone, Default)]
pub struct ObjDocument {
    /// Libraries named by `mtllib`, relative to the OBJ file
    pub material_libraries: Vec<String>,
    groups: Vec<ObjGroup>,
}

#[derive(Debug, Clone)]
struct ObjGroup {
    name: String,
    mesh: Mesh,
    /// OBJ position index -> mesh position index
    position_map: HashMap<usize, usize>,
    materials: Vec<String>,
    corners_without_normal: usize,
}

impl ObjGroup {
    fn new(name: String) -> Self {
        Self {
            mesh: Mesh::new(name.clone()),
            name,
            position_map: HashMap::new(),
            materials: Vec::new(),
            corners_without_normal: 0,
        }
    }
}

impl ObjDocument {
    /// Number of objects with at least one face
    pub fn object_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| !g.mesh.polygons.is_empty())
            .count()
    }

    /// Build a scene, resolving `usemtl` names against `materials`.
    pub fn into_scene(self, materials: &[Material]) -> Scene {
        let library: HashMap<&str, &Material> =
            materials.iter().map(|m| (m.name.as_str(), m)).collect();
        let mut used_names: HashMap<String, usize> = HashMap::new();
        let mut scene = Scene::new();

        for group in self.groups {
            if group.mesh.polygons.is_empty() {
                tracing::debug!("Skipping object \"{}\" without faces", group.name);
                continue;
            }
            if group.corners_without_normal > 0 {
                tracing::warn!(
                    "Object \"{}\": {} face corners have no normal, using face normals",
                    group.name,
                    group.corners_without_normal
                );
            }

            let name = unique_name(&mut used_names, &group.name);
            let mut mesh = group.mesh;
            mesh.name = name.clone();
            mesh.materials = group
                .materials
                .iter()
                .map(|m| match library.get(m.as_str()) {
                    Some(material) => (*material).clone(),
                    None => {
                        tracing::warn!("Material \"{}\" not found in any MTL library", m);
                        Material::new(m.as_str())
                    }
                })
                .collect();

            scene.push(Object::new(name, Arc::new(mesh)));
        }
        scene
    }
}

/// Blender-style de-duplication: `Cube`, `Cube.001`, `Cube.002`...
fn unique_name(used: &mut HashMap<String, usize>, name: &str) -> String {
    match used.get_mut(name) {
        None => {
            used.insert(name.to_string(), 0);
            name.to_string()
        }
        Some(n) => {
            *n += 1;
            format!("{}.{:03}", name, n)
        }
    }
}

/// Y-up to Z-up: `(x, y, z) -> (x, -z, y)`
fn y_up_to_z_up([x, y, z]: [f32; 3]) -> [f32; 3] {
    [x, -z, y]
}

/// Load an OBJ file and the MTL libraries it references.
pub fn load_obj(path: &Path) -> Result<Scene> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open OBJ: {:?}", path))?;
    let default_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("object");

    let document = parse_obj(&content, default_name)
        .with_context(|| format!("Failed to parse OBJ: {:?}", path))?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut materials = Vec::new();
    for library in &document.material_libraries {
        let mtl_path = base_dir.join(library);
        if !mtl_path.exists() {
            tracing::warn!("MTL library {:?} not found", mtl_path);
            continue;
        }
        let content = std::fs::read_to_string(&mtl_path)
            .with_context(|| format!("Failed to open MTL: {:?}", mtl_path))?;
        let parsed = parse_mtl(&content)
            .with_context(|| format!("Failed to parse MTL: {:?}", mtl_path))?;
        tracing::debug!("Loaded {} materials from {:?}", parsed.len(), mtl_path);
        materials.extend(parsed);
    }

    let scene = document.into_scene(&materials);
    tracing::info!(
        "Loaded OBJ {:?}: {} objects, {} materials",
        path,
        scene.objects.len(),
        materials.len()
    );
    Ok(scene)
}

/// Parse OBJ text. Objects before the first `o`/`g` are named `default_name`.
pub fn parse_obj(content: &str, default_name: &str) -> Result<ObjDocument, ExportError> {
    let mut document = ObjDocument::default();
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut tex_coords: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut material: Option<String> = None;

    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let err = |reason: String| ExportError::Obj {
            line: line_no,
            reason,
        };

        match parts[0] {
            "v" => positions.push(y_up_to_z_up(parse_floats::<3>(&parts[1..]).map_err(err)?)),
            "vt" => tex_coords.push(parse_floats::<2>(&parts[1..]).map_err(err)?),
            "vn" => normals.push(y_up_to_z_up(parse_floats::<3>(&parts[1..]).map_err(err)?)),
            "o" | "g" => {
                let name = if parts.len() > 1 {
                    parts[1..].join(" ")
                } else {
                    default_name.to_string()
                };
                // An object without faces only carried a name so far
                let unused = document
                    .groups
                    .last()
                    .is_some_and(|g| g.mesh.polygons.is_empty());
                if unused {
                    document.groups.pop();
                }
                document.groups.push(ObjGroup::new(name));
            }
            "usemtl" => {
                material = Some(parts[1..].join(" ")).filter(|s| !s.is_empty());
                if material.is_none() {
                    return Err(err("usemtl without a name".to_string()));
                }
            }
            "mtllib" => document
                .material_libraries
                .extend(parts[1..].iter().map(|s| s.to_string())),
            "f" => {
                let corners = parts[1..]
                    .iter()
                    .map(|s| {
                        parse_face_vertex(s, positions.len(), tex_coords.len(), normals.len())
                    })
                    .collect::<Result<Vec<FaceVertex>, String>>()
                    .map_err(err)?;
                if corners.len() < 3 {
                    tracing::warn!("OBJ line {}: skipping face with {} corners", line_no, corners.len());
                    continue;
                }

                if document.groups.is_empty() {
                    document.groups.push(ObjGroup::new(default_name.to_string()));
                }
                let Some(group) = document.groups.last_mut() else {
                    continue;
                };
                add_face(group, &corners, &positions, &tex_coords, &normals);
                if let Some(name) = &material {
                    if !group.materials.contains(name) {
                        group.materials.push(name.clone());
                    }
                }
            }
            other => tracing::trace!("OBJ line {}: ignoring '{}'", line_no, other),
        }
    }

    Ok(document)
}

fn add_face(
    group: &mut ObjGroup,
    corners: &[FaceVertex],
    positions: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
    normals: &[[f32; 3]],
) {
    let points: Vec<[f32; 3]> = corners.iter().map(|(v, _, _)| positions[*v]).collect();
    let face_normal = newell_normal(&points);

    let mut face = Vec::with_capacity(corners.len());
    for &(v, vt, vn) in corners {
        let vertex = *group.position_map.entry(v).or_insert_with(|| {
            group.mesh.positions.push(positions[v]);
            group.mesh.positions.len() - 1
        });
        let normal = match vn {
            Some(n) => normals[n],
            None => {
                group.corners_without_normal += 1;
                face_normal
            }
        };
        face.push((vertex, normal, vt.map(|t| tex_coords[t])));
    }
    group.mesh.add_face(&face);
}

fn parse_floats<const N: usize>(parts: &[&str]) -> Result<[f32; N], String> {
    if parts.len() < N {
        return Err(format!("expected {} numbers, found {}", N, parts.len()));
    }
    let mut out = [0.0f32; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("'{}' is not a number", part))?;
    }
    Ok(out)
}

/// Resolve a 1-based or negative (relative) OBJ index against `len` elements.
fn resolve_index(raw: &str, len: usize, what: &str) -> Result<usize, String> {
    let index: i64 = raw
        .parse()
        .map_err(|_| format!("'{}' is not a valid {} index", raw, what))?;
    let resolved = match index {
        0 => return Err(format!("{} index 0 is invalid (OBJ indices start at 1)", what)),
        i if i > 0 => i - 1,
        i => len as i64 + i,
    };
    if resolved < 0 || resolved >= len as i64 {
        return Err(format!("{} index {} out of range ({} defined)", what, index, len));
    }
    Ok(resolved as usize)
}

/// Parse OBJ vertex reference: "v", "v/vt", "v/vt/vn", or "v//vn"
fn parse_face_vertex(
    s: &str,
    positions: usize,
    tex_coords: usize,
    normals: usize,
) -> Result<FaceVertex, String> {
    let parts: Vec<&str> = s.split('/').collect();
    let v = resolve_index(parts[0], positions, "position")?;
    let vt = match parts.get(1).filter(|s| !s.is_empty()) {
        Some(raw) => Some(resolve_index(raw, tex_coords, "texture coordinate")?),
        None => None,
    };
    let vn = match parts.get(2).filter(|s| !s.is_empty()) {
        Some(raw) => Some(resolve_index(raw, normals, "normal")?),
        None => None,
    };
    Ok((v, vt, vn))
}

/// Parse MTL text into materials.
pub fn parse_mtl(content: &str) -> Result<Vec<Material>, ExportError> {
    let mut materials: Vec<Material> = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let err = |reason: String| ExportError::Mtl {
            line: line_no,
            reason,
        };

        if parts[0] == "newmtl" {
            if parts.len() < 2 {
                return Err(err("newmtl without a name".to_string()));
            }
            materials.push(Material::new(parts[1..].join(" ")));
            continue;
        }

        let Some(current) = materials.last_mut() else {
            return Err(err(format!("'{}' before any newmtl", parts[0])));
        };
        match parts[0] {
            "Kd" => {
                let [r, g, b] = parse_floats::<3>(&parts[1..]).map_err(err)?;
                current.diffuse_color = [r, g, b, current.diffuse_color[3]];
            }
            "Ks" => current.specular_color = parse_floats::<3>(&parts[1..]).map_err(err)?,
            "Ke" => current.emission_color = parse_floats::<3>(&parts[1..]).map_err(err)?,
            "Ns" => current.specular_exponent = parse_floats::<1>(&parts[1..]).map_err(err)?[0],
            "d" => {
                let [d] = parse_floats::<1>(&parts[1..]).map_err(err)?;
                current.diffuse_color[3] = d;
                current.transparent = d < 1.0;
            }
            "Tr" => {
                let [tr] = parse_floats::<1>(&parts[1..]).map_err(err)?;
                current.diffuse_color[3] = 1.0 - tr;
                current.transparent = tr > 0.0;
            }
            "map_Kd" | "map_Ks" | "map_Ke" | "map_Bump" | "map_bump" | "bump" | "norm" => {
                // Options such as `-bm 1.0` come before the file name
                let Some(path) = parts.last().filter(|_| parts.len() > 1) else {
                    return Err(err(format!("'{}' without a texture path", parts[0])));
                };
                let path = Some(path.to_string());
                match parts[0] {
                    "map_Kd" => current.diffuse_texture = path,
                    "map_Ks" => current.specular_texture = path,
                    "map_Ke" => current.emissive_texture = path,
                    _ => current.normal_texture = path,
                }
            }
            other => tracing::trace!("MTL line {}: ignoring '{}'", line_no, other),
        }
    }

    Ok(materials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MeshSource, SceneSource};

    const QUAD: &str = "\
# quad
mtllib quad.mtl
o Quad
v 0 0 0
v 1 0 0
v 1 0 -1
v 0 0 -1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 1 0
usemtl Red
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn test_parse_quad() {
        let document = parse_obj(QUAD, "fallback").unwrap();
        assert_eq!(document.material_libraries, vec!["quad.mtl".to_string()]);
        assert_eq!(document.object_count(), 1);

        let scene = document.into_scene(&[Material::new("Red")]);
        let objects = scene.objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name(), "Quad");

        let mesh = objects[0].mesh();
        assert_eq!(mesh.positions().len(), 4);
        assert_eq!(mesh.polygons().len(), 1);
        assert_eq!(mesh.polygons()[0].loop_total, 4);
        assert_eq!(mesh.uv_layer_count(), 1);
        assert_eq!(mesh.loop_uv(2), Some([1.0, 1.0]));
        assert_eq!(mesh.materials().len(), 1);
        assert_eq!(mesh.materials()[0].name, "Red");

        // Y-up (0, 1, 0) becomes Z-up (0, 0, 1)
        assert_eq!(mesh.loops()[0].normal, [0.0, -0.0, 1.0]);
        // (1, 0, -1) becomes (1, 1, 0)
        assert_eq!(mesh.positions()[2], [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_negative_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let scene = parse_obj(obj, "tri").unwrap().into_scene(&[]);
        let objects = scene.objects();
        assert_eq!(objects[0].name(), "tri");
        let loops = objects[0].mesh().loops();
        assert_eq!(loops.iter().map(|l| l.vertex).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_missing_normals_use_face_normal() {
        // Counter-clockwise in the XY plane facing +Z in Y-up space
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let scene = parse_obj(obj, "tri").unwrap().into_scene(&[]);
        let mesh = scene.objects[0].mesh.clone();
        let face_normal = mesh.polygons[0].normal;
        assert!(mesh.loops.iter().all(|l| l.normal == face_normal));
        assert_eq!(mesh.uv_layer_count(), 0);
    }

    #[test]
    fn test_shared_positions_within_object() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3\nf 1 3 4\n";
        let scene = parse_obj(obj, "quad").unwrap().into_scene(&[]);
        let mesh = &scene.objects[0].mesh;
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.polygons.len(), 2);
        assert_eq!(mesh.loops[3].vertex, 0);
    }

    #[test]
    fn test_groups_and_duplicate_names() {
        let obj = "\
v 0 0 0
v 1 0 0
v 0 1 0
o A
f 1 2 3
o A
f 1 2 3
g
o Empty
";
        let scene = parse_obj(obj, "file").unwrap().into_scene(&[]);
        let names: Vec<&str> = scene.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["A", "A.001"]);
        assert_eq!(scene.objects[1].mesh.name, "A.001");
    }

    #[test]
    fn test_two_materials_in_one_object() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl a\nf 1 2 3\nusemtl b\nf 3 2 1\n";
        let scene = parse_obj(obj, "x").unwrap().into_scene(&[]);
        // Unknown names still become materials; the exporter rejects the mesh
        assert_eq!(scene.objects[0].mesh.materials.len(), 2);
    }

    #[test]
    fn test_bad_index() {
        let err = parse_obj("v 0 0 0\nf 1 2 3\n", "x").unwrap_err();
        assert!(matches!(err, ExportError::Obj { line: 2, .. }));
        let err = parse_obj("v 0 0 0\nv 0 0 0\nv 0 0 0\nf 0 1 2\n", "x").unwrap_err();
        assert!(matches!(err, ExportError::Obj { line: 4, .. }));
        let err = parse_obj("v 0 zero 0\n", "x").unwrap_err();
        assert!(matches!(err, ExportError::Obj { line: 1, .. }));
    }

    #[test]
    fn test_parse_mtl() {
        let mtl = "\
newmtl Glass
Kd 0.1 0.2 0.3
Ks 1 1 1
Ke 0 0 0.5
Ns 96.0
d 0.25
map_Kd glass.png
map_Bump -bm 0.5 glass_normal.png

newmtl Plain
Tr 0
";
        let materials = parse_mtl(mtl).unwrap();
        assert_eq!(materials.len(), 2);
        let glass = &materials[0];
        assert_eq!(glass.name, "Glass");
        assert_eq!(glass.diffuse_color, [0.1, 0.2, 0.3, 0.25]);
        assert_eq!(glass.specular_color, [1.0, 1.0, 1.0]);
        assert_eq!(glass.emission_color, [0.0, 0.0, 0.5]);
        assert_eq!(glass.specular_exponent, 96.0);
        assert!(glass.transparent);
        assert_eq!(glass.diffuse_texture.as_deref(), Some("glass.png"));
        assert_eq!(glass.normal_texture.as_deref(), Some("glass_normal.png"));

        let plain = &materials[1];
        assert!(!plain.transparent);
        assert_eq!(plain.diffuse_color[3], 1.0);
    }

    #[test]
    fn test_mtl_statement_before_newmtl() {
        assert!(matches!(
            parse_mtl("Kd 1 1 1\n"),
            Err(ExportError::Mtl { line: 1, .. })
        ));
    }
}
