use serde::{Deserialize, Serialize};

/// CPU-side geometry handed to the renderer.
///
/// Flat arrays: three floats per position and normal, two per UV, and a
/// triangle list of indices into them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshBuffers {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn with_capacity(vertices: usize, indices: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices),
            normals: Vec::with_capacity(vertices),
            uvs: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(indices),
        }
    }

    pub fn push_vertex(&mut self, position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
        index
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Drop all geometry and give the allocation back.
    pub fn release(&mut self) {
        *self = Self::default();
    }

    /// Append another mesh, rebasing its indices.
    pub fn append(&mut self, other: &MeshBuffers) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.uvs.extend_from_slice(&other.uvs);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Axis-aligned bounds as (min, max), or None for an empty mesh
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = *self.positions.first()?;
        let mut min = first;
        let mut max = first;

        for p in &self.positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }

        Some((min, max))
    }

    pub fn export_obj(&self, name: &str) -> String {
        let mut obj = String::new();

        obj.push_str("# drivestream mesh\n");
        obj.push_str(&format!("o {}\n\n", name));

        for p in &self.positions {
            obj.push_str(&format!("v {} {} {}\n", p[0], p[1], p[2]));
        }

        obj.push('\n');

        for uv in &self.uvs {
            obj.push_str(&format!("vt {} {}\n", uv[0], uv[1]));
        }

        obj.push('\n');

        for n in &self.normals {
            obj.push_str(&format!("vn {} {} {}\n", n[0], n[1], n[2]));
        }

        obj.push('\n');

        for triangle in self.indices.chunks_exact(3) {
            let i0 = triangle[0] + 1;
            let i1 = triangle[1] + 1;
            let i2 = triangle[2] + 1;

            obj.push_str(&format!(
                "f {}/{}/{} {}/{}/{} {}/{}/{}\n",
                i0, i0, i0, i1, i1, i1, i2, i2, i2
            ));
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshBuffers {
        let mut mesh = MeshBuffers::default();
        let up = [0.0, 1.0, 0.0];
        let a = mesh.push_vertex([0.0, 0.0, 0.0], up, [0.0, 0.0]);
        let b = mesh.push_vertex([1.0, 0.0, 0.0], up, [1.0, 0.0]);
        let c = mesh.push_vertex([0.0, 0.0, 1.0], up, [0.0, 1.0]);
        let d = mesh.push_vertex([1.0, 0.0, 1.0], up, [1.0, 1.0]);
        mesh.push_triangle(a, c, b);
        mesh.push_triangle(b, c, d);
        mesh
    }

    #[test]
    fn test_push_and_counts() {
        let mesh = quad();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.normals.len(), mesh.uvs.len());
    }

    #[test]
    fn test_append_rebases_indices() {
        let mut mesh = quad();
        mesh.append(&quad());
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(&mesh.indices[6..9], &[4, 6, 5]);
    }

    #[test]
    fn test_bounds() {
        assert!(MeshBuffers::default().bounds().is_none());
        let (min, max) = quad().bounds().unwrap();
        assert_eq!(min, [0.0, 0.0, 0.0]);
        assert_eq!(max, [1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_export_obj() {
        let obj = quad().export_obj("road");

        assert!(obj.contains("o road"));
        assert!(obj.contains("v "));
        assert!(obj.contains("vt "));
        assert!(obj.contains("vn "));
        assert!(obj.contains("f 1/1/1 3/3/3 2/2/2"));
    }

    #[test]
    fn test_release() {
        let mut mesh = quad();
        mesh.release();
        assert!(mesh.is_empty());
        assert!(mesh.indices.is_empty());
    }
}
