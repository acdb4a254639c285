//! Cube geometry and camera transform
//!
//! Vertex layout fed to the fixed pipeline, the colored cube written into the
//! vertex buffer, and the model-view-projection matrix written into the
//! uniform buffer.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Point3, Vector3};

/// Vertex with homogeneous position and RGBA color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position, `w == 1`
    pub position: [f32; 4],
    /// Linear RGBA color
    pub color: [f32; 4],
}

impl Vertex {
    /// Binding 0, advanced per vertex
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Position at location 0, color at location 1
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32A32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32A32_SFLOAT,
                offset: 16,
            },
        ]
    }
}

// Corner indices per face, counter-clockwise seen from outside
const FACES: [([usize; 4], [f32; 4]); 6] = [
    ([1, 3, 7, 5], [1.0, 0.0, 0.0, 1.0]), // +x
    ([0, 4, 6, 2], [0.0, 1.0, 1.0, 1.0]), // -x
    ([2, 6, 7, 3], [0.0, 1.0, 0.0, 1.0]), // +y
    ([0, 1, 5, 4], [1.0, 0.0, 1.0, 1.0]), // -y
    ([4, 5, 7, 6], [0.0, 0.0, 1.0, 1.0]), // +z
    ([0, 2, 3, 1], [1.0, 1.0, 0.0, 1.0]), // -z
];

fn corner(index: usize) -> [f32; 4] {
    let axis = |bit: usize| if index & bit != 0 { 1.0 } else { -1.0 };
    [axis(1), axis(2), axis(4), 1.0]
}

/// Unit cube centered on the origin as a triangle list, one color per face
pub fn cube_vertices() -> Vec<Vertex> {
    FACES
        .iter()
        .flat_map(|&([a, b, c, d], color)| {
            [a, b, c, a, c, d].map(|index| Vertex {
                position: corner(index),
                color,
            })
        })
        .collect()
}

/// Matrix uploaded to uniform binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UniformData {
    /// Column-major model-view-projection matrix
    pub mvp: [[f32; 4]; 4],
}

impl UniformData {
    /// Pack a matrix in the column-major order the shader expects
    pub fn from_matrix(matrix: &Matrix4<f32>) -> Self {
        let mut mvp = [[0.0; 4]; 4];
        for (column, out) in mvp.iter_mut().enumerate() {
            for (row, value) in out.iter_mut().enumerate() {
                *value = matrix[(row, column)];
            }
        }
        Self { mvp }
    }
}

/// Fixed camera looking at the cube
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Eye position
    pub eye: Point3<f32>,
    /// Point looked at
    pub target: Point3<f32>,
    /// Up direction
    pub up: Vector3<f32>,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Point3::new(-5.0, 3.0, -10.0),
            target: Point3::origin(),
            up: Vector3::y(),
            fov_y: 45f32.to_radians(),
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Maps GL-style clip space (y up, z in [-1, 1]) to Vulkan's (y down, z in [0, 1])
pub fn vulkan_clip() -> Matrix4<f32> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0, //
        0.0, -1.0, 0.0, 0.0, //
        0.0, 0.0, 0.5, 0.5, //
        0.0, 0.0, 0.0, 1.0,
    )
}

impl Camera {
    /// Projection for a drawable of `extent`
    pub fn projection(&self, extent: vk::Extent2D) -> Matrix4<f32> {
        let aspect = extent.width.max(1) as f32 / extent.height.max(1) as f32;
        vulkan_clip() * Matrix4::new_perspective(aspect, self.fov_y, self.near, self.far)
    }

    /// World-to-eye transform
    pub fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.eye, &self.target, &self.up)
    }

    /// Full transform for a model matrix
    pub fn model_view_projection(&self, model: &Matrix4<f32>, extent: vk::Extent2D) -> Matrix4<f32> {
        self.projection(extent) * self.view() * model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    fn xyz(v: &Vertex) -> Vector3<f32> {
        Vector3::new(v.position[0], v.position[1], v.position[2])
    }

    #[test]
    fn test_cube_is_36_vertices_of_unit_corners() {
        let vertices = cube_vertices();
        assert_eq!(vertices.len(), 36);
        for v in &vertices {
            assert_eq!(v.position[3], 1.0);
            assert!(v.position[..3].iter().all(|c| c.abs() == 1.0));
        }
    }

    #[test]
    fn test_cube_triangles_face_outward() {
        for triangle in cube_vertices().chunks(3) {
            let (a, b, c) = (xyz(&triangle[0]), xyz(&triangle[1]), xyz(&triangle[2]));
            let normal = (b - a).cross(&(c - a));
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(&centroid) > 0.0, "inward triangle {a:?} {b:?} {c:?}");
        }
    }

    #[test]
    fn test_vertex_layout_matches_struct() {
        assert_eq!(Vertex::binding_description().stride, 32);
        let [position, color] = Vertex::attribute_descriptions();
        assert_eq!(position.offset, 0);
        assert_eq!(color.offset, 16);
        assert_eq!(bytemuck::cast_slice::<Vertex, u8>(&cube_vertices()).len(), 36 * 32);
    }

    #[test]
    fn test_clip_flips_y_and_halves_depth() {
        let clip = vulkan_clip();
        let near = clip * Vector4::new(0.25, 0.5, -1.0, 1.0);
        let far = clip * Vector4::new(0.0, 0.0, 1.0, 1.0);

        assert_relative_eq!(near.x, 0.25);
        assert_relative_eq!(near.y, -0.5);
        assert_relative_eq!(near.z, 0.0);
        assert_relative_eq!(far.z, 1.0);
    }

    #[test]
    fn test_target_projects_to_screen_center() {
        let camera = Camera::default();
        let extent = vk::Extent2D { width: 800, height: 640 };
        let mvp = camera.model_view_projection(&Matrix4::identity(), extent);

        let clip = mvp * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_uniform_data_is_column_major() {
        let matrix = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        let data = UniformData::from_matrix(&matrix);

        assert_eq!(data.mvp[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(data.mvp[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(bytemuck::bytes_of(&data).len(), 64);
    }
}
