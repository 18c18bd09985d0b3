//! Forward mesh pass
//!
//! Draws every visible mesh, light helper and axes node with the camera and
//! light uniforms, sampling the material's uploaded texture. When a visible
//! directional light casts shadows, a depth-only pass from that light runs
//! first and the main pass filters against it.
//!
//! Tessellated meshes are cached per node and rebuilt only when the node's
//! geometry descriptor changes.

use std::{collections::HashMap, mem::size_of, num::NonZeroU64, ops::Range};

use bytemuck::Zeroable;
use cgmath::{EuclideanSpace, InnerSpace, Matrix, Matrix4, Point3, SquareMatrix, Vector3};
use wgpu::util::DeviceExt;

use crate::gfx::{
    camera::{perspective::OPENGL_TO_WGPU_MATRIX, PerspectiveCamera},
    resources::{TextureData, TextureId, TextureResource},
    scene::{
        Color, Geometry, LightKind, Material, MaterialKind, NodeContent, NodeId, Scene, ShadowCamera,
        ShadowSettings,
    },
};

use super::mesh::{MeshData, Vertex3D};

pub const MAX_LIGHTS: usize = 8;

/// Byte distance between per-draw uniforms; the minimum dynamic offset alignment
const DRAW_STRIDE: u64 = 256;
const INITIAL_DRAW_SLOTS: u64 = 64;

const MODE_UNLIT: f32 = 0.0;
const MODE_LIT: f32 = 1.0;
const MODE_MATCAP: f32 = 2.0;
const MODE_NORMAL: f32 = 3.0;

const AXIS_COLORS: [Color; 3] = [
    Color::new(1.0, 0.0, 0.0),
    Color::new(0.0, 1.0, 0.0),
    Color::new(0.0, 0.0, 1.0),
];

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// w: 0 directional, 1 positional
    pub position: [f32; 4],
    /// rgb * intensity, w: range (0 = unlimited)
    pub color: [f32; 4],
    /// Direction the light travels; w: decay, or 1 for the shadowed directional light
    pub direction: [f32; 4],
}

/// Per-frame uniforms, must match `Globals` in shader.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalUniform {
    view_proj: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    view_position: [f32; 4],
    ambient: [f32; 4],
    sky: [f32; 4],
    ground: [f32; 4],
    shadow: [f32; 4],
    light_count: [u32; 4],
    lights: [LightUniform; MAX_LIGHTS],
}

/// Per-draw uniforms, must match `Draw` in shader.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniform {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    color: [f32; 4],
    params: [f32; 4],
}

impl DrawUniform {
    fn new(model: Matrix4<f32>, color: Color, opacity: f32, mode: f32, textured: bool) -> Self {
        // Inverse transpose keeps normals perpendicular under non-uniform scale
        let normal_matrix = model.invert().map(|m| m.transpose()).unwrap_or(model);
        let [r, g, b] = color.to_array();
        Self {
            model: model.into(),
            normal_matrix: normal_matrix.into(),
            color: [r, g, b, opacity],
            params: [mode, if textured { 1.0 } else { 0.0 }, 1.0, 0.0],
        }
    }

    fn with_surface(mut self, roughness: f32, metalness: f32) -> Self {
        self.params[2] = roughness;
        self.params[3] = metalness;
        self
    }
}

/// The shadow-casting light of a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSource {
    pub view_proj: Matrix4<f32>,
    pub settings: ShadowSettings,
}

/// Visible lights of one frame, packed for the shader
///
/// Spot lights are shaded as point lights and rect area lights as point
/// lights scaled by their area.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameLights {
    pub ambient: [f32; 3],
    pub sky: [f32; 3],
    pub ground: [f32; 3],
    pub lights: Vec<LightUniform>,
    pub shadow: Option<ShadowSource>,
}

impl FrameLights {
    pub fn gather(scene: &Scene) -> Self {
        let mut frame = FrameLights::default();
        for id in scene.visible_nodes() {
            let Some(node) = scene.node(id) else { continue };
            let Some(light) = node.light_ref() else { continue };
            let Some(world) = scene.world_matrix(id) else { continue };

            let radiance = light.color.to_array().map(|c| c * light.intensity);
            let position = world.w.truncate();
            let full = frame.lights.len() >= MAX_LIGHTS;

            let packed = match light.kind {
                LightKind::Ambient => {
                    accumulate(&mut frame.ambient, radiance);
                    None
                }
                LightKind::Hemisphere { ground } => {
                    accumulate(&mut frame.sky, radiance);
                    accumulate(&mut frame.ground, ground.to_array().map(|c| c * light.intensity));
                    None
                }
                LightKind::Directional => {
                    let shadowed = light.cast_shadow && frame.shadow.is_none() && !full;
                    if shadowed {
                        frame.shadow = Some(ShadowSource {
                            view_proj: shadow_view_projection(position, &light.shadow.camera),
                            settings: light.shadow,
                        });
                    }
                    let direction: [f32; 3] = direction_to_origin(position).into();
                    Some(LightUniform {
                        position: [0.0; 4],
                        color: extend(radiance, 0.0),
                        direction: extend(direction, if shadowed { 1.0 } else { 0.0 }),
                    })
                }
                LightKind::Point { distance, decay } => Some(positional(position, radiance, distance, decay)),
                LightKind::Spot { .. } => Some(positional(position, radiance, 0.0, 2.0)),
                LightKind::RectArea { width, height } => {
                    let area = (width * height).abs();
                    Some(positional(position, radiance.map(|c| c * area), 0.0, 2.0))
                }
            };

            if let Some(packed) = packed {
                if full {
                    log::debug!("more than {MAX_LIGHTS} lights, '{}' not shaded", node.name);
                } else {
                    frame.lights.push(packed);
                }
            }
        }
        frame
    }

    fn uniform(&self, camera: &PerspectiveCamera) -> GlobalUniform {
        let mut lights = [LightUniform::zeroed(); MAX_LIGHTS];
        for (slot, light) in lights.iter_mut().zip(&self.lights) {
            *slot = *light;
        }
        let (light_view_proj, shadow) = match &self.shadow {
            Some(source) => (
                source.view_proj,
                [
                    1.0,
                    source.settings.bias,
                    source.settings.radius,
                    1.0 / source.settings.effective_map_size() as f32,
                ],
            ),
            None => (Matrix4::identity(), [0.0; 4]),
        };
        let eye = camera.eye();

        GlobalUniform {
            view_proj: camera.build_view_projection_matrix().into(),
            view: camera.view_matrix().into(),
            light_view_proj: light_view_proj.into(),
            view_position: [eye.x, eye.y, eye.z, 1.0],
            ambient: extend(self.ambient, 0.0),
            sky: extend(self.sky, 0.0),
            ground: extend(self.ground, 0.0),
            shadow,
            light_count: [self.lights.len() as u32, 0, 0, 0],
            lights,
        }
    }
}

/// Light-space projection for a directional light at `position` aimed at the origin
pub fn shadow_view_projection(position: Vector3<f32>, camera: &ShadowCamera) -> Matrix4<f32> {
    let direction = direction_to_origin(position);
    let eye = if position.magnitude2() > f32::EPSILON {
        Point3::from_vec(position)
    } else {
        Point3::from_vec(-direction)
    };
    let up = if direction.y.abs() > 0.99 {
        Vector3::unit_z()
    } else {
        Vector3::unit_y()
    };
    OPENGL_TO_WGPU_MATRIX * camera.projection() * Matrix4::look_to_rh(eye, direction, up)
}

fn direction_to_origin(position: Vector3<f32>) -> Vector3<f32> {
    if position.magnitude2() > f32::EPSILON {
        -position.normalize()
    } else {
        -Vector3::unit_y()
    }
}

fn positional(position: Vector3<f32>, radiance: [f32; 3], range: f32, decay: f32) -> LightUniform {
    LightUniform {
        position: [position.x, position.y, position.z, 1.0],
        color: extend(radiance, range.max(0.0)),
        direction: [0.0, 0.0, 0.0, decay.max(0.0)],
    }
}

fn accumulate(total: &mut [f32; 3], add: [f32; 3]) {
    for (t, a) in total.iter_mut().zip(add) {
        *t += a;
    }
}

fn extend([x, y, z]: [f32; 3], w: f32) -> [f32; 4] {
    [x, y, z, w]
}

/// Shader mode and the texture it samples
fn material_mode(material: &Material) -> (f32, Option<TextureId>) {
    match material.kind {
        MaterialKind::Basic => (MODE_UNLIT, material.map),
        MaterialKind::Standard => (MODE_LIT, material.map),
        MaterialKind::Matcap => match material.matcap {
            Some(matcap) => (MODE_MATCAP, Some(matcap)),
            None => (MODE_LIT, material.map),
        },
        MaterialKind::Normal => (MODE_NORMAL, None),
    }
}

/// What a cached GPU mesh was built from
#[derive(Debug, PartialEq)]
enum MeshKey {
    Geometry(Geometry),
    Axes(f32),
}

#[derive(Clone, Copy)]
enum MeshSource<'a> {
    Geometry(&'a Geometry),
    Axes(f32),
}

impl MeshSource<'_> {
    fn matches(&self, key: &MeshKey) -> bool {
        match (self, key) {
            (MeshSource::Geometry(geometry), MeshKey::Geometry(built)) => *geometry == built,
            (MeshSource::Axes(size), MeshKey::Axes(built)) => size == built,
            _ => false,
        }
    }

    fn key(&self) -> MeshKey {
        match self {
            MeshSource::Geometry(geometry) => MeshKey::Geometry((*geometry).clone()),
            MeshSource::Axes(size) => MeshKey::Axes(*size),
        }
    }

    fn tessellate(&self) -> MeshData {
        match self {
            MeshSource::Geometry(geometry) => MeshData::from_geometry(geometry),
            MeshSource::Axes(size) => MeshData::axes(*size),
        }
    }
}

struct GpuMesh {
    vertices: wgpu::Buffer,
    triangles: Option<(wgpu::Buffer, u32)>,
    lines: Option<(wgpu::Buffer, u32)>,
}

impl GpuMesh {
    /// `None` for meshes without vertices
    fn upload(device: &wgpu::Device, data: &MeshData) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = |indices: &[u32], label: &str| {
            (!indices.is_empty()).then(|| {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                (buffer, indices.len() as u32)
            })
        };
        Some(Self {
            vertices,
            triangles: index_buffer(&data.indices, "Index Buffer"),
            lines: index_buffer(&data.lines, "Line Index Buffer"),
        })
    }

    fn counts(&self) -> (u32, u32) {
        (
            self.triangles.as_ref().map_or(0, |(_, n)| *n),
            self.lines.as_ref().map_or(0, |(_, n)| *n),
        )
    }
}

struct CachedMesh {
    key: MeshKey,
    gpu: Option<GpuMesh>,
}

struct BoundTexture {
    resource: TextureResource,
    bind_group: wgpu::BindGroup,
}

struct DrawCall {
    node: NodeId,
    lines: bool,
    range: Range<u32>,
    slot: u32,
    texture: Option<TextureId>,
    transparent: bool,
    casts_shadow: bool,
}

/// Draw list of one frame, produced by [`MeshPass::prepare`]
pub struct PreparedFrame {
    draws: Vec<DrawCall>,
    shadowed: bool,
}

impl PreparedFrame {
    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }
}

pub struct MeshPass {
    fill_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,

    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,

    draw_layout: wgpu::BindGroupLayout,
    draw_buffer: wgpu::Buffer,
    draw_bind_group: wgpu::BindGroup,
    draw_slots: u64,

    texture_layout: wgpu::BindGroupLayout,
    white_group: wgpu::BindGroup,
    textures: HashMap<TextureId, BoundTexture>,

    shadow_layout: wgpu::BindGroupLayout,
    shadow_map: TextureResource,
    shadow_group: wgpu::BindGroup,
    shadow_size: u32,

    depth_texture: TextureResource,
    meshes: HashMap<NodeId, CachedMesh>,
}

impl MeshPass {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Globals Bind Group Layout"),
            entries: &[uniform_entry(false, size_of::<GlobalUniform>())],
        });
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Bind Group Layout"),
            entries: &[uniform_entry(true, size_of::<DrawUniform>())],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Globals Uniform Buffer"),
            size: size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals Bind Group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });
        let (draw_buffer, draw_bind_group) = draw_buffer(device, &draw_layout, INITIAL_DRAW_SLOTS);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });
        let main_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&globals_layout, &draw_layout, &texture_layout, &shadow_layout],
            push_constant_ranges: &[],
        });
        let shadow_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&globals_layout, &draw_layout],
            push_constant_ranges: &[],
        });

        let fill_pipeline = mesh_pipeline(
            device,
            &main_layout,
            &shader,
            format,
            wgpu::PrimitiveTopology::TriangleList,
        );
        let line_pipeline =
            mesh_pipeline(device, &main_layout, &shader, format, wgpu::PrimitiveTopology::LineList);
        let shadow_pipeline = shadow_pipeline(device, &shadow_pipeline_layout, &shader);

        let white = TextureResource::upload(device, queue, &TextureData::solid("white", Color::WHITE));
        let white_group = texture_bind_group(device, &texture_layout, &white);

        let shadow_size = ShadowSettings::default().effective_map_size();
        let shadow_map = TextureResource::create_shadow_map(device, shadow_size);
        let shadow_group = shadow_bind_group(device, &shadow_layout, &shadow_map);

        Self {
            fill_pipeline,
            line_pipeline,
            shadow_pipeline,
            globals_buffer,
            globals_bind_group,
            draw_layout,
            draw_buffer,
            draw_bind_group,
            draw_slots: INITIAL_DRAW_SLOTS,
            texture_layout,
            white_group,
            textures: HashMap::new(),
            shadow_layout,
            shadow_map,
            shadow_group,
            shadow_size,
            depth_texture: TextureResource::create_depth_texture(device, width, height, "Depth Texture"),
            meshes: HashMap::new(),
        }
    }

    /// Recreates the depth buffer for a new swap-chain size
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_texture = TextureResource::create_depth_texture(device, width, height, "Depth Texture");
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureResource> {
        self.textures.get(&id).map(|bound| &bound.resource)
    }

    fn upload_textures(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, scene: &Scene) {
        for (id, data) in scene.textures() {
            if self.textures.contains_key(&id) {
                continue;
            }
            log::debug!("uploading {} ({}x{})", data.source, data.width, data.height);
            let resource = TextureResource::upload(device, queue, data);
            let bind_group = texture_bind_group(device, &self.texture_layout, &resource);
            self.textures.insert(id, BoundTexture { resource, bind_group });
        }
    }

    fn ensure_shadow_map(&mut self, device: &wgpu::Device, size: u32) {
        if size == self.shadow_size {
            return;
        }
        log::debug!("shadow map resized to {size}x{size}");
        self.shadow_map = TextureResource::create_shadow_map(device, size);
        self.shadow_group = shadow_bind_group(device, &self.shadow_layout, &self.shadow_map);
        self.shadow_size = size;
    }

    /// Triangle and line index counts of a node's mesh, tessellating on change
    fn ensure_mesh(&mut self, device: &wgpu::Device, id: NodeId, source: MeshSource<'_>) -> Option<(u32, u32)> {
        let stale = self
            .meshes
            .get(&id)
            .map_or(true, |cached| !source.matches(&cached.key));
        if stale {
            let data = source.tessellate();
            log::debug!(
                "tessellated {id}: {} vertices, {} triangles",
                data.vertices.len(),
                data.indices.len() / 3
            );
            let gpu = GpuMesh::upload(device, &data);
            self.meshes.insert(id, CachedMesh { key: source.key(), gpu });
        }
        self.meshes.get(&id)?.gpu.as_ref().map(GpuMesh::counts)
    }

    /// Uploads new textures and meshes, writes uniforms and builds the draw list
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &Scene,
        camera: &PerspectiveCamera,
    ) -> PreparedFrame {
        self.upload_textures(device, queue, scene);
        self.meshes.retain(|id, _| scene.contains(*id));

        let lights = FrameLights::gather(scene);
        if let Some(shadow) = &lights.shadow {
            self.ensure_shadow_map(device, shadow.settings.effective_map_size());
        }
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&lights.uniform(camera)));

        let fallback = Material::default();
        let mut uniforms = Vec::new();
        let mut draws = Vec::new();

        for id in scene.visible_nodes() {
            let Some(node) = scene.node(id) else { continue };
            let Some(world) = scene.world_matrix(id) else { continue };

            match &node.content {
                NodeContent::Mesh { geometry, material } => {
                    let material = scene.material(*material).unwrap_or(&fallback);
                    let Some((triangles, lines)) = self.ensure_mesh(device, id, MeshSource::Geometry(geometry)) else {
                        continue;
                    };
                    let range = if material.wireframe { 0..lines } else { 0..triangles };
                    if range.is_empty() {
                        continue;
                    }
                    let (mode, texture) = material_mode(material);
                    let texture = texture.filter(|t| self.textures.contains_key(t));
                    draws.push(DrawCall {
                        node: id,
                        lines: material.wireframe,
                        range,
                        slot: uniforms.len() as u32,
                        texture,
                        transparent: material.is_transparent(),
                        casts_shadow: !material.wireframe,
                    });
                    uniforms.push(
                        DrawUniform::new(world, material.color, material.opacity, mode, texture.is_some())
                            .with_surface(material.roughness, material.metalness),
                    );
                }
                NodeContent::LightHelper { light, size } => {
                    let Some(light_node) = scene.node(*light) else { continue };
                    let Some(light_data) = light_node.light_ref() else { continue };
                    let Some(light_world) = scene.world_matrix(*light) else { continue };
                    let outline = light_data.helper_geometry(*size);
                    let Some((_, lines)) = self.ensure_mesh(device, id, MeshSource::Geometry(&outline)) else {
                        continue;
                    };
                    draws.push(line_draw(id, 0..lines, uniforms.len()));
                    uniforms.push(DrawUniform::new(light_world, light_data.color, 1.0, MODE_UNLIT, false));
                }
                NodeContent::Axes { size } => {
                    if self.ensure_mesh(device, id, MeshSource::Axes(*size)).is_none() {
                        continue;
                    }
                    for (axis, color) in AXIS_COLORS.iter().enumerate() {
                        let start = axis as u32 * 2;
                        draws.push(line_draw(id, start..start + 2, uniforms.len()));
                        uniforms.push(DrawUniform::new(world, *color, 1.0, MODE_UNLIT, false));
                    }
                }
                NodeContent::Group | NodeContent::Light(_) => {}
            }
        }

        self.write_draw_uniforms(device, queue, &uniforms);
        // Stable, so opaque draws keep scene order ahead of transparent ones
        draws.sort_by_key(|draw| draw.transparent);

        PreparedFrame {
            draws,
            shadowed: lights.shadow.is_some(),
        }
    }

    fn write_draw_uniforms(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, uniforms: &[DrawUniform]) {
        if uniforms.is_empty() {
            return;
        }
        let needed = uniforms.len() as u64;
        if needed > self.draw_slots {
            let slots = needed.next_power_of_two();
            log::debug!("draw uniform buffer grown to {slots} slots");
            (self.draw_buffer, self.draw_bind_group) = draw_buffer(device, &self.draw_layout, slots);
            self.draw_slots = slots;
        }

        let mut bytes = vec![0u8; (needed * DRAW_STRIDE) as usize];
        for (i, uniform) in uniforms.iter().enumerate() {
            let start = i * DRAW_STRIDE as usize;
            bytes[start..start + size_of::<DrawUniform>()].copy_from_slice(bytemuck::bytes_of(uniform));
        }
        queue.write_buffer(&self.draw_buffer, 0, &bytes);
    }

    /// Records the shadow pass (if any) and the main pass into `encoder`
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        clear: wgpu::Color,
        frame: &PreparedFrame,
    ) {
        if frame.shadowed {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Depth Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            shadow_pass.set_pipeline(&self.shadow_pipeline);
            shadow_pass.set_bind_group(0, &self.globals_bind_group, &[]);
            for draw in frame.draws.iter().filter(|d| d.casts_shadow) {
                self.draw(&mut shadow_pass, draw, false);
            }
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Main Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_bind_group(0, &self.globals_bind_group, &[]);
        render_pass.set_bind_group(3, &self.shadow_group, &[]);

        let mut current_lines = None;
        for draw in &frame.draws {
            if current_lines != Some(draw.lines) {
                let pipeline = if draw.lines {
                    &self.line_pipeline
                } else {
                    &self.fill_pipeline
                };
                render_pass.set_pipeline(pipeline);
                current_lines = Some(draw.lines);
            }
            self.draw(&mut render_pass, draw, true);
        }
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>, draw: &DrawCall, with_texture: bool) {
        let Some(mesh) = self.meshes.get(&draw.node).and_then(|cached| cached.gpu.as_ref()) else {
            return;
        };
        let indices = if draw.lines { &mesh.lines } else { &mesh.triangles };
        let Some((indices, _)) = indices else { return };

        pass.set_bind_group(1, &self.draw_bind_group, &[draw.slot * DRAW_STRIDE as u32]);
        if with_texture {
            let group = draw
                .texture
                .and_then(|id| self.textures.get(&id))
                .map_or(&self.white_group, |bound| &bound.bind_group);
            pass.set_bind_group(2, group, &[]);
        }
        pass.set_vertex_buffer(0, mesh.vertices.slice(..));
        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(draw.range.clone(), 0, 0..1);
    }
}

fn line_draw(node: NodeId, range: Range<u32>, slot: usize) -> DrawCall {
    DrawCall {
        node,
        lines: true,
        range,
        slot: slot as u32,
        texture: None,
        transparent: false,
        casts_shadow: false,
    }
}

fn uniform_entry(dynamic: bool, size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(size as u64),
        },
        count: None,
    }
}

fn draw_buffer(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, slots: u64) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Draw Uniform Buffer"),
        size: slots * DRAW_STRIDE,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Draw Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(size_of::<DrawUniform>() as u64),
            }),
        }],
    });
    (buffer, bind_group)
}

fn texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &TextureResource,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Texture Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            },
        ],
    })
}

fn shadow_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    shadow_map: &TextureResource,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Shadow Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&shadow_map.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&shadow_map.sampler),
            },
        ],
    })
}

fn mesh_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    topology: wgpu::PrimitiveTopology,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(match topology {
            wgpu::PrimitiveTopology::LineList => "Line Pipeline",
            _ => "Mesh Pipeline",
        }),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex3D::desc()],
            compilation_options: Default::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // Planes and text are viewed from both sides
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
            unclipped_depth: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: TextureResource::DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        multiview: None,
        cache: None,
    })
}

fn shadow_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Shadow Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_shadow"),
            buffers: &[Vertex3D::desc()],
            compilation_options: Default::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: TextureResource::DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: None,
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::scene::{Light, SceneNode};
    use cgmath::Vector4;

    #[test]
    fn uniform_layouts_match_the_shader() {
        assert_eq!(size_of::<LightUniform>(), 48);
        assert_eq!(size_of::<GlobalUniform>(), 3 * 64 + 6 * 16 + MAX_LIGHTS * 48);
        assert_eq!(size_of::<DrawUniform>(), 160);
        assert!(size_of::<DrawUniform>() as u64 <= DRAW_STRIDE);
    }

    #[test]
    fn gather_splits_ambient_terms_from_shaded_lights() {
        let mut scene = Scene::new();
        scene.add(SceneNode::light("ambient", Light::ambient(Color::WHITE, 0.5)));
        scene.add(SceneNode::light(
            "hemi",
            Light::hemisphere(Color::new(0.0, 0.0, 1.0), Color::new(1.0, 0.0, 0.0), 2.0),
        ));
        scene.add(
            SceneNode::light(
                "sun",
                Light::directional(Color::WHITE, 1.0).with_shadow(ShadowSettings::default()),
            )
            .with_position(0.0, 10.0, 0.0),
        );
        let group = scene.add(SceneNode::group("rig").with_position(1.0, 0.0, 0.0));
        scene
            .add_child(
                group,
                SceneNode::light("bulb", Light::point(Color::WHITE, 3.0)).with_position(1.0, 2.0, 3.0),
            )
            .unwrap();

        let lights = FrameLights::gather(&scene);
        assert_eq!(lights.ambient, [0.5; 3]);
        assert_eq!(lights.sky, [0.0, 0.0, 2.0]);
        assert_eq!(lights.ground, [2.0, 0.0, 0.0]);
        assert_eq!(lights.lights.len(), 2);

        let sun = lights.lights[0];
        assert_eq!(sun.position[3], 0.0);
        assert_eq!(sun.direction, [0.0, -1.0, 0.0, 1.0]);
        assert!(lights.shadow.is_some());

        let bulb = lights.lights[1];
        assert_eq!(bulb.position, [2.0, 2.0, 3.0, 1.0]);
        assert_eq!(bulb.color, [3.0, 3.0, 3.0, 0.0]);
        assert_eq!(bulb.direction[3], 2.0);
    }

    #[test]
    fn hidden_and_excess_lights_are_not_shaded() {
        let mut scene = Scene::new();
        scene.add(SceneNode::light("hidden", Light::point(Color::WHITE, 1.0)).with_visible(false));
        for i in 0..MAX_LIGHTS + 2 {
            scene.add(SceneNode::light(&format!("bulb{i}"), Light::point(Color::WHITE, 1.0)));
        }
        // Past the limit the shadow caster is dropped too
        scene.add(SceneNode::light(
            "late_sun",
            Light::directional(Color::WHITE, 1.0).with_shadow(ShadowSettings::default()),
        ));

        let lights = FrameLights::gather(&scene);
        assert_eq!(lights.lights.len(), MAX_LIGHTS);
        assert!(lights.shadow.is_none());
    }

    #[test]
    fn rect_area_lights_scale_with_their_area() {
        let mut scene = Scene::new();
        scene.add(SceneNode::light("panel", Light::rect_area(Color::WHITE, 1.0, 2.0, 3.0)));
        let lights = FrameLights::gather(&scene);
        assert_eq!(lights.lights[0].color, [6.0, 6.0, 6.0, 0.0]);
    }

    #[test]
    fn shadow_projection_keeps_the_origin_inside_the_map() {
        let camera = ShadowCamera::square(5.0, 1.0, 20.0);
        let clip = shadow_view_projection(Vector3::new(4.0, 8.0, 2.0), &camera) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);

        // Straight down still has a usable up vector
        let overhead = shadow_view_projection(Vector3::new(0.0, 10.0, 0.0), &camera);
        assert!(overhead.determinant().abs() > f32::EPSILON);
    }

    #[test]
    fn material_kinds_select_shader_modes() {
        let mut scene = Scene::new();
        let texture = scene.add_texture(std::sync::Arc::new(TextureData::solid("t", Color::WHITE)));

        let basic = Material::basic("b", Color::WHITE).with_map(texture);
        assert_eq!(material_mode(&basic), (MODE_UNLIT, Some(texture)));

        let matcap = Material::new("m", MaterialKind::Standard).with_matcap(texture);
        assert_eq!(material_mode(&matcap), (MODE_MATCAP, Some(texture)));

        let bare_matcap = Material::new("m", MaterialKind::Matcap);
        assert_eq!(material_mode(&bare_matcap), (MODE_LIT, None));

        let normal = Material::new("n", MaterialKind::Normal).with_map(texture);
        assert_eq!(material_mode(&normal), (MODE_NORMAL, None));
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Matrix4::from_nonuniform_scale(2.0, 1.0, 1.0);
        let uniform = DrawUniform::new(model, Color::WHITE, 0.5, MODE_LIT, false);
        assert_eq!(uniform.normal_matrix[0][0], 0.5);
        assert_eq!(uniform.color[3], 0.5);
        assert_eq!(uniform.params, [MODE_LIT, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn mesh_keys_track_descriptor_changes() {
        let cube = Geometry::cube(1);
        let key = MeshSource::Geometry(&cube).key();
        assert!(MeshSource::Geometry(&Geometry::cube(1)).matches(&key));
        assert!(!MeshSource::Geometry(&Geometry::cube(2)).matches(&key));
        assert!(!MeshSource::Axes(1.0).matches(&key));
    }
}
