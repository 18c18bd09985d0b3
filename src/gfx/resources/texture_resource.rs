//! Decoded textures and their GPU counterparts
//!
//! [`TextureData`] is what a loader produces: RGBA8 pixels plus the sampling
//! settings the scene asked for. [`TextureResource`] is the uploaded form,
//! created lazily by the renderer.

use std::fmt;

use image::{imageops::FilterType, DynamicImage, RgbaImage};

use crate::gfx::scene::Color;

/// Handle of a texture stored in a [`Scene`](crate::gfx::scene::Scene)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u32);

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "texture#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpace {
    /// Data textures: normals, roughness, height
    #[default]
    Linear,
    /// Color textures authored for display
    Srgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

impl From<WrapMode> for wgpu::AddressMode {
    fn from(mode: WrapMode) -> Self {
        match mode {
            WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            WrapMode::Repeat => wgpu::AddressMode::Repeat,
            WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

impl From<FilterMode> for wgpu::FilterMode {
    fn from(mode: FilterMode) -> Self {
        match mode {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// How a texture is interpreted and sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureSettings {
    pub color_space: ColorSpace,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub generate_mipmaps: bool,
}

impl TextureSettings {
    /// sRGB color texture with default sampling
    pub fn color() -> Self {
        Self {
            color_space: ColorSpace::Srgb,
            ..Default::default()
        }
    }

    /// Crisp pixel-art sampling: nearest filtering, no mipmaps
    pub fn pixelated(mut self) -> Self {
        self.min_filter = FilterMode::Nearest;
        self.mag_filter = FilterMode::Nearest;
        self.generate_mipmaps = false;
        self
    }

    pub fn with_wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap_s = wrap;
        self.wrap_t = wrap;
        self
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        match self.color_space {
            ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
            ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        }
    }

    pub fn sampler_descriptor<'a>(&self, label: Option<&'a str>) -> wgpu::SamplerDescriptor<'a> {
        wgpu::SamplerDescriptor {
            label,
            address_mode_u: self.wrap_s.into(),
            address_mode_v: self.wrap_t.into(),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: self.mag_filter.into(),
            min_filter: self.min_filter.into(),
            mipmap_filter: if self.generate_mipmaps {
                wgpu::FilterMode::Linear
            } else {
                wgpu::FilterMode::Nearest
            },
            ..Default::default()
        }
    }
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            color_space: ColorSpace::Linear,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            generate_mipmaps: true,
        }
    }
}

/// Decoded RGBA8 texture
#[derive(Clone, PartialEq)]
pub struct TextureData {
    pub source: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub settings: TextureSettings,
}

impl fmt::Debug for TextureData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureData")
            .field("source", &self.source)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("settings", &self.settings)
            .finish()
    }
}

impl TextureData {
    pub fn from_image(source: &str, image: DynamicImage, settings: TextureSettings) -> Self {
        let rgba = image.to_rgba8();
        Self {
            source: source.to_string(),
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
            settings,
        }
    }

    /// Solid single-pixel texture
    pub fn solid(source: &str, color: Color) -> Self {
        let [r, g, b] = color.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        Self {
            source: source.to_string(),
            width: 1,
            height: 1,
            pixels: vec![r, g, b, 255],
            settings: TextureSettings::default(),
        }
    }

    /// Mean color of all pixels, ignoring alpha
    pub fn average_color(&self) -> Color {
        let count = (self.pixels.len() / 4).max(1) as f64;
        let mut sum = [0f64; 3];
        for pixel in self.pixels.chunks_exact(4) {
            for (channel, value) in sum.iter_mut().zip(pixel) {
                *channel += *value as f64;
            }
        }
        Color::new(
            (sum[0] / count / 255.0) as f32,
            (sum[1] / count / 255.0) as f32,
            (sum[2] / count / 255.0) as f32,
        )
    }

    /// Number of mip levels the upload produces
    pub fn mip_level_count(&self) -> u32 {
        if self.settings.generate_mipmaps {
            32 - self.width.max(self.height).max(1).leading_zeros()
        } else {
            1
        }
    }

    /// Level 0 followed by progressively halved levels when mipmaps are enabled
    pub fn mip_chain(&self) -> Vec<(u32, u32, Vec<u8>)> {
        let mut levels = vec![(self.width, self.height, self.pixels.clone())];
        if self.mip_level_count() == 1 {
            return levels;
        }
        let Some(base) = RgbaImage::from_raw(self.width, self.height, self.pixels.clone()) else {
            return levels;
        };
        let (mut width, mut height) = (self.width, self.height);
        while width > 1 || height > 1 {
            width = (width / 2).max(1);
            height = (height / 2).max(1);
            let level = image::imageops::resize(&base, width, height, FilterType::Triangle);
            levels.push((width, height, level.into_raw()));
        }
        levels
    }
}

/// Face order of a cube environment map: +X, -X, +Y, -Y, +Z, -Z
pub const CUBE_FACES: [&str; 6] = ["px", "nx", "py", "ny", "pz", "nz"];

/// Environment used as background and for reflections
#[derive(Debug, Clone, PartialEq)]
pub enum EnvironmentMap {
    Cube(Box<[TextureData; 6]>),
    Equirectangular(TextureData),
}

impl EnvironmentMap {
    pub fn average_color(&self) -> Color {
        match self {
            EnvironmentMap::Cube(faces) => {
                let mut sum = [0.0f32; 3];
                for face in faces.iter() {
                    let color = face.average_color().to_array();
                    for (total, c) in sum.iter_mut().zip(color) {
                        *total += c;
                    }
                }
                Color::from_array(sum.map(|c| c / 6.0))
            }
            EnvironmentMap::Equirectangular(texture) => texture.average_color(),
        }
    }
}

/// GPU texture resource containing texture, view, and sampler
pub struct TextureResource {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl TextureResource {
    /// Standard depth buffer format used throughout the renderer
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Depth buffer matching a swap-chain of `width` x `height` physical pixels
    pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        Self::depth(device, width.max(1), height.max(1), label, None)
    }

    /// Square depth target sampled with a comparison sampler
    pub fn create_shadow_map(device: &wgpu::Device, size: u32) -> Self {
        let size = size.max(1);
        Self::depth(device, size, size, "Shadow Map", Some(wgpu::CompareFunction::LessEqual))
    }

    fn depth(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        label: &str,
        compare: Option<wgpu::CompareFunction>,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare,
            lod_min_clamp: 0.0,
            lod_max_clamp: 100.0,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Uploads decoded pixels, including the mip chain when requested
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData) -> Self {
        let mips = data.mip_chain();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&data.source),
            size: wgpu::Extent3d {
                width: data.width,
                height: data.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mips.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: data.settings.format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, (width, height, pixels)) in mips.iter().enumerate() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: Some(*height),
                },
                wgpu::Extent3d {
                    width: *width,
                    height: *height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let label = format!("{} Sampler", data.source);
        let sampler = device.create_sampler(&data.settings.sampler_descriptor(Some(&label)));

        Self {
            texture,
            view,
            sampler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> TextureData {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        });
        TextureData::from_image("checker", DynamicImage::ImageRgba8(image), TextureSettings::color())
    }

    #[test]
    fn mip_chain_halves_down_to_one_pixel() {
        let texture = checker(8, 4);
        assert_eq!(texture.mip_level_count(), 4);
        let sizes: Vec<_> = texture.mip_chain().iter().map(|(w, h, _)| (*w, *h)).collect();
        assert_eq!(sizes, vec![(8, 4), (4, 2), (2, 1), (1, 1)]);
    }

    #[test]
    fn pixelated_settings_skip_mipmaps() {
        let mut texture = checker(8, 8);
        texture.settings = TextureSettings::color()
            .with_wrap(WrapMode::MirroredRepeat)
            .pixelated();
        assert_eq!(texture.mip_chain().len(), 1);

        let sampler = texture.settings.sampler_descriptor(None);
        assert_eq!(sampler.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(sampler.address_mode_u, wgpu::AddressMode::MirrorRepeat);
        assert_eq!(texture.settings.format(), wgpu::TextureFormat::Rgba8UnormSrgb);
    }

    #[test]
    fn average_color_of_checker_is_grey() {
        let average = checker(4, 4).average_color();
        assert!((average.r - 0.5).abs() < 1e-6);
    }
}
