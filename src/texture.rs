//! Immutable, mipmapped, tiled 2D texture store.
//!
//! Grounded on the teacher's `Texture2d`/`Sampler` split (`texture.rs`,
//! `sampler/mod.rs`, `sampler/nearest.rs`, `sampler/linear.rs`): a texture is
//! a plain indexable 2D image, and a sampler wraps it with a wrap/filter
//! policy. This module folds both roles into `Texture` (which now owns a
//! mip chain and a tiled addressing scheme, neither of which the teacher's
//! single-level `Texture2d` has) plus a `sample` entry point, since the
//! sampling contract (nearest/linear x wrap mode x mip level) is simple
//! enough not to need the teacher's composable-wrapper-type machinery.

/// Renderer-owned id for an uploaded texture; deliberately not a hidden
/// process-wide global.
pub type TextureId = usize;

/// Addressing scheme used to lay out one mip level's texels in memory.
/// Chosen per texture at upload time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Row-major, no tiling.
    Linear,
    /// 4x4 tiles, row-major tile order, row-major texel order within a tile.
    Tiled4x4,
    /// 32x32 tiles, row-major tile order, Morton (Z-order) texel order
    /// within a tile.
    TiledMorton32,
}

impl Layout {
    fn tile_size(&self) -> usize {
        match self {
            Layout::Linear => 1,
            Layout::Tiled4x4 => 4,
            Layout::TiledMorton32 => 32,
        }
    }

    fn padded(&self, w: usize, h: usize) -> (usize, usize) {
        let t = self.tile_size();
        (pad_to(w, t), pad_to(h, t))
    }

    /// Map pixel coordinates to an index into this level's densely-packed
    /// `texels` vector.
    fn index(&self, x: usize, y: usize, padded_w: usize) -> usize {
        match self {
            Layout::Linear => y * padded_w + x,
            Layout::Tiled4x4 => tiled_index(x, y, padded_w, 4, |lx, ly, t| ly * t + lx),
            Layout::TiledMorton32 => {
                tiled_index(x, y, padded_w, 32, |lx, ly, _| morton2(lx as u32, ly as u32) as usize)
            }
        }
    }
}

fn pad_to(v: usize, t: usize) -> usize {
    ((v + t - 1) / t) * t
}

fn tiled_index(
    x: usize,
    y: usize,
    padded_w: usize,
    tile: usize,
    local: impl Fn(usize, usize, usize) -> usize,
) -> usize {
    let tiles_per_row = padded_w / tile;
    let (tile_x, tile_y) = (x / tile, y / tile);
    let (local_x, local_y) = (x % tile, y % tile);
    let tile_index = tile_y * tiles_per_row + tile_x;
    tile_index * tile * tile + local(local_x, local_y, tile)
}

/// Interleave the low bits of `x` and `y` into a Morton (Z-order) code.
fn morton2(x: u32, y: u32) -> usize {
    fn part1by1(mut n: u32) -> u32 {
        n &= 0x0000_ffff;
        n = (n | (n << 8)) & 0x00FF_00FF;
        n = (n | (n << 4)) & 0x0F0F_0F0F;
        n = (n | (n << 2)) & 0x3333_3333;
        n = (n | (n << 1)) & 0x5555_5555;
        n
    }
    (part1by1(x) | (part1by1(y) << 1)) as usize
}

#[derive(Clone)]
struct MipLevel {
    width: usize,
    height: usize,
    layout: Layout,
    /// Densely packed RGBA8 texels in `layout`'s addressing order, padded up
    /// to a whole number of tiles.
    texels: Vec<[u8; 4]>,
}

impl MipLevel {
    fn from_rgba(width: usize, height: usize, layout: Layout, rgba: &[[u8; 4]]) -> Self {
        let (pw, ph) = layout.padded(width, height);
        let mut texels = vec![[0u8; 4]; pw * ph];
        for y in 0..height {
            for x in 0..width {
                texels[layout.index(x, y, pw)] = rgba[y * width + x];
            }
        }
        Self {
            width,
            height,
            layout,
            texels,
        }
    }

    #[inline]
    fn texel(&self, x: usize, y: usize) -> [u8; 4] {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        let (pw, _) = self.layout.padded(self.width, self.height);
        self.texels[self.layout.index(x, y, pw)]
    }

    /// 2x2 box filter downsample used to build the next mip level.
    fn downsample(&self) -> Self {
        let nw = (self.width / 2).max(1);
        let nh = (self.height / 2).max(1);
        let mut rgba = vec![[0u8; 4]; nw * nh];
        for y in 0..nh {
            for x in 0..nw {
                let x0 = (x * 2).min(self.width - 1);
                let x1 = (x * 2 + 1).min(self.width - 1);
                let y0 = (y * 2).min(self.height - 1);
                let y1 = (y * 2 + 1).min(self.height - 1);
                let samples = [self.texel(x0, y0), self.texel(x1, y0), self.texel(x0, y1), self.texel(x1, y1)];
                let mut acc = [0u32; 4];
                for s in &samples {
                    for c in 0..4 {
                        acc[c] += s[c] as u32;
                    }
                }
                let mut out = [0u8; 4];
                for c in 0..4 {
                    out[c] = ((acc[c] + 2) / 4) as u8;
                }
                rgba[y * nw + x] = out;
            }
        }
        MipLevel::from_rgba(nw, nh, self.layout, &rgba)
    }
}

/// UV wrap mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

impl WrapMode {
    fn apply(&self, u: f32) -> f32 {
        match self {
            WrapMode::Repeat => u - u.floor(),
            WrapMode::ClampToEdge => u.clamp(0.0, 1.0),
            WrapMode::MirroredRepeat => {
                let t = u.rem_euclid(2.0);
                if t >= 1.0 {
                    2.0 - t
                } else {
                    t
                }
            }
        }
    }
}

/// Texel sampling filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// An immutable, mipmapped 2D texture.
pub struct Texture {
    levels: Vec<MipLevel>,
}

impl Texture {
    /// Build a texture (and its full mip chain, via repeated 2x2 box
    /// filtering) from raw `width x height x channels` bytes. `channels`
    /// must be 1 (luminance), 3 (RGB), or 4 (RGBA).
    pub fn from_bytes(width: usize, height: usize, channels: usize, data: &[u8], layout: Layout) -> Self {
        assert!(
            matches!(channels, 1 | 3 | 4),
            "texture channel count must be 1, 3, or 4, got {channels}"
        );
        let mut rgba = vec![[0u8, 0, 0, 255]; width * height];
        for i in 0..width * height {
            let px = &data[i * channels..i * channels + channels];
            rgba[i] = match channels {
                1 => [px[0], px[0], px[0], 255],
                3 => [px[0], px[1], px[2], 255],
                4 => [px[0], px[1], px[2], px[3]],
                _ => unreachable!(),
            };
        }

        let mut levels = vec![MipLevel::from_rgba(width, height, layout, &rgba)];
        while levels.last().unwrap().width > 1 || levels.last().unwrap().height > 1 {
            let next = levels.last().unwrap().downsample();
            levels.push(next);
        }
        Self { levels }
    }

    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.levels[0].width, self.levels[0].height)
    }

    #[inline]
    pub fn max_level(&self) -> usize {
        self.levels.len() - 1
    }

    /// `level` is floor-clamped to `[0, max_level]`; no trilinear blending.
    pub fn sample(&self, uv: [f32; 2], level: f32, wrap: WrapMode, filter: FilterMode) -> [f32; 4] {
        let level = (level.max(0.0) as usize).min(self.max_level());
        let mip = &self.levels[level];
        let u = wrap.apply(uv[0]);
        let v = wrap.apply(uv[1]);
        let texel = match filter {
            FilterMode::Nearest => {
                let x = ((u * mip.width as f32).floor() as usize).min(mip.width.saturating_sub(1));
                let y = ((v * mip.height as f32).floor() as usize).min(mip.height.saturating_sub(1));
                mip.texel(x, y)
            }
            FilterMode::Linear => {
                let fx = u * mip.width as f32 - 0.5;
                let fy = v * mip.height as f32 - 0.5;
                let x0 = fx.floor();
                let y0 = fy.floor();
                let tx = fx - x0;
                let ty = fy - y0;

                let wrap_coord = |c: f32, size: usize| -> usize {
                    match wrap {
                        WrapMode::ClampToEdge => c.clamp(0.0, size as f32 - 1.0) as usize,
                        _ => {
                            let size_f = size as f32;
                            let wrapped = c.rem_euclid(size_f);
                            wrapped as usize
                        }
                    }
                };

                let (x0u, x1u) = (wrap_coord(x0, mip.width), wrap_coord(x0 + 1.0, mip.width));
                let (y0u, y1u) = (wrap_coord(y0, mip.height), wrap_coord(y0 + 1.0, mip.height));

                let t00 = mip.texel(x0u, y0u);
                let t10 = mip.texel(x1u, y0u);
                let t01 = mip.texel(x0u, y1u);
                let t11 = mip.texel(x1u, y1u);

                let mut out = [0.0f32; 4];
                for c in 0..4 {
                    let top = t00[c] as f32 * (1.0 - tx) + t10[c] as f32 * tx;
                    let bot = t01[c] as f32 * (1.0 - tx) + t11[c] as f32 * tx;
                    out[c] = (top * (1.0 - ty) + bot * ty) / 255.0;
                }
                return out;
            }
        };
        [
            texel[0] as f32 / 255.0,
            texel[1] as f32 / 255.0,
            texel[2] as f32 / 255.0,
            texel[3] as f32 / 255.0,
        ]
    }
}

/// Compute the mip level to sample from screen-space UV derivatives:
/// `level = 0.5 * log2(max(|duv/dx|^2, |duv/dy|^2) * (w^2, h^2))`.
pub fn mip_level_from_derivatives(duvdx: [f32; 2], duvdy: [f32; 2], width: usize, height: usize) -> f32 {
    let (w, h) = (width as f32, height as f32);
    let dx2 = (duvdx[0] * w).powi(2) + (duvdx[1] * h).powi(2);
    let dy2 = (duvdy[0] * w).powi(2) + (duvdy[1] * h).powi(2);
    let max_sq = dx2.max(dy2).max(1e-12);
    (0.5 * max_sq.log2()).max(0.0)
}

/// The renderer-owned id -> texture map: an explicit store object owned by
/// the renderer, rather than a process-wide map.
#[derive(Default)]
pub struct TextureStore {
    textures: Vec<Texture>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload(&mut self, width: usize, height: usize, channels: usize, data: &[u8], layout: Layout) -> TextureId {
        self.textures.push(Texture::from_bytes(width, height, channels, data, layout));
        self.textures.len() - 1
    }

    pub fn get(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }
}
