//! Template matching over RGB frames.
//!
//! Scores are zero-mean normalized cross-correlation summed across the three
//! colour channels, so a score of 1.0 means the window is an affine copy of
//! the template.
//!
//! On screen-sized frames `locate` avoids scoring every position in full.
//! Splitting both patches into a block-mean part and a residual gives an upper
//! bound on each position's score, computed from block means only. Positions
//! whose bound is below the threshold cannot match and are skipped. Every
//! other position is scored exactly, so the answer equals an exhaustive search.

use image::RgbImage;

use crate::types::Match;

/// Frames smaller than this are always searched exhaustively.
const BOUNDED_MIN_FRAME_AREA: u64 = 640 * 480;
/// Fewest blocks per template side for a block size to be used.
const MIN_BLOCKS_PER_SIDE: u32 = 4;
/// Below this (in squared 8-bit units) a patch counts as flat.
const FLAT_VARIANCE: f64 = 1e-3;
/// Rounding allowance on the bound so float error never prunes a match.
const BOUND_SLACK: f64 = 1e-6;

/// Highest-scoring template position, before thresholding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch {
    /// Top-left corner in frame coordinates
    pub x: u32,
    pub y: u32,
    pub score: f64,
}

impl BestMatch {
    /// Turn into a `Match` when `score >= threshold`.
    pub fn accept(&self, width: u32, height: u32, threshold: f64) -> Option<Match> {
        if self.score < threshold {
            return None;
        }
        Some(Match {
            center_x: (self.x + width / 2) as i32,
            center_y: (self.y + height / 2) as i32,
            width,
            height,
            score: self.score,
        })
    }
}

/// Locate `template` in `frame`, reporting it only at or above `threshold`.
///
/// The result is the global maximum whenever that maximum reaches the
/// threshold; ties keep the first position in row-major order.
pub fn locate(frame: &RgbImage, template: &RgbImage, threshold: f64) -> Option<Match> {
    if !fits(frame, template) {
        return None;
    }
    let tpl = Prepared::new(template);
    let integral = Integral::new(frame);
    let k = block_size(frame, template);
    let best = if k > 1 && !tpl.is_flat() {
        bounded(frame, &integral, &tpl, k, threshold)?
    } else {
        exhaustive(frame, &integral, &tpl)
    };
    best.accept(tpl.w, tpl.h, threshold)
}

/// Global maximum of the score surface, scoring every position. `None` when
/// the template is empty or does not fit inside the frame.
pub fn best_match(frame: &RgbImage, template: &RgbImage) -> Option<BestMatch> {
    if !fits(frame, template) {
        return None;
    }
    let integral = Integral::new(frame);
    let tpl = Prepared::new(template);
    Some(exhaustive(frame, &integral, &tpl))
}

fn fits(frame: &RgbImage, template: &RgbImage) -> bool {
    let (fw, fh) = frame.dimensions();
    let (tw, th) = template.dimensions();
    tw > 0 && th > 0 && tw <= fw && th <= fh
}

/// Zero-mean template pixels, interleaved RGB, row-major.
struct Prepared {
    w: u32,
    h: u32,
    values: Vec<f64>,
    means: [f64; 3],
    norm: f64,
}

impl Prepared {
    fn new(template: &RgbImage) -> Self {
        let (w, h) = template.dimensions();
        let n = (w * h) as f64;
        let mut means = [0.0; 3];
        for p in template.pixels() {
            for c in 0..3 {
                means[c] += p[c] as f64;
            }
        }
        for m in means.iter_mut() {
            *m /= n;
        }

        let mut values = Vec::with_capacity((w * h * 3) as usize);
        let mut norm = 0.0;
        for p in template.pixels() {
            for c in 0..3 {
                let v = p[c] as f64 - means[c];
                norm += v * v;
                values.push(v);
            }
        }
        Self { w, h, values, means, norm }
    }

    fn is_flat(&self) -> bool {
        self.norm <= FLAT_VARIANCE
    }
}

/// Summed-area tables: per-channel sums and the all-channel sum of squares.
struct Integral {
    stride: usize,
    sum: Vec<[f64; 3]>,
    sq: Vec<f64>,
}

impl Integral {
    fn new(frame: &RgbImage) -> Self {
        Self::from_fn(frame.width(), frame.height(), |x, y| {
            let p = frame.get_pixel(x, y);
            [p[0] as f64, p[1] as f64, p[2] as f64]
        })
    }

    fn from_fn(w: u32, h: u32, pixel: impl Fn(u32, u32) -> [f64; 3]) -> Self {
        let stride = w as usize + 1;
        let mut sum = vec![[0.0; 3]; stride * (h as usize + 1)];
        let mut sq = vec![0.0; stride * (h as usize + 1)];

        for y in 0..h as usize {
            let mut row_sum = [0.0; 3];
            let mut row_sq = 0.0;
            for x in 0..w as usize {
                let p = pixel(x as u32, y as u32);
                for c in 0..3 {
                    row_sum[c] += p[c];
                    row_sq += p[c] * p[c];
                }
                let above = y * stride + x + 1;
                let here = (y + 1) * stride + x + 1;
                for c in 0..3 {
                    sum[here][c] = sum[above][c] + row_sum[c];
                }
                sq[here] = sq[above] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> ([f64; 3], f64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let a = y0 * self.stride + x0;
        let b = y0 * self.stride + x1;
        let c = y1 * self.stride + x0;
        let d = y1 * self.stride + x1;

        let mut sums = [0.0; 3];
        for ch in 0..3 {
            sums[ch] = self.sum[d][ch] - self.sum[b][ch] - self.sum[c][ch] + self.sum[a][ch];
        }
        let sq = self.sq[d] - self.sq[b] - self.sq[c] + self.sq[a];
        (sums, sq)
    }
}

fn score_at(frame: &RgbImage, integral: &Integral, tpl: &Prepared, x: u32, y: u32) -> f64 {
    let n = (tpl.w * tpl.h) as f64;
    let (sums, sq) = integral.window(x, y, tpl.w, tpl.h);
    let variance = sq - sums.iter().map(|s| s * s).sum::<f64>() / n;

    if tpl.is_flat() || variance <= FLAT_VARIANCE {
        // Correlation is undefined; two flat patches of the same colour agree.
        let same_colour = (0..3).all(|c| (sums[c] / n - tpl.means[c]).abs() < 0.5);
        return if tpl.is_flat() && variance <= FLAT_VARIANCE && same_colour {
            1.0
        } else {
            0.0
        };
    }

    let raw = frame.as_raw();
    let frame_row = frame.width() as usize * 3;
    let tpl_row = tpl.w as usize * 3;
    let mut num = 0.0;
    for ty in 0..tpl.h as usize {
        let start = (y as usize + ty) * frame_row + x as usize * 3;
        let window = &raw[start..start + tpl_row];
        let values = &tpl.values[ty * tpl_row..(ty + 1) * tpl_row];
        num += window
            .iter()
            .zip(values)
            .map(|(&p, &t)| p as f64 * t)
            .sum::<f64>();
    }
    (num / (tpl.norm * variance).sqrt()).clamp(-1.0, 1.0)
}

/// Scan every position; ties keep the first in row-major order.
fn exhaustive(frame: &RgbImage, integral: &Integral, tpl: &Prepared) -> BestMatch {
    let mut best = BestMatch { x: 0, y: 0, score: f64::NEG_INFINITY };
    for y in 0..=frame.height() - tpl.h {
        for x in 0..=frame.width() - tpl.w {
            let score = score_at(frame, integral, tpl, x, y);
            if score > best.score {
                best = BestMatch { x, y, score };
            }
        }
    }
    best
}

/// Block side for the bounded search, or 1 to search exhaustively.
fn block_size(frame: &RgbImage, template: &RgbImage) -> u32 {
    let area = frame.width() as u64 * frame.height() as u64;
    if area < BOUNDED_MIN_FRAME_AREA {
        return 1;
    }
    [8, 4, 2]
        .into_iter()
        .find(|k| {
            template.width() / k >= MIN_BLOCKS_PER_SIDE
                && template.height() / k >= MIN_BLOCKS_PER_SIDE
        })
        .unwrap_or(1)
}

/// Block means of the zero-mean template over its whole `k`x`k` blocks.
struct TemplateBlocks {
    bw: u32,
    bh: u32,
    means: Vec<[f64; 3]>,
    /// Per-channel sum of `means`
    sums: [f64; 3],
    /// Energy left after removing the block means
    residual: f64,
}

impl TemplateBlocks {
    fn new(tpl: &Prepared, k: u32) -> Self {
        let (bw, bh) = (tpl.w / k, tpl.h / k);
        let area = (k * k) as f64;
        let row = tpl.w as usize * 3;
        let mut means = Vec::with_capacity((bw * bh) as usize);
        let mut sums = [0.0; 3];
        let mut low = 0.0;
        for by in 0..bh {
            for bx in 0..bw {
                let mut m = [0.0; 3];
                for y in by * k..(by + 1) * k {
                    for x in bx * k..(bx + 1) * k {
                        let i = y as usize * row + x as usize * 3;
                        for c in 0..3 {
                            m[c] += tpl.values[i + c];
                        }
                    }
                }
                for c in 0..3 {
                    m[c] /= area;
                    sums[c] += m[c];
                    low += area * m[c] * m[c];
                }
                means.push(m);
            }
        }
        Self { bw, bh, means, sums, residual: (tpl.norm - low).max(0.0) }
    }
}

/// Frame block means on the `k`x`k` grid starting at one (px, py) offset.
struct Phase {
    w: u32,
    means: Vec<[f64; 3]>,
    integral: Integral,
}

/// One `Phase` per grid offset, indexed `py * k + px`.
fn phases(frame: &RgbImage, integral: &Integral, k: u32) -> Vec<Phase> {
    let area = (k * k) as f64;
    let mut out = Vec::with_capacity((k * k) as usize);
    for py in 0..k {
        for px in 0..k {
            let w = (frame.width() - px) / k;
            let h = (frame.height() - py) / k;
            let mut means = Vec::with_capacity((w * h) as usize);
            for j in 0..h {
                for i in 0..w {
                    let (s, _) = integral.window(px + i * k, py + j * k, k, k);
                    means.push([s[0] / area, s[1] / area, s[2] / area]);
                }
            }
            let integral = Integral::from_fn(w, h, |i, j| means[(j * w + i) as usize]);
            out.push(Phase { w, means, integral });
        }
    }
    out
}

/// Exact best position among those whose score bound reaches `threshold`.
/// `None` when no position can reach it.
///
/// For a window `f` and the template `t`, both zero-mean, write each as its
/// block-mean part plus a residual. The two parts are orthogonal, so
/// `<f, t> <= <f_low, t_low> + |f_res| |t_res|`, and every term comes from
/// block means and the window variance.
fn bounded(
    frame: &RgbImage,
    integral: &Integral,
    tpl: &Prepared,
    k: u32,
    threshold: f64,
) -> Option<BestMatch> {
    let blocks = TemplateBlocks::new(tpl, k);
    let phases = phases(frame, integral, k);
    let n = (tpl.w * tpl.h) as f64;
    let area = (k * k) as f64;
    let nb = (blocks.bw * blocks.bh) as f64;

    let mut best: Option<BestMatch> = None;
    for y in 0..=frame.height() - tpl.h {
        for x in 0..=frame.width() - tpl.w {
            let (sums, sq) = integral.window(x, y, tpl.w, tpl.h);
            let variance = sq - sums.iter().map(|s| s * s).sum::<f64>() / n;

            // Flat windows are cheap to score exactly.
            if variance > FLAT_VARIANCE {
                let mu = [sums[0] / n, sums[1] / n, sums[2] / n];
                let phase = &phases[((y % k) * k + x % k) as usize];
                let (i0, j0) = (x / k, y / k);

                let (bsum, bsq) = phase.integral.window(i0, j0, blocks.bw, blocks.bh);
                let mut low_f = bsq;
                for c in 0..3 {
                    low_f += nb * mu[c] * mu[c] - 2.0 * mu[c] * bsum[c];
                }
                let residual_f = (variance - area * low_f).max(0.0);

                let mut dot = 0.0;
                for by in 0..blocks.bh {
                    let row = ((j0 + by) * phase.w + i0) as usize;
                    let tpl_row = (by * blocks.bw) as usize;
                    for bx in 0..blocks.bw as usize {
                        let f = phase.means[row + bx];
                        let t = blocks.means[tpl_row + bx];
                        dot += f[0] * t[0] + f[1] * t[1] + f[2] * t[2];
                    }
                }
                for c in 0..3 {
                    dot -= mu[c] * blocks.sums[c];
                }

                let bound = (area * dot + (residual_f * blocks.residual).sqrt())
                    / (tpl.norm * variance).sqrt();
                if bound < threshold - BOUND_SLACK {
                    continue;
                }
            }

            let score = score_at(frame, integral, tpl, x, y);
            if best.map_or(true, |b| score > b.score) {
                best = Some(BestMatch { x, y, score });
            }
        }
    }
    best
}
