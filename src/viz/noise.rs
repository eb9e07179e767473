// Seedable Perlin noise. Drives blob distortion, wander motion, glyph activity
// and highlight jitter. Output is normalized to [0, 1] like a sketch-style
// `noise()` call so callers can treat 0.5 as "no offset".

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const OCTAVES: u32 = 4;
const FALLOFF: f64 = 0.5;

/// Improved Perlin gradient noise with a seeded permutation table.
#[derive(Debug, Clone)]
pub struct Perlin {
    perm: [u8; 512],
}

impl Perlin {
    pub fn new(seed: u64) -> Self {
        let mut table: Vec<u8> = (0..=255).collect();
        table.shuffle(&mut StdRng::seed_from_u64(seed));
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = table[i & 255];
        }
        Self { perm }
    }

    /// Octave-summed noise in [0, 1].
    pub fn noise(&self, x: f64, y: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 0.5;
        let mut frequency = 1.0;
        let mut norm = 0.0;
        for _ in 0..OCTAVES {
            total += amplitude * self.raw(x * frequency, y * frequency, z * frequency);
            norm += amplitude;
            amplitude *= FALLOFF;
            frequency *= 2.0;
        }
        (total / norm * 0.5 + 0.5).clamp(0.0, 1.0)
    }

    pub fn noise2(&self, x: f64, y: f64) -> f64 {
        self.noise(x, y, 0.0)
    }

    /// Single-octave gradient noise in roughly [-1, 1].
    fn raw(&self, x: f64, y: f64, z: f64) -> f64 {
        let xi = (x.floor() as i64 & 255) as usize;
        let yi = (y.floor() as i64 & 255) as usize;
        let zi = (z.floor() as i64 & 255) as usize;
        let xf = x - x.floor();
        let yf = y - y.floor();
        let zf = z - z.floor();
        let u = fade(xf);
        let v = fade(yf);
        let w = fade(zf);

        let p = &self.perm;
        let a = p[xi] as usize + yi;
        let aa = p[a] as usize + zi;
        let ab = p[a + 1] as usize + zi;
        let b = p[xi + 1] as usize + yi;
        let ba = p[b] as usize + zi;
        let bb = p[b + 1] as usize + zi;

        lerp(
            w,
            lerp(
                v,
                lerp(u, grad(p[aa], xf, yf, zf), grad(p[ba], xf - 1.0, yf, zf)),
                lerp(
                    u,
                    grad(p[ab], xf, yf - 1.0, zf),
                    grad(p[bb], xf - 1.0, yf - 1.0, zf),
                ),
            ),
            lerp(
                v,
                lerp(
                    u,
                    grad(p[aa + 1], xf, yf, zf - 1.0),
                    grad(p[ba + 1], xf - 1.0, yf, zf - 1.0),
                ),
                lerp(
                    u,
                    grad(p[ab + 1], xf, yf - 1.0, zf - 1.0),
                    grad(p[bb + 1], xf - 1.0, yf - 1.0, zf - 1.0),
                ),
            ),
        )
    }
}

impl Default for Perlin {
    fn default() -> Self {
        Self::new(0)
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

fn grad(hash: u8, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_stays_in_unit_range() {
        let noise = Perlin::new(7);
        for i in 0..500 {
            let t = i as f64 * 0.137;
            let n = noise.noise(t, t * 0.5 + 3.0, -t);
            assert!((0.0..=1.0).contains(&n), "noise out of range: {}", n);
        }
    }

    #[test]
    fn same_seed_same_field() {
        let a = Perlin::new(42);
        let b = Perlin::new(42);
        assert_eq!(a.noise(1.3, 2.7, 0.4), b.noise(1.3, 2.7, 0.4));
    }

    #[test]
    fn field_is_smooth() {
        let noise = Perlin::new(3);
        let a = noise.noise2(10.0, 4.0);
        let b = noise.noise2(10.001, 4.0);
        assert!((a - b).abs() < 0.01);
    }
}
