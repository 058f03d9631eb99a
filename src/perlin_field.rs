// src/perlin_field.rs - Spatially varying fields from seeded Perlin noise

use crate::constants::{
    OCTAVE_LACUNARITY, OCTAVE_PERSISTENCE, PERLIN_OFFSET_SPAN, PRESSURE_STEP_SCALE,
    REFERENCE_PRESSURE_PA,
};
use crate::error::Result;
use crate::field::Field;
use crate::grid::Grid;
use crate::math_utils::{inverse_lerp, lerp};
use crate::parameter::{Distribution, Frequency, PerlinSpec};
use crate::seed::{noise_seed, rng_from_seed};
use glam::DVec3;
use noise::{NoiseFn, Perlin};
use rand::Rng;
use tracing::debug;

/// Generate an isotropic-frequency field in `[lo, hi]` with the given vertical anisotropy.
pub fn generate(
    grid: &Grid,
    seed: u64,
    value_range: (f64, f64),
    anisotropy: f64,
) -> Result<Field> {
    let spec = PerlinSpec::new(value_range.0, value_range.1).with_anisotropy(anisotropy);
    generate_with(grid, seed, &spec, "field")
}

/// Sample layered Perlin noise at every cell centroid and rescale it into `[spec.min, spec.max]`.
///
/// The grid is scaled into the unit cube by its largest extent. A random
/// offset drawn from `seed` moves every datapoint to its own region of the
/// noise. The vertical sampling coordinate is multiplied by the anisotropy
/// ratio, so ratios above one shorten vertical correlation and ratios below
/// one lengthen it. Identical inputs produce bit-identical fields.
pub fn generate_with(grid: &Grid, seed: u64, spec: &PerlinSpec, parameter: &str) -> Result<Field> {
    spec.validate(parameter)?;

    let mut rng = rng_from_seed(seed);
    let offset = DVec3::new(rng.random(), rng.random(), rng.random()) * PERLIN_OFFSET_SPAN;
    let frequency = match &spec.frequency {
        Frequency::Fixed(values) => {
            DVec3::new(values[0], values[1], values.get(2).copied().unwrap_or(1.0))
        }
        Frequency::Range(range) => {
            let mut draw = || range.max - rng.random::<f64>() * (range.max - range.min);
            DVec3::new(draw(), draw(), draw())
        }
    };
    debug!(parameter, seed, ?offset, ?frequency, "sampling perlin field");

    let noise = Perlin::new(noise_seed(seed));
    let inverse_extent = 1.0 / grid.max_extent() as f64;
    let [nx, ny, nz] = grid.cells();

    let mut raw = Vec::with_capacity(grid.cell_count());
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let relative = sample_coordinate([i, j, k], inverse_extent, spec.anisotropy);
                let point = (relative + offset) * frequency;
                raw.push(layered(&noise, point, spec.octaves));
            }
        }
    }

    let raw_min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let raw_max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let (lo, hi) = match spec.distribution {
        Distribution::Uniform => (spec.min, spec.max),
        Distribution::Logarithmic => (spec.min.log10(), spec.max.log10()),
    };

    let values = raw
        .into_iter()
        .map(|value| {
            let normalized = if raw_max - raw_min > f64::EPSILON {
                inverse_lerp(raw_min, raw_max, value)
            } else {
                0.5
            };
            let scaled = lerp(lo, hi, normalized);
            let scaled = match spec.distribution {
                Distribution::Uniform => scaled,
                Distribution::Logarithmic => 10f64.powf(scaled),
            };
            scaled.clamp(spec.min, spec.max)
        })
        .collect();

    Field::from_values(grid, parameter, values)
}

/// Centroid of cell `(i, j, k)` in the unit cube, vertical axis stretched by `anisotropy`.
fn sample_coordinate(cell: [usize; 3], inverse_extent: f64, anisotropy: f64) -> DVec3 {
    let [i, j, k] = cell;
    let centroid = DVec3::new(i as f64, j as f64, k as f64) + DVec3::splat(0.5);
    let mut relative = centroid * inverse_extent;
    relative.z *= anisotropy;
    relative
}

/// Integrate a pressure gradient field along y into a pressure field.
///
/// Every column starts at the reference pressure in row `j = 0` and adds
/// `gradient * resolution * 1000` per cell. The result is mirrored along x.
pub fn pressure_from_gradient(grid: &Grid, gradient: &Field) -> Result<Field> {
    let [nx, ny, nz] = grid.cells();
    let step = grid.resolution() * PRESSURE_STEP_SCALE;

    let mut pressure = vec![0.0; grid.cell_count()];
    for k in 0..nz {
        for i in 0..nx {
            let mut current = REFERENCE_PRESSURE_PA;
            for j in 0..ny {
                if j > 0 {
                    current += gradient.get(i, j, k).unwrap_or(0.0) * step;
                }
                pressure[grid.index(nx - 1 - i, j, k)] = current;
            }
        }
    }
    Field::from_values(grid, "pressure_gradient", pressure)
}

fn layered(noise: &Perlin, point: DVec3, octaves: u32) -> f64 {
    let mut amplitude = 1.0;
    let mut scale = 1.0;
    let mut total = 0.0;
    for _ in 0..octaves {
        total += amplitude * noise.get((point * scale).to_array());
        amplitude *= OCTAVE_PERSISTENCE;
        scale *= OCTAVE_LACUNARITY;
    }
    total
}
