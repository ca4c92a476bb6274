use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::image_funcs::Mask;

/// Perturbs a {0,1} mask with independent Gaussian noise and re-binarizes
/// it at `cutoff`. With a noise scale well below the cutoff this leaves
/// the mask unchanged in expectation; pixels flip only on extreme draws.
///
/// The generator is passed in so callers control seeding; batch runs that
/// need reproducibility must give each run its own seeded generator.
pub fn perturb_and_rebinarize<R: Rng>(
    mask: &Mask,
    sigma: f64,
    cutoff: f64,
    rng: &mut R,
) -> Mask {
    let normal = Normal::new(0.0, sigma).expect("noise sigma is a fixed positive constant");
    let bits = mask
        .bits()
        .iter()
        .map(|&b| {
            let value = if b { 1.0 } else { 0.0 };
            value + normal.sample(rng) > cutoff
        })
        .collect();
    Mask::from_bits(mask.width(), mask.height(), bits)
}
