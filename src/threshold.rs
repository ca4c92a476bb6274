use crate::image_funcs::{Mask, Micrograph};

// EMCCD sensitivity varies with overall exposure: dim frames need a
// cutoff pegged near the intensity floor, brighter frames a max-relative
// cutoff to avoid over-inclusion.
#[derive(Clone, Copy, Debug)]
enum CutoffRule {
    // Image minimum plus a fraction of the image mean.
    MinPlusMeanFraction(f64),
    // A fraction of the image maximum.
    MaxFraction(f64),
}

struct Tier {
    // The tier applies while the image mean is below this bound.
    mean_below: f64,
    rule: CutoffRule,
}

// Tier boundaries and multipliers are fixed empirical constants.
const CUTOFF_TIERS: &[Tier] = &[
    Tier { mean_below: 10000.0, rule: CutoffRule::MinPlusMeanFraction(0.17) },
    Tier { mean_below: 12500.0, rule: CutoffRule::MaxFraction(0.4) },
    Tier { mean_below: 15000.0, rule: CutoffRule::MaxFraction(0.5) },
    Tier { mean_below: 17000.0, rule: CutoffRule::MaxFraction(0.6) },
    Tier { mean_below: f64::INFINITY, rule: CutoffRule::MaxFraction(0.7) },
];

/// Selects the absolute intensity cutoff for the image: a pixel is a
/// foreground candidate iff its value is strictly above the returned
/// cutoff.
pub fn select_cutoff(image: &Micrograph) -> f64 {
    let mean = image.mean();
    let mut rule = CUTOFF_TIERS[CUTOFF_TIERS.len() - 1].rule;
    for tier in CUTOFF_TIERS {
        if mean < tier.mean_below {
            rule = tier.rule;
            break;
        }
    }
    match rule {
        CutoffRule::MinPlusMeanFraction(fraction) => image.min() + fraction * mean,
        CutoffRule::MaxFraction(fraction) => image.max() * fraction,
    }
}

/// Applies the cutoff elementwise to build the initial foreground mask.
pub fn build_mask(image: &Micrograph, cutoff: f64) -> Mask {
    let bits = image.pixels().iter().map(|&v| v > cutoff).collect();
    Mask::from_bits(image.width(), image.height(), bits)
}
