use std::collections::{BTreeSet, HashMap};

use image::Luma;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::image_funcs::Mask;

/// Connected-component labels over the micrograph grid: 0 = background,
/// 1..num_labels = distinct 4-connected foreground regions. Label
/// ordering follows the labeler's raster scan and carries no meaning;
/// only the set of regions and their statistics do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelMap {
    width: u32,
    height: u32,
    labels: Vec<u32>,
    num_labels: u32,
}

impl LabelMap {
    /// Labels the maximal 4-connected foreground regions of the mask.
    pub fn label_components(mask: &Mask) -> LabelMap {
        let components = connected_components(
            &mask.to_gray_image(),
            Connectivity::Four,
            Luma([0u8]),
        );
        let labels = components.into_raw();
        let num_labels = labels.iter().copied().max().unwrap_or(0);
        LabelMap { width: mask.width(), height: mask.height(), labels, num_labels }
    }

    pub fn from_labels(width: u32, height: u32, labels: Vec<u32>) -> LabelMap {
        assert_eq!(labels.len(), (width * height) as usize);
        let num_labels = labels.iter().copied().max().unwrap_or(0);
        LabelMap { width, height, labels, num_labels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn num_labels(&self) -> u32 {
        self.num_labels
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.labels[(y * self.width + x) as usize]
    }

    /// Labels in raster order.
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Pixel count per label, indexed 0..=num_labels. Index 0 counts
    /// background pixels and is excluded from filtering decisions.
    pub fn region_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.num_labels as usize + 1];
        for &label in &self.labels {
            sizes[label as usize] += 1;
        }
        sizes
    }

    /// The foreground of the map: every pixel with a nonzero label.
    pub fn to_mask(&self) -> Mask {
        let bits = self.labels.iter().map(|&l| l > 0).collect();
        Mask::from_bits(self.width, self.height, bits)
    }
}

// Luminescent objects form one size population well separated from noise
// specks, so the largest region anchors a relative cutoff whose fraction
// is tuned per size regime. Empirical constants, same tiering pattern as
// the intensity cutoff.
const SIZE_TIERS: &[(f64, f64)] = &[
    (500.0, 0.30),
    (1000.0, 0.25),
    (2000.0, 0.09),
    (f64::INFINITY, 0.10),
];

/// Minimum pixel count a region must reach to survive, given the largest
/// region's pixel count.
pub fn size_cutoff(largest: usize) -> f64 {
    let largest = largest as f64;
    let mut fraction = SIZE_TIERS[SIZE_TIERS.len() - 1].1;
    for &(below, tier_fraction) in SIZE_TIERS {
        if largest < below {
            fraction = tier_fraction;
            break;
        }
    }
    largest * fraction
}

/// Resets every pixel of an under-sized region to background.
pub fn filter_by_size(map: &LabelMap) -> LabelMap {
    let sizes = map.region_sizes();
    let largest = sizes[1..].iter().copied().max().unwrap_or(0);
    let cutoff = size_cutoff(largest);
    let mut drop = vec![false; sizes.len()];
    for (label, &size) in sizes.iter().enumerate().skip(1) {
        drop[label] = (size as f64) < cutoff;
    }
    let labels = map
        .labels()
        .iter()
        .map(|&l| if drop[l as usize] { 0 } else { l })
        .collect();
    LabelMap::from_labels(map.width(), map.height(), labels)
}

/// Compacts surviving label values to a contiguous 0..K' range by mapping
/// each label to its rank in the sorted set of distinct surviving values.
/// Background rank 0 is always reserved, so foreground labels stay
/// nonzero even if no background pixel remains.
pub fn compact_labels(map: &LabelMap) -> LabelMap {
    let mut distinct: BTreeSet<u32> = map.labels().iter().copied().collect();
    distinct.insert(0);
    let rank: HashMap<u32, u32> = distinct
        .into_iter()
        .enumerate()
        .map(|(index, label)| (label, index as u32))
        .collect();
    let labels = map.labels().iter().map(|&l| rank[&l]).collect();
    LabelMap::from_labels(map.width(), map.height(), labels)
}
