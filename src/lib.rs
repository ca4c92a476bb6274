pub mod algorithm;
pub mod image_funcs;
pub mod labeling;
pub mod morphology;
pub mod noise_funcs;
pub mod threshold;
