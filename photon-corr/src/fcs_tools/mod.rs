pub mod bin_photons;
pub mod multi_tau;
pub mod validate;
