mod moments;
mod matrix_utils;

pub use moments::{compute_moments, compute_moments_annualized, MomentsModel};
pub use matrix_utils::{largest_eigenvalue, quad_form, symmetrize, validate_psd};

#[cfg(test)]
mod tests;
