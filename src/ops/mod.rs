pub mod export;
pub mod fill;
pub mod halo;
pub mod seam;
pub mod transform;
