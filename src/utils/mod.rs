pub mod logging;
pub mod math;

// Re-export commonly used helpers
pub use logging::init_logging;
pub use math::{exp_approach, from_na_quat, from_na_vector, to_na_point, to_na_quat, to_na_vector};
