pub mod classifier;
pub mod stats;

pub use classifier::is_smart_wallet;
pub use stats::{compute_window_stats, WindowStats};
