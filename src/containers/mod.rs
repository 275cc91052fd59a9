//! Shared geometric containers used across every kernel (§3, §4.2-§4.4).

pub mod key_map;
pub mod scalar_map;
pub mod unique_queue;

pub use key_map::KeyMap;
pub use scalar_map::ScalarMap;
pub use unique_queue::UniqueQueue;
