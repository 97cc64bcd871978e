//! Container configuration
//!
//! ```rust
//! use service_container::{Container, ContainerConfig};
//!
//! let container = Container::with_config(
//!     ContainerConfig::new()
//!         .capacity(64)
//!         .detect_cycles(false),
//! );
//! assert!(!container.config().cycle_detection());
//! ```

/// Settings applied when a [`Container`](crate::Container) is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerConfig {
    capacity: usize,
    detect_cycles: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            detect_cycles: true,
        }
    }
}

impl ContainerConfig {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expected number of registrations; sizes the internal tables.
    #[inline]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Fail with `CircularDependency` when a service type is requested again
    /// while it is still being constructed on the same thread.
    ///
    /// On by default. Without it a dependency cycle recurses until the stack
    /// overflows.
    #[inline]
    pub fn detect_cycles(mut self, enabled: bool) -> Self {
        self.detect_cycles = enabled;
        self
    }

    #[inline]
    pub fn expected_capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn cycle_detection(&self) -> bool {
        self.detect_cycles
    }
}
