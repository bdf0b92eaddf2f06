//! Used when the `logging` feature is off: nothing is written anywhere, but the public API
//! behaves the same.

use crate::log::LogConfiguration;

impl LogConfiguration {
    /// Applies the global level to the `log` facade.
    pub(in crate::log) fn set_config(&mut self) {
        log::set_max_level(self.global_log_level);
    }
}
