//! Runtime switches that affect how item values are accepted.
//!
//! The validation mode is kept per thread: dataset access is single-threaded, and this lets
//! independent threads (test threads in particular) pick their own mode.

use std::cell::Cell;

/// How [`DataSet::set`][crate::DataSet::set] reacts to a value that fails the item's check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum ValidationMode {
    /// No checking at all.
    #[default]
    Disabled,
    /// Invalid values are stored, and a warning is logged.
    Enabled,
    /// Invalid values are rejected with [`Error::Validation`][crate::Error::Validation].
    Strict,
}

thread_local! {
    static VALIDATION_MODE: Cell<ValidationMode> = const { Cell::new(ValidationMode::Disabled) };
}

/// Set the validation mode for the current thread.
pub fn set_validation_mode(mode: ValidationMode) {
    VALIDATION_MODE.with(|cell| cell.set(mode));
}

/// Get the validation mode of the current thread.
pub fn validation_mode() -> ValidationMode {
    VALIDATION_MODE.with(Cell::get)
}

/// Restores the previous validation mode when dropped.
///
/// ```
/// use guidata::config::{temporary_validation_mode, validation_mode, ValidationMode};
///
/// {
///     let _guard = temporary_validation_mode(ValidationMode::Strict);
///     assert_eq!(validation_mode(), ValidationMode::Strict);
/// }
/// assert_eq!(validation_mode(), ValidationMode::Disabled);
/// ```
#[must_use = "the previous mode is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ValidationModeGuard {
    previous: ValidationMode,
}

/// Switch the validation mode until the returned guard goes out of scope.
pub fn temporary_validation_mode(mode: ValidationMode) -> ValidationModeGuard {
    let previous = validation_mode();
    set_validation_mode(mode);
    ValidationModeGuard { previous }
}

impl Drop for ValidationModeGuard {
    fn drop(&mut self) {
        set_validation_mode(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_nested_modes() {
        assert_eq!(validation_mode(), ValidationMode::Disabled);
        {
            let _outer = temporary_validation_mode(ValidationMode::Enabled);
            {
                let _inner = temporary_validation_mode(ValidationMode::Strict);
                assert_eq!(validation_mode(), ValidationMode::Strict);
            }
            assert_eq!(validation_mode(), ValidationMode::Enabled);
        }
        assert_eq!(validation_mode(), ValidationMode::Disabled);
    }
}
