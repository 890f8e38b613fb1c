use std::sync::OnceLock;

use crate::error::SpireError;

/// Returns the stored value, running `init` only while the cell is unset.
///
/// A failed `init` leaves the cell unset. Two threads racing on an unset cell
/// may both run `init`; only the first stored value is kept and returned to
/// both.
pub(crate) fn get_or_try_init<T, F>(cell: &OnceLock<T>, init: F) -> Result<&T, SpireError>
where
    F: FnOnce() -> Result<T, SpireError>,
{
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = init()?;
    Ok(cell.get_or_init(|| value))
}
