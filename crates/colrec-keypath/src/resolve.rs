use serde_json::Value;

use crate::separator::Separator;

/// Key marking a wrapped timestamp object, e.g. `{"$date": 1700000000000}`.
pub const DATE_WRAPPER_KEY: &str = "$date";

/// Resolve `path` inside `record`.
///
/// The path is split on `separator` and walked key by key through nested
/// objects. Returns `None` as soon as a key is missing or an intermediate
/// value is not an object. A resolved object carrying [`DATE_WRAPPER_KEY`]
/// is unwrapped to the wrapped value.
pub fn resolve<'a>(record: &'a Value, path: &str, separator: &Separator) -> Option<&'a Value> {
    let mut current = record;
    for key in path.split(separator.as_str()) {
        current = current.as_object()?.get(key)?;
    }
    match current.as_object().and_then(|obj| obj.get(DATE_WRAPPER_KEY)) {
        Some(wrapped) => Some(wrapped),
        None => Some(current),
    }
}
