//! Keypath resolution for colrec.
//!
//! A keypath is a separator-joined list of object keys (`"imu.accel.x"`)
//! that addresses a leaf inside a nested JSON record. [`resolve`] walks the
//! record and returns the leaf, or `None` when any key along the way is
//! missing. Absence is expected and common; it is never an error.
//!
//! [`KeypathConfig`] holds the ordered keypaths configured for each group
//! together with the single, validated [`Separator`].

pub mod config;
pub mod error;
pub mod resolve;
pub mod separator;

pub use config::{KeypathConfig, KeypathConfigBuilder, DEFAULT_SEEDED_FIELDS};
pub use error::{KeypathError, KeypathResult};
pub use resolve::{resolve, DATE_WRAPPER_KEY};
pub use separator::{Separator, ARTIFACT_DELIMITER};
