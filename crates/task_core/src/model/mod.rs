mod filter;
mod task;
pub mod timestamp;

pub use filter::{FilterCriteria, StatusScope};
pub use task::{Annotation, Priority, Task, TaskStatus};

use serde::{Deserialize, Deserializer};

/// Treats an explicit JSON `null` list the same as a missing one.
pub(crate) fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
