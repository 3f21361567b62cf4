//! Result shaping that runs after the search stages.
//!
//! Most of these are plain `fn(&mut RequestContext)` and are wrapped with
//! [`Stage::sync`](crate::pipeline::Stage::sync). The two that call out to a service,
//! [`Interpolate`] and [`ChangeLanguage`], are stage effects.

mod accuracy;
mod bbox;
mod confidence;
mod dedupe;
mod distance;
mod interpolate;
mod labels;
mod language;
mod naming;
mod placenames;
mod sort;
mod trim;

pub use accuracy::set_accuracy;
pub use bbox::parse_bounding_boxes;
pub use confidence::{confidence_score, confidence_score_fallback, confidence_score_reverse};
pub use dedupe::dedupe;
pub use distance::compute_distances;
pub use interpolate::Interpolate;
pub use labels::assign_labels;
pub use language::ChangeLanguage;
pub use naming::local_naming_conventions;
pub use placenames::{normalize_parent_ids, rename_placenames};
pub use sort::sort_response_data;
pub use trim::{trim_by_granularity, trim_by_granularity_structured};
