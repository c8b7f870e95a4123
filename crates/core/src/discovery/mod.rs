//! Discovery request model: selectors, filters and tag expressions

pub mod filter;
pub mod request;
pub mod selector;
pub mod tag_expression;

pub use filter::{
    evaluate_filters, exclude_class_name_patterns, exclude_display_name_pattern,
    exclude_tag_expression, exclude_tags, exclude_unique_id_prefix, include_class_name_patterns,
    include_display_name_pattern, include_tag_expression, include_tags, include_unique_id_prefix,
    DiscoveryFilter, FilterCandidate, FilterMode, FilterPredicate, FilterResult,
};
pub use request::{EngineDiscoveryRequest, EngineFilter, LauncherDiscoveryRequestBuilder};
pub use selector::{
    select_class, select_classpath_root, select_method, select_method_parts, select_package,
    select_tag_expression, select_unique_id, select_unique_id_str, DiscoverySelector,
};
pub use tag_expression::TagExpression;
