pub mod planner;

pub use planner::{parse_pattern, regexp_query, Query, QueryOp};
