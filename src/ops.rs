mod aggregate;
mod concat;
mod filter;
mod flat_map;
mod group_by;
mod join;
mod map;
mod order_by;
mod param;
mod reverse;
mod set_ops;
mod window;
mod zip;

pub use group_by::{ActiveLookup, Grouping};
