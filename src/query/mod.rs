//! Predicate engine: criteria-set filters, rule-sets, free-text search,
//! sorting and grouping. Everything here is pure and works on in-memory
//! tasks only.

pub mod filter;
pub mod rules;
pub mod search;
pub mod sort;

pub use filter::Filter;
pub use rules::{DateRange, Logic, Operator, Property, Rule, RuleSet, RuleValue};
pub use sort::{GroupBy, SortDirection, SortKey, TaskGroup, group_tasks, sort_tasks};
