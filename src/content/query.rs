//! Sort, filter and limit over document lists.
//!
//! Always applied in that order: sort → filter → limit.

use super::{document::Document, value::compare_fields};
use crate::schema::{Filter, FilterMethod, Order, Query};

/// Stable sort by `field`. Ties keep their input order in both directions.
///
/// Without a field the input order is kept, reversed for `desc`.
pub fn sort_by_field(docs: &mut [&Document], field: Option<&str>, order: Order) {
    let Some(field) = field else {
        if order == Order::Desc {
            docs.reverse();
        }
        return;
    };
    docs.sort_by(|a, b| {
        let ordering =
            compare_fields(a.query_field(field).as_deref(), b.query_field(field).as_deref());
        match order {
            Order::Asc => ordering,
            Order::Desc => ordering.reverse(),
        }
    });
}

/// Case-sensitive equality on the stringified value.
///
/// A list matches when any element matches; a missing field never matches.
pub fn matches(doc: &Document, filter: &Filter) -> bool {
    match filter.method {
        FilterMethod::Equals => doc.value_set(&filter.field).iter().any(|v| *v == filter.value),
    }
}

impl Query {
    /// Apply this query to `docs`.
    pub fn apply<'a>(&self, mut docs: Vec<&'a Document>) -> Vec<&'a Document> {
        sort_by_field(&mut docs, self.sort.as_deref(), self.order);
        if let Some(filter) = &self.filter {
            docs.retain(|doc| matches(doc, filter));
        }
        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}
