//! Dense zero-based ordering within parent containers.
//!
//! Every orderable entity carries an `order_index` that, at rest, is exactly
//! `0..n-1` within its parent (column, board, section, or project). Entities
//! arrive from the store in no particular order; everything here sorts by
//! `(order_index, id)` so ties and gaps resolve deterministically.

use std::collections::BTreeSet;

use crate::model::{Column, Item, ProjectTask, Row, Section};

/// An entity positioned inside a parent container
pub trait Ordered: Clone {
    fn id(&self) -> &str;
    fn parent_id(&self) -> &str;
    fn set_parent_id(&mut self, parent: &str);
    fn order_index(&self) -> usize;
    fn set_order_index(&mut self, index: usize);
    fn to_row(&self) -> Row;
}

impl Ordered for Item {
    fn id(&self) -> &str {
        &self.id
    }
    fn parent_id(&self) -> &str {
        &self.column_id
    }
    fn set_parent_id(&mut self, parent: &str) {
        self.column_id = parent.to_string();
    }
    fn order_index(&self) -> usize {
        self.order_index
    }
    fn set_order_index(&mut self, index: usize) {
        self.order_index = index;
    }
    fn to_row(&self) -> Row {
        Row::Item(self.clone())
    }
}

impl Ordered for Column {
    fn id(&self) -> &str {
        &self.id
    }
    fn parent_id(&self) -> &str {
        &self.board_id
    }
    fn set_parent_id(&mut self, parent: &str) {
        self.board_id = parent.to_string();
    }
    fn order_index(&self) -> usize {
        self.order_index
    }
    fn set_order_index(&mut self, index: usize) {
        self.order_index = index;
    }
    fn to_row(&self) -> Row {
        Row::Column(self.clone())
    }
}

impl Ordered for ProjectTask {
    fn id(&self) -> &str {
        &self.id
    }
    fn parent_id(&self) -> &str {
        &self.section
    }
    fn set_parent_id(&mut self, parent: &str) {
        self.section = parent.to_string();
    }
    fn order_index(&self) -> usize {
        self.order_index
    }
    fn set_order_index(&mut self, index: usize) {
        self.order_index = index;
    }
    fn to_row(&self) -> Row {
        Row::Task(self.clone())
    }
}

impl Ordered for Section {
    fn id(&self) -> &str {
        &self.id
    }
    fn parent_id(&self) -> &str {
        &self.project_id
    }
    fn set_parent_id(&mut self, parent: &str) {
        self.project_id = parent.to_string();
    }
    fn order_index(&self) -> usize {
        self.order_index
    }
    fn set_order_index(&mut self, index: usize) {
        self.order_index = index;
    }
    fn to_row(&self) -> Row {
        Row::Section(self.clone())
    }
}

/// Members of `parent`, sorted ascending by `order_index` (ties by id).
pub fn sorted_members<'a, T: Ordered>(all: &'a [T], parent: &str) -> Vec<&'a T> {
    let mut members: Vec<&T> = all.iter().filter(|e| e.parent_id() == parent).collect();
    members.sort_by(|a, b| {
        a.order_index()
            .cmp(&b.order_index())
            .then_with(|| a.id().cmp(b.id()))
    });
    members
}

/// Ids of the members of `parent`, in display order.
pub fn sorted_ids<T: Ordered>(all: &[T], parent: &str) -> Vec<String> {
    sorted_members(all, parent)
        .into_iter()
        .map(|e| e.id().to_string())
        .collect()
}

/// Order index a newly created member of `parent` should get.
pub fn next_order_index<T: Ordered>(all: &[T], parent: &str) -> usize {
    all.iter().filter(|e| e.parent_id() == parent).count()
}

/// True when the members of `parent` hold exactly the indices `0..n-1`.
pub fn is_dense<T: Ordered>(all: &[T], parent: &str) -> bool {
    sorted_members(all, parent)
        .iter()
        .enumerate()
        .all(|(pos, e)| e.order_index() == pos)
}

/// Distinct parent ids referenced by `all`, sorted.
pub fn parents<T: Ordered>(all: &[T]) -> BTreeSet<String> {
    all.iter().map(|e| e.parent_id().to_string()).collect()
}

/// Assign `order_index = position` to each id in `ordered_ids`, all of which
/// must belong to `parent`. Returns the ids whose index changed.
pub fn assign_positions<T: Ordered>(
    all: &mut [T],
    parent: &str,
    ordered_ids: &[String],
) -> Vec<String> {
    let mut changed = Vec::new();
    for (pos, id) in ordered_ids.iter().enumerate() {
        if let Some(entity) = all
            .iter_mut()
            .find(|e| e.id() == id && e.parent_id() == parent)
            && entity.order_index() != pos
        {
            entity.set_order_index(pos);
            changed.push(id.clone());
        }
    }
    changed
}

/// Rewrite the members of `parent` to `0..n-1`, keeping their current
/// relative order. Returns the ids whose index changed.
pub fn densify<T: Ordered>(all: &mut [T], parent: &str) -> Vec<String> {
    let order = sorted_ids(all, parent);
    assign_positions(all, parent, &order)
}

/// Densify every container referenced by `all`.
pub fn densify_all<T: Ordered>(all: &mut [T]) -> Vec<String> {
    let mut changed = Vec::new();
    for parent in parents(all) {
        changed.extend(densify(all, &parent));
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(id: &str, column: &str, idx: usize) -> Item {
        let mut i = Item::new(id, column, id.to_uppercase());
        i.order_index = idx;
        i
    }

    #[test]
    fn test_sorted_members_orders_by_index_then_id() {
        let items = vec![
            item("c", "todo", 2),
            item("b", "todo", 0),
            item("a", "todo", 0),
            item("x", "done", 0),
        ];
        assert_eq!(sorted_ids(&items, "todo"), vec!["a", "b", "c"]);
        assert_eq!(sorted_ids(&items, "done"), vec!["x"]);
        assert!(sorted_ids(&items, "missing").is_empty());
    }

    #[test]
    fn test_next_order_index_counts_siblings() {
        let items = vec![item("a", "todo", 0), item("b", "todo", 1), item("c", "done", 0)];
        assert_eq!(next_order_index(&items, "todo"), 2);
        assert_eq!(next_order_index(&items, "empty"), 0);
    }

    #[test]
    fn test_densify_closes_gaps() {
        let mut items = vec![item("a", "todo", 0), item("c", "todo", 7), item("b", "todo", 3)];
        assert!(!is_dense(&items, "todo"));

        let changed = densify(&mut items, "todo");
        assert_eq!(changed, vec!["b", "c"]);
        assert!(is_dense(&items, "todo"));
        assert_eq!(sorted_ids(&items, "todo"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_densify_resolves_duplicates() {
        let mut items = vec![item("b", "todo", 1), item("a", "todo", 1)];
        densify(&mut items, "todo");
        assert_eq!(sorted_ids(&items, "todo"), vec!["a", "b"]);
        assert!(is_dense(&items, "todo"));
    }

    #[test]
    fn test_densify_all_touches_each_container() {
        let mut items = vec![item("a", "todo", 4), item("b", "done", 9), item("c", "done", 0)];
        let mut changed = densify_all(&mut items);
        changed.sort();
        assert_eq!(changed, vec!["a", "b"]);
        assert!(is_dense(&items, "todo"));
        assert!(is_dense(&items, "done"));
    }

    #[test]
    fn test_assign_positions_ignores_foreign_ids() {
        let mut items = vec![item("a", "todo", 0), item("b", "todo", 1), item("z", "done", 0)];
        let changed = assign_positions(
            &mut items,
            "todo",
            &["b".to_string(), "a".to_string(), "z".to_string()],
        );
        assert_eq!(changed, vec!["b", "a"]);
        assert_eq!(items[2].order_index, 0);
    }
}
