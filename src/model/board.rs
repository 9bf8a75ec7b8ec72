use serde::{Deserialize, Serialize};

/// A Kanban board. Owns an ordered sequence of columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
}

/// A column on a board, ordered within the board by `order_index`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub board_id: String,
    pub title: String,
    pub order_index: usize,
}

/// A card inside a column, ordered within the column by `order_index`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub column_id: String,
    pub title: String,
    pub order_index: usize,
}

impl Column {
    pub fn new(id: impl Into<String>, board_id: impl Into<String>, title: impl Into<String>) -> Self {
        Column {
            id: id.into(),
            board_id: board_id.into(),
            title: title.into(),
            order_index: 0,
        }
    }
}

impl Item {
    pub fn new(id: impl Into<String>, column_id: impl Into<String>, title: impl Into<String>) -> Self {
        Item {
            id: id.into(),
            column_id: column_id.into(),
            title: title.into(),
            order_index: 0,
        }
    }
}
