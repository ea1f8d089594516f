use super::traits::{Model, StructFieldNames};
use crate::constants;
use course_forum::{FromPgRow, GetFieldNames};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default, FromPgRow, GetFieldNames)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub order_num: i32,
}

impl Model for Course {
    fn table_name() -> &'static str {
        constants::COURSE_TABLE_NAME
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, FromPgRow, GetFieldNames)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
}

impl Model for Category {
    fn table_name() -> &'static str {
        constants::CATEGORY_TABLE_NAME
    }
}
