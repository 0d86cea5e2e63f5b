use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::repos::production_repo::ProductionRow;

#[derive(Debug, Serialize)]
pub struct ProductionResponse {
    pub id: i64,
    pub company_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<ProductionRow> for ProductionResponse {
    fn from(row: ProductionRow) -> Self {
        Self {
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}
