//! Site and order DTOs

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SequenceQuery {
    pub city: String,
    pub contractor_id: Option<String>,
    /// Delivery address; together with `contractor_id` selects a site to reuse
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SitePreviewRequest {
    pub city: String,
    pub contractor_id: Option<String>,
    pub delivery_address: Option<String>,
}
