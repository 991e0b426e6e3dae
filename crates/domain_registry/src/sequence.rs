//! Sequence numbering for sites and orders
//!
//! Site and order numbers are not stored as counters. They are read back
//! out of the identifiers already in the store: the next site number is the
//! largest `-<n>` suffix among the user's sites in a city plus one, and the
//! next order number is the largest `-ORD<n>` suffix among a site's orders
//! plus one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use core_kernel::UserId;

use crate::city::CityCode;
use crate::error::RegistryError;
use crate::id_generator::ORDER_MARKER;
use crate::ports::{row_text, RowStore, ScopeFilter, StoreRow, Table};

/// What a sequence lookup is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceScope {
    pub user_id: UserId,
    /// City name as entered; sites are grouped by its code
    pub city: String,
    pub contractor_id: Option<String>,
    pub delivery_address: Option<String>,
}

impl SequenceScope {
    pub fn new(user_id: UserId, city: impl Into<String>) -> Self {
        Self {
            user_id,
            city: city.into(),
            contractor_id: None,
            delivery_address: None,
        }
    }

    /// Narrows the scope to one contractor's delivery address
    pub fn for_delivery(
        mut self,
        contractor_id: impl Into<String>,
        delivery_address: impl Into<String>,
    ) -> Self {
        self.contractor_id = Some(contractor_id.into());
        self.delivery_address = Some(delivery_address.into());
        self
    }

    pub fn city_code(&self) -> CityCode {
        CityCode::from_city_name(&self.city)
    }
}

/// Next numbers for a scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCounts {
    pub site_number: u32,
    pub order_number: u32,
    /// Site to reuse when the contractor already has one at this address
    pub existing_site_id: Option<String>,
}

/// Parses the number after the last `-` of a site id
///
/// Returns `None` for a missing or non-numeric suffix.
pub fn parse_site_suffix(site_id: &str) -> Option<u32> {
    let (_, suffix) = site_id.rsplit_once('-')?;
    parse_digits(suffix)
}

/// Parses the number after the last `-ORD` of an order id
pub fn parse_order_suffix(order_id: &str) -> Option<u32> {
    let start = order_id.rfind(ORDER_MARKER)? + ORDER_MARKER.len();
    parse_digits(&order_id[start..])
}

fn parse_digits(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Returns `max + 1` over the parsed suffixes, malformed ones counting as 0
pub fn next_in_sequence<I>(suffixes: I, scope: &str) -> Result<u32, RegistryError>
where
    I: IntoIterator<Item = Option<u32>>,
{
    let max = suffixes.into_iter().map(|s| s.unwrap_or(0)).max().unwrap_or(0);
    max.checked_add(1)
        .ok_or_else(|| RegistryError::SequenceExhausted(scope.to_string()))
}

/// Trims, lowercases and collapses whitespace for address comparison
pub fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads sequence numbers out of the store
#[derive(Clone)]
pub struct SequenceCounter {
    store: Arc<dyn RowStore>,
}

impl SequenceCounter {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Computes the next site and order numbers for a scope
    ///
    /// # Errors
    ///
    /// Store failures propagate; the caller should show the preview as
    /// still pending and ask again.
    #[instrument(skip(self), fields(user_id = %scope.user_id, city = %scope.city))]
    pub async fn get_order_counts(
        &self,
        scope: &SequenceScope,
    ) -> Result<SequenceCounts, RegistryError> {
        let city_code = scope.city_code();
        let filters = [
            ScopeFilter::eq("created_by", scope.user_id.to_string()),
            ScopeFilter::eq("city_code", city_code.as_str()),
        ];
        let sites = self
            .store
            .query_scope(Table::Sites, &filters, "site_id")
            .await
            .map_err(RegistryError::from_store)?;

        let site_number = next_in_sequence(
            sites
                .iter()
                .map(|row| row_text(row, "site_id").and_then(|id| parse_site_suffix(&id))),
            &format!("sites in {}", city_code),
        )?;

        let existing_site_id = match (&scope.contractor_id, &scope.delivery_address) {
            (Some(contractor_id), Some(address)) => {
                matching_site(&sites, contractor_id, address)
            }
            _ => None,
        };

        let order_number = match &existing_site_id {
            Some(site_id) => self.next_order_number(site_id).await?,
            None => 1,
        };

        debug!(
            site_number,
            order_number,
            existing_site_id = existing_site_id.as_deref(),
            "Computed sequence counts"
        );

        Ok(SequenceCounts {
            site_number,
            order_number,
            existing_site_id,
        })
    }

    /// Next free site number after `taken` collided with another user's site
    ///
    /// Site ids carry the user code, not the user, so two users whose codes
    /// coincide draw from one `<MMYY>/<CITY>/<CODE>-` series. This reads that
    /// series across every user in the city.
    #[instrument(skip(self), fields(city_code = %city_code))]
    pub async fn next_site_number_after(
        &self,
        city_code: &CityCode,
        taken: &str,
    ) -> Result<u32, RegistryError> {
        let Some((head, _)) = taken.rsplit_once('-') else {
            return next_in_sequence([parse_site_suffix(taken)], taken);
        };
        let prefix = format!("{}-", head);

        let sites = self
            .store
            .query_scope(
                Table::Sites,
                &[ScopeFilter::eq("city_code", city_code.as_str())],
                "site_id",
            )
            .await
            .map_err(RegistryError::from_store)?;

        let series = sites.iter().filter_map(|row| {
            let site_id = row_text(row, "site_id")?;
            site_id.strip_prefix(prefix.as_str()).map(parse_digits)
        });
        next_in_sequence(
            series.chain([parse_site_suffix(taken)]),
            &format!("sites under {}", prefix),
        )
    }

    /// Next order number for an existing site
    pub async fn next_order_number(&self, site_id: &str) -> Result<u32, RegistryError> {
        let orders = self
            .store
            .query_scope(Table::Orders, &[ScopeFilter::eq("site_id", site_id)], "order_id")
            .await
            .map_err(RegistryError::from_store)?;

        next_in_sequence(
            orders
                .iter()
                .map(|row| row_text(row, "order_id").and_then(|id| parse_order_suffix(&id))),
            &format!("orders of {}", site_id),
        )
    }
}

/// Picks the contractor's site at this address, the highest-numbered one if several
fn matching_site(sites: &[StoreRow], contractor_id: &str, address: &str) -> Option<String> {
    let wanted = normalize_address(address);
    if wanted.is_empty() {
        return None;
    }

    sites
        .iter()
        .filter(|row| {
            row_text(row, "contractor_id").as_deref() == Some(contractor_id)
                && row_text(row, "delivery_address")
                    .map(|a| normalize_address(&a) == wanted)
                    .unwrap_or(false)
        })
        .filter_map(|row| row_text(row, "site_id").map(|id| id.into_owned()))
        .max_by_key(|id| parse_site_suffix(id).unwrap_or(0))
}
