use async_trait::async_trait;
use cco_core::{RowId, SkuRow};
use cco_storage::{DocumentFetcher, FetchError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};

pub const CRATE_NAME: &str = "cco-adapters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Azure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageShape {
    pub items_field: &'static str,
    pub next_field: &'static str,
}

pub const RETAIL_PRICES_SHAPE: PageShape = PageShape {
    items_field: "Items",
    next_field: "NextPageLink",
};

const RESOURCE_SKUS_FIELD: &str = "value";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("document has no `{field}` array")]
    MissingItemList { field: &'static str },
    #[error("bearer token unavailable: {0}")]
    Token(String),
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, AdapterError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn from_env() -> Self {
        Self {
            token: std::env::var("AZURE_BEARER_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String, AdapterError> {
        self.token
            .clone()
            .ok_or_else(|| AdapterError::Token("AZURE_BEARER_TOKEN not set".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub url: String,
    pub document: JsonValue,
    pub next_page: Option<String>,
}

impl FetchedPage {
    pub fn items(&self, shape: PageShape) -> Result<&[JsonValue], AdapterError> {
        self.document
            .get(shape.items_field)
            .and_then(JsonValue::as_array)
            .map(Vec::as_slice)
            .ok_or(AdapterError::MissingItemList {
                field: shape.items_field,
            })
    }
}

fn continuation(document: &JsonValue, shape: PageShape) -> Option<String> {
    document
        .get(shape.next_field)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub async fn fetch_page(
    fetcher: &dyn DocumentFetcher,
    url: &str,
    shape: PageShape,
    bearer_token: Option<&str>,
) -> Result<FetchedPage, FetchError> {
    let document = fetcher.fetch_document(url, bearer_token).await?;
    let next_page = continuation(&document, shape);
    Ok(FetchedPage {
        url: url.to_string(),
        document,
        next_page,
    })
}

pub fn decode_item<T: DeserializeOwned>(item: &JsonValue) -> Result<T, serde_json::Error> {
    T::deserialize(item)
}

// Fields an ingestor does not key on read a wrongly typed value as `None`
// instead of failing the whole item.
fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::String(value) => Some(value),
        _ => None,
    })
}

fn loose_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(JsonValue::deserialize(deserializer)?.as_f64())
}

fn loose_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<JsonValue>, D::Error> {
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Array(items) => items,
        _ => Vec::new(),
    })
}

/// Retail price item, as read by the SKU import. `armSkuName` and `type`
/// are the join keys and must be strings when present.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuListing {
    #[serde(default, deserialize_with = "loose_string")]
    pub sku_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub service_family: Option<String>,
    #[serde(default)]
    pub arm_sku_name: Option<String>,
    #[serde(default, rename = "type")]
    pub usage_type: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub arm_region_name: Option<String>,
}

impl SkuListing {
    pub fn into_row(
        self,
        arm_sku_name: String,
        usage_type: String,
        matched: &ResourceSku,
        region_id: RowId,
        now: DateTime<Utc>,
    ) -> SkuRow {
        let profile = CapabilityProfile::extract(&matched.capabilities);
        SkuRow {
            region_id,
            arm_sku_name,
            name: matched.name.clone(),
            usage_type,
            sku_code: self.sku_id,
            product_name: self.product_name,
            product_family: self.service_family,
            vcpu: profile.vcpu,
            memory: profile.memory,
            cpu_architecture_type: profile.cpu_architecture_type,
            network: profile.network,
            created_at: now,
            modified_at: now,
            disable_flag: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceListing {
    #[serde(default)]
    pub sku_id: Option<String>,
    #[serde(default, deserialize_with = "loose_f64")]
    pub retail_price: Option<f64>,
    #[serde(default, deserialize_with = "loose_string")]
    pub unit_of_measure: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub effective_start_date: Option<String>,
}

/// `savingsPlan` is kept raw and judged by [`SavingsListing::plans`]; its
/// entries are decoded one by one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsListing {
    #[serde(default)]
    pub sku_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub arm_sku_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub arm_region_name: Option<String>,
    #[serde(default)]
    pub savings_plan: Option<JsonValue>,
}

impl SavingsListing {
    pub fn plans(&self) -> Option<&[JsonValue]> {
        self.savings_plan
            .as_ref()
            .and_then(JsonValue::as_array)
            .map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsPlanEntry {
    #[serde(default, deserialize_with = "loose_string")]
    pub term: Option<String>,
    #[serde(default, deserialize_with = "loose_f64")]
    pub retail_price: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    pub unit_price: Option<f64>,
}

impl SavingsPlanEntry {
    pub fn discounted_rate(&self) -> Option<f64> {
        self.retail_price.or(self.unit_price)
    }
}

pub fn parse_effective_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceSku {
    pub name: String,
    #[serde(default, deserialize_with = "loose_list")]
    pub capabilities: Vec<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkuCapability {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapabilityProfile {
    pub vcpu: i32,
    pub memory: String,
    pub cpu_architecture_type: String,
    pub network: String,
}

impl CapabilityProfile {
    pub fn extract(capabilities: &[JsonValue]) -> Self {
        let mut profile = Self::default();
        for raw in capabilities {
            let Ok(capability) = decode_item::<SkuCapability>(raw) else {
                debug!(capability = %raw, "ignoring malformed capability");
                continue;
            };
            match capability.name.as_str() {
                "vCPUs" => {
                    profile.vcpu = capability.value.trim().parse().unwrap_or_else(|_| {
                        warn!(value = %capability.value, "non-numeric vCPUs, defaulting to 0");
                        0
                    });
                }
                "MemoryGB" => profile.memory = capability.value,
                "CpuArchitectureType" => profile.cpu_architecture_type = capability.value,
                "MaxNetworkInterfaces" => profile.network = capability.value,
                _ => {}
            }
        }
        profile
    }
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityIndex {
    entries: Vec<ResourceSku>,
}

impl CapabilityIndex {
    pub fn new(entries: Vec<ResourceSku>) -> Self {
        Self { entries }
    }

    /// Entries without a string `name` can never match and are dropped; a
    /// malformed capability list only empties that entry's capabilities.
    pub fn from_document(document: &JsonValue) -> Result<Self, AdapterError> {
        let raw = document
            .get(RESOURCE_SKUS_FIELD)
            .and_then(JsonValue::as_array)
            .ok_or(AdapterError::MissingItemList {
                field: RESOURCE_SKUS_FIELD,
            })?;

        let mut entries = Vec::with_capacity(raw.len());
        for item in raw {
            match decode_item::<ResourceSku>(item) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(error = %err, "dropping malformed capability entry"),
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&ResourceSku> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

pub async fn load_capability_index(
    fetcher: &dyn DocumentFetcher,
    tokens: &dyn TokenProvider,
    url: &str,
) -> Result<CapabilityIndex, AdapterError> {
    let token = tokens.bearer_token().await?;
    let document = fetcher.fetch_document(url, Some(&token)).await?;
    CapabilityIndex::from_document(&document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cco_storage::StaticDocumentFetcher;
    use chrono::TimeZone;
    use serde_json::json;

    fn capability_document() -> JsonValue {
        json!({
            "value": [
                {
                    "resourceType": "virtualMachines",
                    "name": "Standard_D2s_v3",
                    "capabilities": [
                        { "name": "vCPUs", "value": "2" },
                        { "name": "MemoryGB", "value": "8" },
                        { "name": "CpuArchitectureType", "value": "x64" },
                        { "name": "MaxNetworkInterfaces", "value": "2" },
                        { "name": "PremiumIO", "value": "True" }
                    ]
                },
                { "name": 17 },
                {
                    "resourceType": "virtualMachines",
                    "name": "Standard_D2s_v3",
                    "capabilities": [{ "name": "vCPUs", "value": "64" }]
                },
                { "name": "Standard_B1s" }
            ]
        })
    }

    #[test]
    fn capability_extraction_reads_known_names() {
        let index = CapabilityIndex::from_document(&capability_document()).unwrap();
        let entry = index.find("Standard_D2s_v3").unwrap();
        let profile = CapabilityProfile::extract(&entry.capabilities);
        assert_eq!(
            profile,
            CapabilityProfile {
                vcpu: 2,
                memory: "8".into(),
                cpu_architecture_type: "x64".into(),
                network: "2".into(),
            }
        );
    }

    #[test]
    fn non_numeric_vcpus_defaults_to_zero() {
        let profile = CapabilityProfile::extract(&[
            json!({ "name": "vCPUs", "value": "two" }),
            json!({ "name": "MemoryGB", "value": "8" }),
        ]);
        assert_eq!(profile.vcpu, 0);
        assert_eq!(profile.memory, "8");
    }

    #[test]
    fn malformed_capability_entries_are_ignored() {
        let profile = CapabilityProfile::extract(&[
            json!({ "name": "vCPUs", "value": 4 }),
            json!("MemoryGB"),
            json!({ "name": "MaxNetworkInterfaces", "value": "8" }),
        ]);
        assert_eq!(profile.vcpu, 0);
        assert_eq!(profile.network, "8");
    }

    #[test]
    fn matcher_is_exact_first_match() {
        let index = CapabilityIndex::from_document(&capability_document()).unwrap();
        assert_eq!(index.len(), 3);
        let first = index.find("Standard_D2s_v3").unwrap();
        assert_eq!(first.capabilities.len(), 5);
        assert!(index.find("standard_d2s_v3").is_none());
        assert!(index.find("Standard_D2s").is_none());
        assert!(index.find("Standard_B1s").unwrap().capabilities.is_empty());
    }

    #[test]
    fn malformed_capability_list_keeps_entry_matchable() {
        let index = CapabilityIndex::from_document(&json!({
            "value": [
                { "name": "Standard_X", "capabilities": null },
                { "name": "Standard_X", "capabilities": [{ "name": "vCPUs", "value": "4" }] },
                { "name": "Standard_Y", "capabilities": "oops" }
            ]
        }))
        .unwrap();
        assert_eq!(index.len(), 3);
        let first = index.find("Standard_X").unwrap();
        assert!(first.capabilities.is_empty());
        assert_eq!(CapabilityProfile::extract(&first.capabilities), CapabilityProfile::default());
        assert!(index.find("Standard_Y").is_some());
    }

    #[test]
    fn capability_document_without_entry_list_is_rejected() {
        let err = CapabilityIndex::from_document(&json!({ "value": {} })).unwrap_err();
        assert!(matches!(err, AdapterError::MissingItemList { field: "value" }));
    }

    #[test]
    fn sku_listing_requires_string_join_keys() {
        let ok: SkuListing = decode_item(&json!({
            "skuId": "DZH318Z0BQ4L/00F9",
            "armSkuName": "Standard_D2s_v3",
            "type": "Consumption",
            "armRegionName": "eastus",
            "retailPrice": 0.096
        }))
        .unwrap();
        assert_eq!(ok.usage_type.as_deref(), Some("Consumption"));
        assert!(decode_item::<SkuListing>(&json!({ "armSkuName": 5 })).is_err());
        assert!(decode_item::<SkuListing>(&json!({ "type": false })).is_err());

        let loose: SkuListing = decode_item(&json!({
            "skuId": 9,
            "productName": 42,
            "serviceFamily": ["Compute"],
            "armSkuName": "Standard_D2s_v3",
            "type": "Consumption",
            "armRegionName": null
        }))
        .unwrap();
        assert_eq!(loose.sku_id, None);
        assert_eq!(loose.product_name, None);
        assert_eq!(loose.service_family, None);
        assert_eq!(loose.arm_sku_name.as_deref(), Some("Standard_D2s_v3"));
        assert!(decode_item::<SkuListing>(&json!("not an object")).is_err());
    }

    #[test]
    fn non_key_price_fields_tolerate_wrong_types() {
        let price: PriceListing = decode_item(&json!({
            "skuId": "A",
            "retailPrice": "cheap",
            "unitOfMeasure": 1,
            "effectiveStartDate": 20230501
        }))
        .unwrap();
        assert_eq!(price.sku_id.as_deref(), Some("A"));
        assert_eq!(price.retail_price, None);
        assert_eq!(price.unit_of_measure, None);
        assert_eq!(price.effective_start_date, None);
        assert!(decode_item::<PriceListing>(&json!({ "skuId": 1 })).is_err());

        let listing: SavingsListing =
            decode_item(&json!({ "skuId": "A", "armRegionName": 7, "savingsPlan": [] })).unwrap();
        assert_eq!(listing.arm_region_name, None);
        assert!(decode_item::<SavingsListing>(&json!({ "skuId": ["A"] })).is_err());

        let entry: SavingsPlanEntry =
            decode_item(&json!({ "term": 3, "retailPrice": null, "unitPrice": 0.5 })).unwrap();
        assert_eq!(entry.term, None);
        assert_eq!(entry.discounted_rate(), Some(0.5));
    }

    #[test]
    fn savings_plans_must_be_an_array() {
        let wrong: SavingsListing = decode_item(&json!({ "skuId": "A", "savingsPlan": "none" })).unwrap();
        assert!(wrong.plans().is_none());
        let absent: SavingsListing = decode_item(&json!({ "skuId": "A" })).unwrap();
        assert!(absent.plans().is_none());
        let empty: SavingsListing = decode_item(&json!({ "skuId": "A", "savingsPlan": [] })).unwrap();
        assert_eq!(empty.plans().map(<[JsonValue]>::len), Some(0));
    }

    #[test]
    fn effective_dates_are_rfc3339() {
        assert_eq!(
            parse_effective_date("2023-05-01T00:00:00Z"),
            Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).single()
        );
        assert!(parse_effective_date("05/01/2023").is_none());
    }

    #[test]
    fn sku_listing_into_row_joins_capabilities() {
        let listing: SkuListing = decode_item(&json!({
            "skuId": "DZH318Z0BQ4L/00F9",
            "productName": "Virtual Machines DSv3 Series",
            "serviceFamily": "Compute",
            "armSkuName": "Standard_D2s_v3",
            "type": "Consumption",
            "armRegionName": "eastus"
        }))
        .unwrap();
        let index = CapabilityIndex::from_document(&capability_document()).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).single().unwrap();
        let row = listing.into_row(
            "Standard_D2s_v3".into(),
            "Consumption".into(),
            index.find("Standard_D2s_v3").unwrap(),
            3,
            now,
        );
        assert_eq!(row.region_id, 3);
        assert_eq!(row.vcpu, 2);
        assert_eq!(row.memory, "8");
        assert_eq!(row.sku_code.as_deref(), Some("DZH318Z0BQ4L/00F9"));
        assert_eq!(row.product_family.as_deref(), Some("Compute"));
        assert!(!row.disable_flag);
    }

    #[tokio::test]
    async fn pages_expose_items_and_continuation() {
        let fetcher = StaticDocumentFetcher::new()
            .with_document(
                "https://prices.test/1",
                json!({ "Items": [{ "skuId": "A" }], "NextPageLink": "https://prices.test/2" }),
            )
            .with_document(
                "https://prices.test/2",
                json!({ "Items": [], "NextPageLink": "" }),
            );

        let first = fetch_page(&fetcher, "https://prices.test/1", RETAIL_PRICES_SHAPE, None)
            .await
            .unwrap();
        assert_eq!(first.items(RETAIL_PRICES_SHAPE).unwrap().len(), 1);
        assert_eq!(first.next_page.as_deref(), Some("https://prices.test/2"));

        let last = fetch_page(&fetcher, "https://prices.test/2", RETAIL_PRICES_SHAPE, None)
            .await
            .unwrap();
        assert!(last.next_page.is_none());
    }

    #[tokio::test]
    async fn capability_index_fetch_attaches_bearer_token() {
        let fetcher = StaticDocumentFetcher::new()
            .with_document("https://skus.test", capability_document());
        let tokens = StaticTokenProvider::new("secret-token");
        let index = load_capability_index(&fetcher, &tokens, "https://skus.test")
            .await
            .unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(
            fetcher.requests().await,
            vec![("https://skus.test".to_string(), Some("secret-token".to_string()))]
        );
    }

    #[tokio::test]
    async fn missing_token_fails_before_fetching() {
        let fetcher = StaticDocumentFetcher::new();
        let err = load_capability_index(&fetcher, &StaticTokenProvider::default(), "https://skus.test")
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Token(_)));
        assert!(fetcher.requests().await.is_empty());
    }
}
