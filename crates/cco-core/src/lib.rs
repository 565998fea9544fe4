use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "cco-core";

pub type RowId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Provider,
    Region,
    Sku,
    Price,
    Term,
    SavingPlan,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Provider,
        EntityKind::Region,
        EntityKind::Sku,
        EntityKind::Price,
        EntityKind::Term,
        EntityKind::SavingPlan,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::Provider => "providers",
            EntityKind::Region => "regions",
            EntityKind::Sku => "skus",
            EntityKind::Price => "prices",
            EntityKind::Term => "terms",
            EntityKind::SavingPlan => "saving_plans",
        }
    }

    /// Kinds holding a non-null foreign key to `self`; deleting a row of
    /// `self` cascades into them.
    pub fn children(self) -> &'static [EntityKind] {
        match self {
            EntityKind::Provider => &[EntityKind::Region],
            EntityKind::Region => &[EntityKind::Sku, EntityKind::SavingPlan],
            EntityKind::Sku => &[EntityKind::Price, EntityKind::Term],
            EntityKind::Price => &[EntityKind::Term],
            EntityKind::Term | EntityKind::SavingPlan => &[],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Provider => "provider",
            EntityKind::Region => "region",
            EntityKind::Sku => "sku",
            EntityKind::Price => "price",
            EntityKind::Term => "term",
            EntityKind::SavingPlan => "saving_plan",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: RowId,
    pub row: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRow {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub disable_flag: bool,
}

impl ProviderRow {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created_at: now,
            modified_at: now,
            disable_flag: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRow {
    pub provider_id: RowId,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub disable_flag: bool,
}

impl RegionRow {
    pub fn new(provider_id: RowId, code: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            provider_id,
            code: code.into(),
            created_at: now,
            modified_at: now,
            disable_flag: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuRow {
    pub region_id: RowId,
    pub arm_sku_name: String,
    pub name: String,
    pub usage_type: String,
    pub sku_code: Option<String>,
    pub product_name: Option<String>,
    pub product_family: Option<String>,
    pub vcpu: i32,
    pub memory: String,
    pub cpu_architecture_type: String,
    pub network: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub disable_flag: bool,
}

/// All `None` on the placeholder row the term import creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub sku_id: RowId,
    pub retail_price: Option<f64>,
    pub unit: Option<String>,
    pub effective_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub disable_flag: bool,
}

impl PriceRow {
    pub fn new(
        sku_id: RowId,
        retail_price: f64,
        unit: impl Into<String>,
        effective_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            sku_id,
            retail_price: Some(retail_price),
            unit: Some(unit.into()),
            effective_date: Some(effective_date),
            created_at: now,
            modified_at: now,
            disable_flag: false,
        }
    }

    pub fn placeholder(sku_id: RowId, now: DateTime<Utc>) -> Self {
        Self {
            sku_id,
            retail_price: None,
            unit: None,
            effective_date: None,
            created_at: now,
            modified_at: now,
            disable_flag: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.retail_price.is_none() && self.unit.is_none() && self.effective_date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRow {
    pub sku_id: RowId,
    pub price_id: RowId,
    pub offer_term_code: Option<String>,
    pub purchase_option: Option<String>,
    pub lease_contract_length: Option<String>,
    pub offering_class: Option<String>,
    pub discounted_sku: Option<String>,
    pub discounted_rate: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub disable_flag: bool,
}

impl TermRow {
    pub fn for_lease(
        sku_id: RowId,
        price_id: RowId,
        lease_contract_length: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            sku_id,
            price_id,
            offer_term_code: None,
            purchase_option: None,
            lease_contract_length: Some(lease_contract_length.into()),
            offering_class: None,
            discounted_sku: None,
            discounted_rate: None,
            created_at: now,
            modified_at: now,
            disable_flag: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingPlanRow {
    pub region_id: RowId,
    pub sku: String,
    pub discounted_sku: String,
    pub lease_contract_length: String,
    pub discounted_rate: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub disable_flag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    ProviderName,
    RegionCode,
    SkuCode,
    PriceSkuId,
}

impl Column {
    pub fn sql_name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::ProviderName => "name",
            Column::RegionCode => "code",
            Column::SkuCode => "sku_code",
            Column::PriceSkuId => "sku_id",
        }
    }

    pub fn applies_to(self, kind: EntityKind) -> bool {
        match self {
            Column::Id => true,
            Column::ProviderName => kind == EntityKind::Provider,
            Column::RegionCode => kind == EntityKind::Region,
            Column::SkuCode => kind == EntityKind::Sku,
            Column::PriceSkuId => kind == EntityKind::Price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateValue {
    Text(String),
    Id(RowId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub column: Column,
    pub value: PredicateValue,
}

impl Predicate {
    pub fn text(column: Column, value: impl Into<String>) -> Self {
        Self {
            column,
            value: PredicateValue::Text(value.into()),
        }
    }

    pub fn id(column: Column, value: RowId) -> Self {
        Self {
            column,
            value: PredicateValue::Id(value),
        }
    }
}

fn text_eq(field: &str, value: &PredicateValue) -> bool {
    matches!(value, PredicateValue::Text(v) if v == field)
}

fn opt_text_eq(field: Option<&str>, value: &PredicateValue) -> bool {
    field.is_some_and(|f| text_eq(f, value))
}

fn id_eq(field: RowId, value: &PredicateValue) -> bool {
    matches!(value, PredicateValue::Id(v) if *v == field)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NewRecord {
    Provider(ProviderRow),
    Region(RegionRow),
    Sku(SkuRow),
    Price(PriceRow),
    Term(TermRow),
    SavingPlan(SavingPlanRow),
}

impl NewRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            NewRecord::Provider(_) => EntityKind::Provider,
            NewRecord::Region(_) => EntityKind::Region,
            NewRecord::Sku(_) => EntityKind::Sku,
            NewRecord::Price(_) => EntityKind::Price,
            NewRecord::Term(_) => EntityKind::Term,
            NewRecord::SavingPlan(_) => EntityKind::SavingPlan,
        }
    }

    pub fn foreign_keys(&self) -> Vec<(EntityKind, RowId)> {
        match self {
            NewRecord::Provider(_) => Vec::new(),
            NewRecord::Region(r) => vec![(EntityKind::Provider, r.provider_id)],
            NewRecord::Sku(r) => vec![(EntityKind::Region, r.region_id)],
            NewRecord::Price(r) => vec![(EntityKind::Sku, r.sku_id)],
            NewRecord::Term(r) => vec![(EntityKind::Sku, r.sku_id), (EntityKind::Price, r.price_id)],
            NewRecord::SavingPlan(r) => vec![(EntityKind::Region, r.region_id)],
        }
    }

    pub fn into_stored(self, id: RowId) -> Record {
        match self {
            NewRecord::Provider(row) => Record::Provider(Stored { id, row }),
            NewRecord::Region(row) => Record::Region(Stored { id, row }),
            NewRecord::Sku(row) => Record::Sku(Stored { id, row }),
            NewRecord::Price(row) => Record::Price(Stored { id, row }),
            NewRecord::Term(row) => Record::Term(Stored { id, row }),
            NewRecord::SavingPlan(row) => Record::SavingPlan(Stored { id, row }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Provider(Stored<ProviderRow>),
    Region(Stored<RegionRow>),
    Sku(Stored<SkuRow>),
    Price(Stored<PriceRow>),
    Term(Stored<TermRow>),
    SavingPlan(Stored<SavingPlanRow>),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Provider(_) => EntityKind::Provider,
            Record::Region(_) => EntityKind::Region,
            Record::Sku(_) => EntityKind::Sku,
            Record::Price(_) => EntityKind::Price,
            Record::Term(_) => EntityKind::Term,
            Record::SavingPlan(_) => EntityKind::SavingPlan,
        }
    }

    pub fn id(&self) -> RowId {
        match self {
            Record::Provider(s) => s.id,
            Record::Region(s) => s.id,
            Record::Sku(s) => s.id,
            Record::Price(s) => s.id,
            Record::Term(s) => s.id,
            Record::SavingPlan(s) => s.id,
        }
    }

    pub fn foreign_keys(&self) -> Vec<(EntityKind, RowId)> {
        match self {
            Record::Provider(_) => Vec::new(),
            Record::Region(s) => vec![(EntityKind::Provider, s.row.provider_id)],
            Record::Sku(s) => vec![(EntityKind::Region, s.row.region_id)],
            Record::Price(s) => vec![(EntityKind::Sku, s.row.sku_id)],
            Record::Term(s) => vec![
                (EntityKind::Sku, s.row.sku_id),
                (EntityKind::Price, s.row.price_id),
            ],
            Record::SavingPlan(s) => vec![(EntityKind::Region, s.row.region_id)],
        }
    }

    /// Whether the row satisfies `predicate`. Columns that do not belong to
    /// this row's kind never match.
    pub fn matches(&self, predicate: &Predicate) -> bool {
        let v = &predicate.value;
        match (self, predicate.column) {
            (_, Column::Id) => id_eq(self.id(), v),
            (Record::Provider(s), Column::ProviderName) => text_eq(&s.row.name, v),
            (Record::Region(s), Column::RegionCode) => text_eq(&s.row.code, v),
            (Record::Sku(s), Column::SkuCode) => opt_text_eq(s.row.sku_code.as_deref(), v),
            (Record::Price(s), Column::PriceSkuId) => id_eq(s.row.sku_id, v),
            _ => false,
        }
    }

    pub fn into_provider(self) -> Option<Stored<ProviderRow>> {
        match self {
            Record::Provider(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_region(self) -> Option<Stored<RegionRow>> {
        match self {
            Record::Region(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_sku(self) -> Option<Stored<SkuRow>> {
        match self {
            Record::Sku(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_price(self) -> Option<Stored<PriceRow>> {
        match self {
            Record::Price(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_term(self) -> Option<Stored<TermRow>> {
        match self {
            Record::Term(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_saving_plan(self) -> Option<Stored<SavingPlanRow>> {
        match self {
            Record::SavingPlan(s) => Some(s),
            _ => None,
        }
    }
}
