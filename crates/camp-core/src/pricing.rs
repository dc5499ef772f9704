//! # Pricing
//!
//! Pricing items and the pure price calculation.
//!
//! ```text
//! per_child = Σ selected item amounts (required items always included)
//! raw       = per_child × children
//! discount  = sibling rule × (children − 1)     when children ≥ 2
//! total     = max(raw − discount, 0)
//! ```
//!
//! All arithmetic is on integer minor units. Nothing here touches I/O, so
//! identical inputs always give identical output.

use crate::camp::{DiscountType, SiblingDiscount};
use crate::error::{FieldError, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Kind of pricing line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingItemType {
    BaseFee,
    AddOn,
    Discount,
}

impl PricingItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingItemType::BaseFee => "base_fee",
            PricingItemType::AddOn => "add_on",
            PricingItemType::Discount => "discount",
        }
    }
}

impl FromStr for PricingItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base_fee" => Ok(PricingItemType::BaseFee),
            "add_on" => Ok(PricingItemType::AddOn),
            "discount" => Ok(PricingItemType::Discount),
            other => Err(format!("Unknown pricing item type: {}", other)),
        }
    }
}

/// A priced line a guardian can select per registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingItem {
    pub id: Uuid,
    /// `None` applies to every camp
    #[serde(default)]
    pub camp_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Minor units; negative for discount lines
    pub amount: i64,
    pub item_type: PricingItemType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl PricingItem {
    pub fn applies_to(&self, camp_id: Uuid) -> bool {
        self.camp_id.map_or(true, |id| id == camp_id)
    }

    pub fn snapshot(&self) -> SelectedItem {
        SelectedItem {
            item_id: self.id,
            name: self.name.clone(),
            amount: self.amount,
            item_type: self.item_type,
        }
    }

    pub fn apply_patch(&mut self, patch: PricingItemPatch) -> Result<(), ValidationError> {
        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(ValidationError::field("name", "Name is required"));
            }
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(camp_id) = patch.camp_id {
            self.camp_id = camp_id;
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(item_type) = patch.item_type {
            self.item_type = item_type;
        }
        if let Some(required) = patch.is_required {
            self.is_required = required;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        if let Some(order) = patch.display_order {
            self.display_order = order;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Historical copy of a pricing line as charged on a registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedItem {
    pub item_id: Uuid,
    pub name: String,
    pub amount: i64,
    pub item_type: PricingItemType,
}

/// Admin request to create a pricing item
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingItemDraft {
    #[serde(default)]
    pub camp_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub amount: i64,
    pub item_type: PricingItemType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub display_order: i32,
}

impl PricingItemDraft {
    pub fn into_item(self) -> Result<PricingItem, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::field("name", "Name is required"));
        }
        let now = Utc::now();
        Ok(PricingItem {
            id: Uuid::new_v4(),
            camp_id: self.camp_id,
            name: self.name.trim().to_string(),
            description: self.description,
            amount: self.amount,
            item_type: self.item_type,
            is_required: self.is_required,
            is_active: true,
            display_order: self.display_order,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Admin request to edit a pricing item
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingItemPatch {
    /// `Some(None)` moves the item to "all camps"
    #[serde(default, with = "double_option")]
    pub camp_id: Option<Option<Uuid>>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub amount: Option<i64>,
    pub item_type: Option<PricingItemType>,
    pub is_required: Option<bool>,
    pub is_active: Option<bool>,
    pub display_order: Option<i32>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Result of a price calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub children: u32,
    pub per_child_subtotal: i64,
    pub raw_total: i64,
    pub sibling_discount: i64,
    pub total: i64,
}

/// Pure pricing functions
pub struct PricingEngine;

impl PricingEngine {
    /// Effective item list for a camp: every active required item that
    /// applies to the camp plus the guardian's selection.
    ///
    /// Selecting an unknown, archived, or other-camp item is an error.
    pub fn resolve_selection(
        catalog: &[PricingItem],
        camp_id: Uuid,
        selected: &[Uuid],
    ) -> Result<Vec<PricingItem>, ValidationError> {
        let mut details = Vec::new();
        for (index, id) in selected.iter().enumerate() {
            let ok = catalog
                .iter()
                .any(|item| item.id == *id && item.is_active && item.applies_to(camp_id));
            if !ok {
                details.push(FieldError::new(
                    format!("selectedItems[{}]", index),
                    format!("Pricing item {} is not available for this camp", id),
                ));
            }
        }
        if !details.is_empty() {
            return Err(ValidationError::with_details(
                "Invalid pricing selection",
                details,
            ));
        }

        let mut items: Vec<PricingItem> = catalog
            .iter()
            .filter(|item| item.is_active && item.applies_to(camp_id))
            .filter(|item| item.is_required || selected.contains(&item.id))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(items)
    }

    /// Price `children` registrations of the given items under `rule`.
    pub fn compute_total(
        children: u32,
        items: &[PricingItem],
        rule: &SiblingDiscount,
    ) -> PriceBreakdown {
        let per_child: i128 = items.iter().map(|item| item.amount as i128).sum();
        let raw_total = per_child * children as i128;

        let sibling_discount = if children >= 2 && rule.enabled {
            let additional = (children - 1) as i128;
            let discount = match rule.kind {
                DiscountType::Fixed => rule.amount as i128 * additional,
                DiscountType::Percentage => {
                    percent_of(per_child, rule.amount as i128) * additional
                }
            };
            discount.max(0)
        } else {
            0
        };

        let total = (raw_total - sibling_discount).max(0);

        PriceBreakdown {
            children,
            per_child_subtotal: clamp_i64(per_child),
            raw_total: clamp_i64(raw_total),
            sibling_discount: clamp_i64(sibling_discount),
            total: clamp_i64(total),
        }
    }
}

/// `value × percent / 100`, rounded half away from zero
fn percent_of(value: i128, percent: i128) -> i128 {
    let scaled = value * percent;
    if scaled >= 0 {
        (scaled + 50) / 100
    } else {
        (scaled - 50) / 100
    }
}

fn clamp_i64(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn item(amount: i64, required: bool) -> PricingItem {
        let now = Utc::now();
        PricingItem {
            id: Uuid::new_v4(),
            camp_id: None,
            name: format!("item-{}", amount),
            description: String::new(),
            amount,
            item_type: if amount < 0 {
                PricingItemType::Discount
            } else {
                PricingItemType::AddOn
            },
            is_required: required,
            is_active: true,
            display_order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_two_children_no_discount() {
        let b = PricingEngine::compute_total(2, &[item(100, true)], &SiblingDiscount::none());
        assert_eq!(b.per_child_subtotal, 100);
        assert_eq!(b.total, 200);
    }

    #[test]
    fn test_fixed_sibling_discount() {
        let b = PricingEngine::compute_total(3, &[item(100, true)], &SiblingDiscount::fixed(20));
        assert_eq!(b.raw_total, 300);
        assert_eq!(b.sibling_discount, 40);
        assert_eq!(b.total, 260);
    }

    #[test]
    fn test_percentage_sibling_discount() {
        let b = PricingEngine::compute_total(
            3,
            &[item(100, true)],
            &SiblingDiscount::percentage(10),
        );
        assert_eq!(b.sibling_discount, 20);
        assert_eq!(b.total, 280);
    }

    #[test]
    fn test_single_child_gets_no_sibling_discount() {
        let b = PricingEngine::compute_total(1, &[item(100, true)], &SiblingDiscount::fixed(20));
        assert_eq!(b.sibling_discount, 0);
        assert_eq!(b.total, 100);
    }

    #[test]
    fn test_discount_clamps_to_zero() {
        let b = PricingEngine::compute_total(
            2,
            &[item(100, true)],
            &SiblingDiscount::fixed(5_000),
        );
        assert_eq!(b.total, 0);

        let b = PricingEngine::compute_total(
            1,
            &[item(100, true), item(-250, false)],
            &SiblingDiscount::none(),
        );
        assert_eq!(b.per_child_subtotal, -150);
        assert_eq!(b.total, 0);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // 15% of 1005 = 150.75 -> 151
        let b = PricingEngine::compute_total(
            2,
            &[item(1005, true)],
            &SiblingDiscount::percentage(15),
        );
        assert_eq!(b.sibling_discount, 151);
        assert_eq!(b.total, 2010 - 151);
    }

    #[test]
    fn test_required_item_forced_into_selection() {
        let camp_id = Uuid::new_v4();
        let base = item(25_000, true);
        let lunch = item(4_000, false);
        let catalog = vec![base.clone(), lunch.clone()];

        let items = PricingEngine::resolve_selection(&catalog, camp_id, &[]).unwrap();
        assert_eq!(items, vec![base.clone()]);

        let items = PricingEngine::resolve_selection(&catalog, camp_id, &[lunch.id]).unwrap();
        assert_eq!(items.len(), 2);
        let b = PricingEngine::compute_total(1, &items, &SiblingDiscount::none());
        assert_eq!(b.total, 29_000);
    }

    #[test]
    fn test_selection_rejects_unavailable_items() {
        let camp_id = Uuid::new_v4();
        let mut archived = item(500, false);
        archived.is_active = false;
        let mut other_camp = item(700, false);
        other_camp.camp_id = Some(Uuid::new_v4());
        let catalog = vec![archived.clone(), other_camp.clone()];

        let err = PricingEngine::resolve_selection(
            &catalog,
            camp_id,
            &[archived.id, other_camp.id, Uuid::new_v4()],
        )
        .unwrap_err();
        assert_eq!(err.details.len(), 3);
        assert_eq!(err.details[0].field, "selectedItems[0]");
    }

    #[test]
    fn test_archived_required_item_not_forced() {
        let camp_id = Uuid::new_v4();
        let mut old_fee = item(10_000, true);
        old_fee.is_active = false;
        let items = PricingEngine::resolve_selection(&[old_fee], camp_id, &[]).unwrap();
        assert!(items.is_empty());
    }

    fn arb_rule() -> impl Strategy<Value = SiblingDiscount> {
        prop_oneof![
            Just(SiblingDiscount::none()),
            (0i64..50_000).prop_map(SiblingDiscount::fixed),
            (0i64..=100).prop_map(SiblingDiscount::percentage),
        ]
    }

    proptest! {
        #[test]
        fn prop_total_is_deterministic(
            children in 0u32..10,
            amounts in prop::collection::vec(-100_000i64..100_000, 0..6),
            rule in arb_rule(),
        ) {
            let items: Vec<_> = amounts.iter().map(|a| item(*a, true)).collect();
            let first = PricingEngine::compute_total(children, &items, &rule);
            let second = PricingEngine::compute_total(children, &items, &rule);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_total_never_negative(
            children in 0u32..10,
            amounts in prop::collection::vec(-100_000i64..100_000, 0..6),
            rule in arb_rule(),
        ) {
            let items: Vec<_> = amounts.iter().map(|a| item(*a, true)).collect();
            let b = PricingEngine::compute_total(children, &items, &rule);
            prop_assert!(b.total >= 0);
            prop_assert!(b.total <= b.raw_total.max(0));
        }

        #[test]
        fn prop_sibling_discount_grows_with_children(
            children in 0u32..12,
            amounts in prop::collection::vec(-100_000i64..100_000, 0..6),
            rule in arb_rule(),
        ) {
            let items: Vec<_> = amounts.iter().map(|a| item(*a, true)).collect();
            let fewer = PricingEngine::compute_total(children, &items, &rule);
            let more = PricingEngine::compute_total(children + 1, &items, &rule);
            prop_assert!(more.sibling_discount >= fewer.sibling_discount);
            prop_assert!(fewer.sibling_discount >= 0);
        }

        #[test]
        fn prop_required_items_always_priced(
            required in 1i64..100_000,
            optional in prop::collection::vec(0i64..100_000, 0..4),
            children in 1u32..6,
        ) {
            let camp_id = Uuid::new_v4();
            let mut catalog = vec![item(required, true)];
            catalog.extend(optional.iter().map(|a| item(*a, false)));

            let items = PricingEngine::resolve_selection(&catalog, camp_id, &[]).unwrap();
            let b = PricingEngine::compute_total(children, &items, &SiblingDiscount::none());
            prop_assert_eq!(b.total, required * children as i64);
        }
    }
}
