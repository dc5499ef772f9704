//! # camp-wasm
//!
//! WebAssembly bindings for camp-register-rs.
//!
//! The registration form uses these to show a live price while the guardian
//! fills it in. The figure is advisory: the server recomputes the price
//! before any payment intent is created.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { quote, format_amount } from 'camp-register-wasm';
//!
//! await init();
//!
//! const { items } = await (await fetch('/api/pricing')).json();
//! const camp = await (await fetch(`/api/camps/${campId}`)).json();
//!
//! const breakdown = JSON.parse(quote(2, JSON.stringify(items), JSON.stringify(camp)));
//! console.log('Total:', format_amount(breakdown.total, 'usd'));
//! ```
//!
//! ## Building
//!
//! ```bash
//! wasm-pack build --target web
//! ```

use camp_core::{
    format_minor_units, Currency, PriceBreakdown, PricingEngine, PricingItem, PricingItemType,
    SiblingDiscount,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

/// A priced line as the browser knows it. Objects from `GET /api/pricing`
/// deserialize as-is; only `amount` is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewItem {
    #[serde(default)]
    name: String,
    amount: i64,
}

impl PreviewItem {
    fn into_pricing_item(self) -> PricingItem {
        let epoch = DateTime::<Utc>::default();
        PricingItem {
            id: Uuid::nil(),
            camp_id: None,
            name: self.name,
            description: String::new(),
            amount: self.amount,
            item_type: if self.amount < 0 {
                PricingItemType::Discount
            } else {
                PricingItemType::AddOn
            },
            is_required: false,
            is_active: true,
            display_order: 0,
            created_at: epoch,
            updated_at: epoch,
        }
    }
}

const NO_DISCOUNT: SiblingDiscount = SiblingDiscount {
    enabled: false,
    kind: camp_core::DiscountType::Fixed,
    amount: 0,
};

fn breakdown(children: u32, items: Vec<PreviewItem>, rule: &SiblingDiscount) -> PriceBreakdown {
    let items: Vec<PricingItem> = items
        .into_iter()
        .map(PreviewItem::into_pricing_item)
        .collect();
    PricingEngine::compute_total(children, &items, rule)
}

fn quote_json(children: u32, items_json: &str, discount_json: &str) -> Result<String, String> {
    let items: Vec<PreviewItem> =
        serde_json::from_str(items_json).map_err(|e| format!("Invalid items: {}", e))?;
    let rule = if discount_json.trim().is_empty() {
        NO_DISCOUNT
    } else {
        serde_json::from_str(discount_json).map_err(|e| format!("Invalid discount: {}", e))?
    };

    serde_json::to_string(&breakdown(children, items, &rule)).map_err(|e| e.to_string())
}

/// Price `children_count` registrations of the selected items.
///
/// `items_json` is an array of `{ amount, name? }` objects. `discount_json`
/// carries `siblingDiscountEnabled`, `siblingDiscountType` and
/// `siblingDiscountAmount` (a whole camp object works too); pass an empty
/// string for no discount. Returns the breakdown as JSON.
#[wasm_bindgen]
pub fn quote(children_count: u32, items_json: &str, discount_json: &str) -> Result<String, JsValue> {
    quote_json(children_count, items_json, discount_json).map_err(|e| JsValue::from_str(&e))
}

/// Same as `quote`, taking and returning plain JS values
#[wasm_bindgen]
pub fn quote_value(children_count: u32, items: JsValue, discount: JsValue) -> Result<JsValue, JsValue> {
    let items: Vec<PreviewItem> = serde_wasm_bindgen::from_value(items)
        .map_err(|e| JsValue::from_str(&format!("Invalid items: {}", e)))?;
    let rule = if discount.is_undefined() || discount.is_null() {
        NO_DISCOUNT
    } else {
        serde_wasm_bindgen::from_value(discount)
            .map_err(|e| JsValue::from_str(&format!("Invalid discount: {}", e)))?
    };

    serde_wasm_bindgen::to_value(&breakdown(children_count, items, &rule))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Format minor units for display; unknown currencies fall back to USD
#[wasm_bindgen]
pub fn format_amount(cents: i64, currency: &str) -> String {
    format_minor_units(cents, currency.parse::<Currency>().unwrap_or_default())
}

/// Log to browser console
#[wasm_bindgen]
pub fn log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

/// Get library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
