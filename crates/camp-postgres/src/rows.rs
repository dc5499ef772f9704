//! Row types and their conversion into domain types.
//!
//! Enum columns are stored as their wire strings; nested registration
//! data lives in JSONB.

use camp_core::{
    Camp, CampAvailability, CampError, CampResult, ChildInfo, EmergencyContact, Guardian,
    IntentRecord, Permissions, PricingItem, Registration, SelectedItem, SiblingDiscount,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

fn parse_column<T: FromStr<Err = String>>(column: &str, value: &str) -> CampResult<T> {
    value
        .parse()
        .map_err(|e| CampError::storage(format!("column {}: {}", column, e)))
}

#[derive(Debug, FromRow)]
pub(crate) struct CampRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub age_min: i32,
    pub age_max: i32,
    pub max_spots: i32,
    pub spots_taken: i32,
    pub status: String,
    pub registration_status: String,
    pub waitlist_enabled: bool,
    pub waitlist_message: Option<String>,
    pub sibling_discount_enabled: bool,
    pub sibling_discount_type: String,
    pub sibling_discount_amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CampRow> for Camp {
    type Error = CampError;

    fn try_from(row: CampRow) -> CampResult<Self> {
        Ok(Camp {
            id: row.id,
            name: row.name,
            description: row.description,
            start_date: row.start_date,
            end_date: row.end_date,
            age_min: row.age_min,
            age_max: row.age_max,
            max_spots: row.max_spots,
            spots_taken: row.spots_taken,
            status: parse_column("status", &row.status)?,
            registration_status: parse_column("registration_status", &row.registration_status)?,
            waitlist_enabled: row.waitlist_enabled,
            waitlist_message: row.waitlist_message,
            sibling_discount: SiblingDiscount {
                enabled: row.sibling_discount_enabled,
                kind: parse_column("sibling_discount_type", &row.sibling_discount_type)?,
                amount: row.sibling_discount_amount,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `RETURNING spots_taken, max_spots` of a counter update
#[derive(Debug, FromRow)]
pub(crate) struct CounterRow {
    pub spots_taken: i32,
    pub max_spots: i32,
}

impl From<CounterRow> for CampAvailability {
    fn from(row: CounterRow) -> Self {
        let spots_left = (row.max_spots - row.spots_taken).max(0);
        CampAvailability {
            spots_left,
            total: row.spots_taken,
            max: row.max_spots,
            is_full: spots_left <= 0,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PricingRow {
    pub id: Uuid,
    pub camp_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub amount: i64,
    pub item_type: String,
    pub is_required: bool,
    pub is_active: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PricingRow> for PricingItem {
    type Error = CampError;

    fn try_from(row: PricingRow) -> CampResult<Self> {
        Ok(PricingItem {
            id: row.id,
            camp_id: row.camp_id,
            name: row.name,
            description: row.description,
            amount: row.amount,
            item_type: parse_column("item_type", &row.item_type)?,
            is_required: row.is_required,
            is_active: row.is_active,
            display_order: row.display_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct RegistrationRow {
    pub id: Uuid,
    pub camp_id: Uuid,
    pub children: Json<Vec<ChildInfo>>,
    pub guardian: Json<Guardian>,
    pub emergency_contact1: Json<EmergencyContact>,
    pub emergency_contact2: Option<Json<EmergencyContact>>,
    pub permissions: Json<Permissions>,
    pub selected_items: Json<Vec<SelectedItem>>,
    pub total_amount: i64,
    pub currency: String,
    pub payment_status: String,
    pub registration_status: String,
    pub payment_intent_id: Option<String>,
    pub notes: Option<String>,
    pub anonymized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = CampError;

    fn try_from(row: RegistrationRow) -> CampResult<Self> {
        Ok(Registration {
            id: row.id,
            camp_id: row.camp_id,
            children: row.children.0,
            guardian: row.guardian.0,
            emergency_contact1: row.emergency_contact1.0,
            emergency_contact2: row.emergency_contact2.map(|c| c.0),
            permissions: row.permissions.0,
            selected_items: row.selected_items.0,
            total_amount: row.total_amount,
            currency: parse_column("currency", &row.currency)?,
            payment_status: parse_column("payment_status", &row.payment_status)?,
            registration_status: parse_column("registration_status", &row.registration_status)?,
            payment_intent_id: row.payment_intent_id,
            notes: row.notes,
            anonymized_at: row.anonymized_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct IntentRow {
    pub intent_id: String,
    pub camp_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub children_count: i32,
    pub selected_items: Json<Vec<SelectedItem>>,
    pub state: String,
    pub registration_id: Option<Uuid>,
    pub failure_reason: Option<String>,
    pub payment_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<IntentRow> for IntentRecord {
    type Error = CampError;

    fn try_from(row: IntentRow) -> CampResult<Self> {
        Ok(IntentRecord {
            intent_id: row.intent_id,
            camp_id: row.camp_id,
            amount: row.amount,
            currency: parse_column("currency", &row.currency)?,
            children_count: row.children_count,
            selected_items: row.selected_items.0,
            state: parse_column("state", &row.state)?,
            registration_id: row.registration_id,
            failure_reason: row.failure_reason,
            payment_confirmed: row.payment_confirmed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Convert a batch of rows, failing on the first bad one
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> CampResult<Vec<T>>
where
    T: TryFrom<R, Error = CampError>,
{
    rows.into_iter().map(T::try_from).collect()
}
