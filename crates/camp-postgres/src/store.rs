//! `RegistrationStore` on PostgreSQL.
//!
//! Capacity changes are single conditional `UPDATE` statements, so two
//! concurrent reservations for the last spot can never both commit.

use crate::rows::{
    convert_all, CampRow, CounterRow, IntentRow, PricingRow, RegistrationRow,
};
use async_trait::async_trait;
use camp_core::{
    Camp, CampError, CampResult, CapacityError, IntentRecord, IntentState, IntentTransition,
    PricingItem, Registration, RegistrationFilter, RegistrationStore,
    ReservationOutcome,
};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

const CAMP_COLUMNS: &str = "id, name, description, start_date, end_date, age_min, age_max, \
     max_spots, spots_taken, status, registration_status, waitlist_enabled, waitlist_message, \
     sibling_discount_enabled, sibling_discount_type, sibling_discount_amount, created_at, updated_at";

const PRICING_COLUMNS: &str = "id, camp_id, name, description, amount, item_type, is_required, \
     is_active, display_order, created_at, updated_at";

const REGISTRATION_COLUMNS: &str = "id, camp_id, children, guardian, emergency_contact1, \
     emergency_contact2, permissions, selected_items, total_amount, currency, payment_status, \
     registration_status, payment_intent_id, notes, anonymized_at, created_at, updated_at";

const INTENT_COLUMNS: &str = "intent_id, camp_id, amount, currency, children_count, \
     selected_items, state, registration_id, failure_reason, payment_confirmed, created_at, \
     updated_at";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Explain why a conditional reservation matched no row
    async fn rejection_reason(&self, camp_id: Uuid, spots: i32) -> CampResult<CapacityError> {
        let camp = self.get_camp(camp_id).await?;
        Ok(match camp {
            None => CapacityError::CampNotFound,
            // The row may have changed since the update; report full.
            Some(camp) => camp.admission_check(spots).err().unwrap_or(CapacityError::CampFull),
        })
    }
}

#[async_trait]
impl RegistrationStore for PgStore {
    async fn list_camps(&self, include_archived: bool) -> CampResult<Vec<Camp>> {
        let rows = sqlx::query_as::<_, CampRow>(&format!(
            "SELECT {CAMP_COLUMNS} FROM camps
             WHERE $1 OR status <> 'archived'
             ORDER BY start_date, name"
        ))
        .bind(include_archived)
        .fetch_all(&self.pool)
        .await
        .map_err(CampError::storage)?;
        convert_all(rows)
    }

    async fn get_camp(&self, id: Uuid) -> CampResult<Option<Camp>> {
        sqlx::query_as::<_, CampRow>(&format!("SELECT {CAMP_COLUMNS} FROM camps WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CampError::storage)?
            .map(Camp::try_from)
            .transpose()
    }

    async fn insert_camp(&self, camp: &Camp) -> CampResult<()> {
        sqlx::query(&format!(
            "INSERT INTO camps ({CAMP_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        ))
        .bind(camp.id)
        .bind(&camp.name)
        .bind(&camp.description)
        .bind(camp.start_date)
        .bind(camp.end_date)
        .bind(camp.age_min)
        .bind(camp.age_max)
        .bind(camp.max_spots)
        .bind(camp.spots_taken)
        .bind(camp.status.as_str())
        .bind(camp.registration_status.as_str())
        .bind(camp.waitlist_enabled)
        .bind(&camp.waitlist_message)
        .bind(camp.sibling_discount.enabled)
        .bind(camp.sibling_discount.kind.as_str())
        .bind(camp.sibling_discount.amount)
        .bind(camp.created_at)
        .bind(camp.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CampError::storage)?;
        Ok(())
    }

    #[instrument(skip(self, camp), fields(camp_id = %camp.id))]
    async fn update_camp(&self, camp: &Camp) -> CampResult<bool> {
        let result = sqlx::query(
            "UPDATE camps
             SET name = $2,
                 description = $3,
                 start_date = $4,
                 end_date = $5,
                 age_min = $6,
                 age_max = $7,
                 max_spots = $8,
                 registration_status = $9,
                 waitlist_enabled = $10,
                 waitlist_message = $11,
                 sibling_discount_enabled = $12,
                 sibling_discount_type = $13,
                 sibling_discount_amount = $14,
                 status = CASE
                     WHEN status = 'archived' THEN 'archived'
                     WHEN spots_taken >= $8 THEN 'full'
                     ELSE 'active'
                 END,
                 updated_at = NOW()
             WHERE id = $1 AND spots_taken <= $8",
        )
        .bind(camp.id)
        .bind(&camp.name)
        .bind(&camp.description)
        .bind(camp.start_date)
        .bind(camp.end_date)
        .bind(camp.age_min)
        .bind(camp.age_max)
        .bind(camp.max_spots)
        .bind(camp.registration_status.as_str())
        .bind(camp.waitlist_enabled)
        .bind(&camp.waitlist_message)
        .bind(camp.sibling_discount.enabled)
        .bind(camp.sibling_discount.kind.as_str())
        .bind(camp.sibling_discount.amount)
        .execute(&self.pool)
        .await
        .map_err(CampError::storage)?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_camp_archived(&self, id: Uuid, archived: bool) -> CampResult<Option<Camp>> {
        sqlx::query_as::<_, CampRow>(&format!(
            "UPDATE camps
             SET status = CASE
                     WHEN $2 THEN 'archived'
                     WHEN spots_taken >= max_spots THEN 'full'
                     ELSE 'active'
                 END,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {CAMP_COLUMNS}"
        ))
        .bind(id)
        .bind(archived)
        .fetch_optional(&self.pool)
        .await
        .map_err(CampError::storage)?
        .map(Camp::try_from)
        .transpose()
    }

    #[instrument(skip(self))]
    async fn try_reserve(&self, camp_id: Uuid, spots: i32) -> CampResult<ReservationOutcome> {
        let row = sqlx::query_as::<_, CounterRow>(
            "UPDATE camps
             SET spots_taken = spots_taken + $2,
                 status = CASE WHEN spots_taken + $2 >= max_spots THEN 'full' ELSE 'active' END,
                 updated_at = NOW()
             WHERE id = $1
               AND status <> 'archived'
               AND registration_status = 'open'
               AND spots_taken + $2 <= max_spots
             RETURNING spots_taken, max_spots",
        )
        .bind(camp_id)
        .bind(spots)
        .fetch_optional(&self.pool)
        .await
        .map_err(CampError::storage)?;

        match row {
            Some(row) => Ok(ReservationOutcome::Reserved(row.into())),
            None => {
                let reason = self.rejection_reason(camp_id, spots).await?;
                debug!(reason = reason.code(), "Conditional reservation matched no row");
                Ok(ReservationOutcome::Rejected(reason))
            }
        }
    }

    async fn release(&self, camp_id: Uuid, spots: i32) -> CampResult<()> {
        sqlx::query(
            "UPDATE camps
             SET spots_taken = GREATEST(0, spots_taken - $2),
                 status = CASE
                     WHEN status = 'archived' THEN 'archived'
                     WHEN GREATEST(0, spots_taken - $2) >= max_spots THEN 'full'
                     ELSE 'active'
                 END,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(camp_id)
        .bind(spots)
        .execute(&self.pool)
        .await
        .map_err(CampError::storage)?;
        Ok(())
    }

    async fn list_pricing_items(&self, include_archived: bool) -> CampResult<Vec<PricingItem>> {
        let rows = sqlx::query_as::<_, PricingRow>(&format!(
            "SELECT {PRICING_COLUMNS} FROM pricing_items
             WHERE $1 OR is_active
             ORDER BY display_order, name"
        ))
        .bind(include_archived)
        .fetch_all(&self.pool)
        .await
        .map_err(CampError::storage)?;
        convert_all(rows)
    }

    async fn get_pricing_item(&self, id: Uuid) -> CampResult<Option<PricingItem>> {
        sqlx::query_as::<_, PricingRow>(&format!(
            "SELECT {PRICING_COLUMNS} FROM pricing_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CampError::storage)?
        .map(PricingItem::try_from)
        .transpose()
    }

    async fn insert_pricing_item(&self, item: &PricingItem) -> CampResult<()> {
        sqlx::query(&format!(
            "INSERT INTO pricing_items ({PRICING_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(item.id)
        .bind(item.camp_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.amount)
        .bind(item.item_type.as_str())
        .bind(item.is_required)
        .bind(item.is_active)
        .bind(item.display_order)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CampError::storage)?;
        Ok(())
    }

    async fn update_pricing_item(&self, item: &PricingItem) -> CampResult<()> {
        sqlx::query(
            "UPDATE pricing_items
             SET camp_id = $2,
                 name = $3,
                 description = $4,
                 amount = $5,
                 item_type = $6,
                 is_required = $7,
                 is_active = $8,
                 display_order = $9,
                 updated_at = $10
             WHERE id = $1",
        )
        .bind(item.id)
        .bind(item.camp_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.amount)
        .bind(item.item_type.as_str())
        .bind(item.is_required)
        .bind(item.is_active)
        .bind(item.display_order)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CampError::storage)?;
        Ok(())
    }

    async fn list_registrations(
        &self,
        filter: &RegistrationFilter,
    ) -> CampResult<Vec<Registration>> {
        let rows = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations
             WHERE ($1::uuid IS NULL OR camp_id = $1)
               AND ($2::text IS NULL OR registration_status = $2)
             ORDER BY created_at DESC"
        ))
        .bind(filter.camp_id)
        .bind(filter.registration_status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(CampError::storage)?;
        convert_all(rows)
    }

    async fn get_registration(&self, id: Uuid) -> CampResult<Option<Registration>> {
        sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CampError::storage)?
        .map(Registration::try_from)
        .transpose()
    }

    async fn insert_registration(&self, registration: &Registration) -> CampResult<()> {
        sqlx::query(&format!(
            "INSERT INTO registrations ({REGISTRATION_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        ))
        .bind(registration.id)
        .bind(registration.camp_id)
        .bind(Json(&registration.children))
        .bind(Json(&registration.guardian))
        .bind(Json(&registration.emergency_contact1))
        .bind(registration.emergency_contact2.as_ref().map(Json))
        .bind(Json(&registration.permissions))
        .bind(Json(&registration.selected_items))
        .bind(registration.total_amount)
        .bind(registration.currency.as_str())
        .bind(registration.payment_status.as_str())
        .bind(registration.registration_status.as_str())
        .bind(&registration.payment_intent_id)
        .bind(&registration.notes)
        .bind(registration.anonymized_at)
        .bind(registration.created_at)
        .bind(registration.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CampError::storage)?;
        Ok(())
    }

    async fn update_registration(
        &self,
        registration: &Registration,
        expected: &Registration,
    ) -> CampResult<bool> {
        let result = sqlx::query(
            "UPDATE registrations
             SET children = $3,
                 guardian = $4,
                 emergency_contact1 = $5,
                 emergency_contact2 = $6,
                 permissions = $7,
                 registration_status = $8,
                 payment_status = $9,
                 notes = $10,
                 anonymized_at = $11,
                 updated_at = $12
             WHERE id = $1 AND registration_status = $2 AND updated_at = $13",
        )
        .bind(registration.id)
        .bind(expected.registration_status.as_str())
        .bind(Json(&registration.children))
        .bind(Json(&registration.guardian))
        .bind(Json(&registration.emergency_contact1))
        .bind(registration.emergency_contact2.as_ref().map(Json))
        .bind(Json(&registration.permissions))
        .bind(registration.registration_status.as_str())
        .bind(registration.payment_status.as_str())
        .bind(&registration.notes)
        .bind(registration.anonymized_at)
        .bind(registration.updated_at)
        .bind(expected.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CampError::storage)?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_intent(&self, record: &IntentRecord) -> CampResult<()> {
        sqlx::query(&format!(
            "INSERT INTO payment_intents ({INTENT_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(&record.intent_id)
        .bind(record.camp_id)
        .bind(record.amount)
        .bind(record.currency.as_str())
        .bind(record.children_count)
        .bind(Json(&record.selected_items))
        .bind(record.state.as_str())
        .bind(record.registration_id)
        .bind(&record.failure_reason)
        .bind(record.payment_confirmed)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CampError::storage)?;
        Ok(())
    }

    async fn get_intent(&self, intent_id: &str) -> CampResult<Option<IntentRecord>> {
        sqlx::query_as::<_, IntentRow>(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE intent_id = $1"
        ))
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CampError::storage)?
        .map(IntentRecord::try_from)
        .transpose()
    }

    #[instrument(skip(self, transition), fields(from = transition.from.as_str(), to = transition.to.as_str()))]
    async fn transition_intent(
        &self,
        intent_id: &str,
        transition: &IntentTransition,
    ) -> CampResult<bool> {
        let result = sqlx::query(
            "UPDATE payment_intents
             SET state = $3,
                 registration_id = COALESCE($4, registration_id),
                 failure_reason = COALESCE($5, failure_reason),
                 payment_confirmed = COALESCE($6, payment_confirmed),
                 updated_at = NOW()
             WHERE intent_id = $1 AND state = $2",
        )
        .bind(intent_id)
        .bind(transition.from.as_str())
        .bind(transition.to.as_str())
        .bind(transition.registration_id)
        .bind(&transition.failure_reason)
        .bind(transition.payment_confirmed)
        .execute(&self.pool)
        .await
        .map_err(CampError::storage)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_intents(&self, state: IntentState) -> CampResult<Vec<IntentRecord>> {
        let rows = sqlx::query_as::<_, IntentRow>(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents
             WHERE state = $1
             ORDER BY updated_at DESC"
        ))
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(CampError::storage)?;
        convert_all(rows)
    }

    async fn get_setting(&self, key: &str) -> CampResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM admin_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(CampError::storage)
    }

    async fn put_setting(&self, key: &str, value: &str) -> CampResult<()> {
        sqlx::query(
            "INSERT INTO admin_settings (key, value, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(CampError::storage)?;
        Ok(())
    }
}
