//! # Camp Types
//!
//! A camp session with a fixed number of spots. `spots_taken` is only ever
//! moved through the capacity ledger; everything else is admin-editable.

use crate::error::{CapacityError, FieldError, ValidationError};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a camp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampStatus {
    Active,
    Full,
    Archived,
}

impl CampStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampStatus::Active => "active",
            CampStatus::Full => "full",
            CampStatus::Archived => "archived",
        }
    }
}

impl FromStr for CampStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CampStatus::Active),
            "full" => Ok(CampStatus::Full),
            "archived" => Ok(CampStatus::Archived),
            other => Err(format!("Unknown camp status: {}", other)),
        }
    }
}

/// Whether new submissions are accepted, independent of capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationWindow {
    Open,
    Paused,
    Closed,
}

impl RegistrationWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationWindow::Open => "open",
            RegistrationWindow::Paused => "paused",
            RegistrationWindow::Closed => "closed",
        }
    }
}

impl FromStr for RegistrationWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(RegistrationWindow::Open),
            "paused" => Ok(RegistrationWindow::Paused),
            "closed" => Ok(RegistrationWindow::Closed),
            other => Err(format!("Unknown registration status: {}", other)),
        }
    }
}

/// How the sibling discount is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// Minor units off per additional child
    Fixed,
    /// Whole percent of the per-child subtotal, per additional child
    Percentage,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Fixed => "fixed",
            DiscountType::Percentage => "percentage",
        }
    }
}

impl FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(DiscountType::Fixed),
            "percentage" => Ok(DiscountType::Percentage),
            other => Err(format!("Unknown discount type: {}", other)),
        }
    }
}

/// Sibling discount rule attached to a camp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingDiscount {
    #[serde(rename = "siblingDiscountEnabled", default)]
    pub enabled: bool,
    #[serde(rename = "siblingDiscountType", default = "default_discount_type")]
    pub kind: DiscountType,
    #[serde(rename = "siblingDiscountAmount", default)]
    pub amount: i64,
}

fn default_discount_type() -> DiscountType {
    DiscountType::Fixed
}

impl SiblingDiscount {
    pub fn none() -> Self {
        Self {
            enabled: false,
            kind: DiscountType::Fixed,
            amount: 0,
        }
    }

    pub fn fixed(amount: i64) -> Self {
        Self {
            enabled: true,
            kind: DiscountType::Fixed,
            amount,
        }
    }

    pub fn percentage(percent: i64) -> Self {
        Self {
            enabled: true,
            kind: DiscountType::Percentage,
            amount: percent,
        }
    }
}

impl Default for SiblingDiscount {
    fn default() -> Self {
        Self::none()
    }
}

/// A camp session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camp {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// First day, inclusive
    pub start_date: NaiveDate,
    /// Last day, inclusive
    pub end_date: NaiveDate,
    pub age_min: i32,
    pub age_max: i32,
    pub max_spots: i32,
    pub spots_taken: i32,
    pub status: CampStatus,
    pub registration_status: RegistrationWindow,
    #[serde(default)]
    pub waitlist_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waitlist_message: Option<String>,
    #[serde(flatten)]
    pub sibling_discount: SiblingDiscount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public availability snapshot (`GET /api/status`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampAvailability {
    pub spots_left: i32,
    /// Spots currently taken
    pub total: i32,
    pub max: i32,
    pub is_full: bool,
}

impl Camp {
    pub fn spots_left(&self) -> i32 {
        (self.max_spots - self.spots_taken).max(0)
    }

    pub fn availability(&self) -> CampAvailability {
        let spots_left = self.spots_left();
        CampAvailability {
            spots_left,
            total: self.spots_taken,
            max: self.max_spots,
            is_full: spots_left <= 0,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.status == CampStatus::Archived
    }

    /// Would reserving `spots` more be admitted right now?
    ///
    /// Checked in this order: archived, window, capacity.
    pub fn admission_check(&self, spots: i32) -> Result<(), CapacityError> {
        if self.is_archived() {
            return Err(CapacityError::CampArchived);
        }
        if self.registration_status != RegistrationWindow::Open {
            return Err(CapacityError::RegistrationClosed);
        }
        if self.spots_taken + spots > self.max_spots {
            return Err(CapacityError::CampFull);
        }
        Ok(())
    }

    /// Record a reservation already admitted by `admission_check`
    pub fn apply_reservation(&mut self, spots: i32) {
        self.spots_taken += spots;
        self.refresh_fill_status();
        self.updated_at = Utc::now();
    }

    /// Give spots back; never drops below zero
    pub fn apply_release(&mut self, spots: i32) {
        self.spots_taken = (self.spots_taken - spots).max(0);
        self.refresh_fill_status();
        self.updated_at = Utc::now();
    }

    /// Keep `status` in step with the counter. Archived is sticky.
    pub fn refresh_fill_status(&mut self) {
        if self.is_archived() {
            return;
        }
        self.status = if self.spots_taken >= self.max_spots {
            CampStatus::Full
        } else {
            CampStatus::Active
        };
    }

    /// Apply an admin edit. `max_spots` may not drop below `spots_taken`.
    pub fn apply_patch(&mut self, patch: CampPatch) -> Result<(), ValidationError> {
        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name;
        }
        if let Some(description) = patch.description {
            next.description = description;
        }
        if let Some(start_date) = patch.start_date {
            next.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            next.end_date = end_date;
        }
        if let Some(age_min) = patch.age_min {
            next.age_min = age_min;
        }
        if let Some(age_max) = patch.age_max {
            next.age_max = age_max;
        }
        if let Some(max_spots) = patch.max_spots {
            next.max_spots = max_spots;
        }
        if let Some(window) = patch.registration_status {
            next.registration_status = window;
        }
        if let Some(enabled) = patch.waitlist_enabled {
            next.waitlist_enabled = enabled;
        }
        if let Some(message) = patch.waitlist_message {
            next.waitlist_message = Some(message);
        }
        if let Some(enabled) = patch.sibling_discount_enabled {
            next.sibling_discount.enabled = enabled;
        }
        if let Some(kind) = patch.sibling_discount_type {
            next.sibling_discount.kind = kind;
        }
        if let Some(amount) = patch.sibling_discount_amount {
            next.sibling_discount.amount = amount;
        }

        let mut details = validate_fields(
            &next.name,
            next.start_date,
            next.end_date,
            next.age_min,
            next.age_max,
            next.max_spots,
            &next.sibling_discount,
        );
        if next.max_spots < next.spots_taken {
            details.push(FieldError::new(
                "maxSpots",
                format!(
                    "maxSpots cannot be lower than the {} spots already taken",
                    next.spots_taken
                ),
            ));
        }
        if !details.is_empty() {
            return Err(ValidationError::with_details("Invalid camp", details));
        }

        next.refresh_fill_status();
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    /// Age in whole years on the first day of camp
    pub fn age_at_start(&self, date_of_birth: NaiveDate) -> i32 {
        age_on(date_of_birth, self.start_date)
    }
}

/// Whole years between `date_of_birth` and `on`
pub fn age_on(date_of_birth: NaiveDate, on: NaiveDate) -> i32 {
    let mut age = on.year() - date_of_birth.year();
    if (on.month(), on.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

/// Admin request to create a camp
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub age_min: i32,
    #[serde(default = "default_age_max")]
    pub age_max: i32,
    /// Falls back to the configured default when absent
    #[serde(default)]
    pub max_spots: Option<i32>,
    #[serde(default = "default_window")]
    pub registration_status: RegistrationWindow,
    #[serde(default)]
    pub waitlist_enabled: bool,
    #[serde(default)]
    pub waitlist_message: Option<String>,
    #[serde(flatten)]
    pub sibling_discount: SiblingDiscount,
}

fn default_age_max() -> i32 {
    18
}

fn default_window() -> RegistrationWindow {
    RegistrationWindow::Open
}

impl CampDraft {
    pub fn into_camp(self, default_max_spots: i32) -> Result<Camp, ValidationError> {
        let max_spots = self.max_spots.unwrap_or(default_max_spots);
        let details = validate_fields(
            &self.name,
            self.start_date,
            self.end_date,
            self.age_min,
            self.age_max,
            max_spots,
            &self.sibling_discount,
        );
        if !details.is_empty() {
            return Err(ValidationError::with_details("Invalid camp", details));
        }

        let now = Utc::now();
        let mut camp = Camp {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            age_min: self.age_min,
            age_max: self.age_max,
            max_spots,
            spots_taken: 0,
            status: CampStatus::Active,
            registration_status: self.registration_status,
            waitlist_enabled: self.waitlist_enabled,
            waitlist_message: self.waitlist_message,
            sibling_discount: self.sibling_discount,
            created_at: now,
            updated_at: now,
        };
        camp.refresh_fill_status();
        Ok(camp)
    }
}

/// Admin request to edit a camp; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub max_spots: Option<i32>,
    pub registration_status: Option<RegistrationWindow>,
    pub waitlist_enabled: Option<bool>,
    pub waitlist_message: Option<String>,
    pub sibling_discount_enabled: Option<bool>,
    pub sibling_discount_type: Option<DiscountType>,
    pub sibling_discount_amount: Option<i64>,
}

#[allow(clippy::too_many_arguments)]
fn validate_fields(
    name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    age_min: i32,
    age_max: i32,
    max_spots: i32,
    discount: &SiblingDiscount,
) -> Vec<FieldError> {
    let mut details = Vec::new();
    if name.trim().is_empty() {
        details.push(FieldError::new("name", "Name is required"));
    }
    if end_date < start_date {
        details.push(FieldError::new("endDate", "End date must not be before start date"));
    }
    if age_min < 0 || age_max < age_min {
        details.push(FieldError::new("ageMax", "Age range is invalid"));
    }
    if max_spots < 0 {
        details.push(FieldError::new("maxSpots", "maxSpots must be non-negative"));
    }
    if discount.amount < 0 {
        details.push(FieldError::new(
            "siblingDiscountAmount",
            "Discount amount must be non-negative",
        ));
    }
    if discount.kind == DiscountType::Percentage && discount.amount > 100 {
        details.push(FieldError::new(
            "siblingDiscountAmount",
            "Percentage discount cannot exceed 100",
        ));
    }
    details
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn draft(max_spots: i32) -> CampDraft {
        CampDraft {
            name: "Summer Week 1".to_string(),
            description: String::new(),
            start_date: date(2026, 7, 6),
            end_date: date(2026, 7, 10),
            age_min: 6,
            age_max: 12,
            max_spots: Some(max_spots),
            registration_status: RegistrationWindow::Open,
            waitlist_enabled: false,
            waitlist_message: None,
            sibling_discount: SiblingDiscount::none(),
        }
    }

    #[test]
    fn test_admission_order() {
        let mut camp = draft(2).into_camp(30).unwrap();
        assert!(camp.admission_check(2).is_ok());
        assert_eq!(camp.admission_check(3), Err(CapacityError::CampFull));

        camp.registration_status = RegistrationWindow::Paused;
        assert_eq!(camp.admission_check(1), Err(CapacityError::RegistrationClosed));

        camp.status = CampStatus::Archived;
        assert_eq!(camp.admission_check(1), Err(CapacityError::CampArchived));
    }

    #[test]
    fn test_fill_status_follows_counter() {
        let mut camp = draft(2).into_camp(30).unwrap();
        camp.apply_reservation(2);
        assert_eq!(camp.status, CampStatus::Full);
        assert!(camp.availability().is_full);

        camp.apply_release(1);
        assert_eq!(camp.status, CampStatus::Active);
        assert_eq!(camp.availability().spots_left, 1);

        camp.apply_release(5);
        assert_eq!(camp.spots_taken, 0);
    }

    #[test]
    fn test_zero_spot_camp_is_full() {
        let camp = draft(0).into_camp(30).unwrap();
        assert_eq!(camp.status, CampStatus::Full);
        assert!(camp.availability().is_full);
    }

    #[test]
    fn test_default_max_spots() {
        let mut d = draft(0);
        d.max_spots = None;
        let camp = d.into_camp(25).unwrap();
        assert_eq!(camp.max_spots, 25);
    }

    #[test]
    fn test_patch_rejects_max_below_taken() {
        let mut camp = draft(10).into_camp(30).unwrap();
        camp.apply_reservation(4);

        let err = camp
            .apply_patch(CampPatch {
                max_spots: Some(3),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.details[0].field, "maxSpots");
        assert_eq!(camp.max_spots, 10);

        camp.apply_patch(CampPatch {
            max_spots: Some(4),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(camp.status, CampStatus::Full);
    }

    #[test]
    fn test_draft_validation() {
        let mut d = draft(10);
        d.end_date = date(2026, 7, 1);
        d.name = " ".to_string();
        let err = d.into_camp(30).unwrap_err();
        assert_eq!(err.details.len(), 2);
    }

    #[test]
    fn test_age_on() {
        assert_eq!(age_on(date(2018, 7, 7), date(2026, 7, 6)), 7);
        assert_eq!(age_on(date(2018, 7, 6), date(2026, 7, 6)), 8);
    }

    #[test]
    fn test_camel_case_json() {
        let camp = draft(10).into_camp(30).unwrap();
        let json = serde_json::to_value(&camp).unwrap();
        assert_eq!(json["maxSpots"], 10);
        assert_eq!(json["registrationStatus"], "open");
        assert_eq!(json["siblingDiscountEnabled"], false);
    }
}
