//! # Registration Types
//!
//! The submitted payload, its server-side validation, and the stored
//! registration record.

use crate::camp::{Camp, CampAvailability};
use crate::error::{FieldError, ValidationError};
use crate::money::Currency;
use crate::pricing::SelectedItem;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// How (or whether) a registration was paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Free,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Free => "free",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "free" => Ok(PaymentStatus::Free),
            other => Err(format!("Unknown payment status: {}", other)),
        }
    }
}

/// Attendance lifecycle of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Confirmed,
    Pending,
    Waitlist,
    Cancelled,
    Attended,
    #[serde(rename = "no-show")]
    NoShow,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Waitlist => "waitlist",
            RegistrationStatus::Cancelled => "cancelled",
            RegistrationStatus::Attended => "attended",
            RegistrationStatus::NoShow => "no-show",
        }
    }

    /// Whether a registration in this status occupies camp spots
    pub fn holds_spot(&self) -> bool {
        !matches!(
            self,
            RegistrationStatus::Cancelled | RegistrationStatus::Waitlist
        )
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(RegistrationStatus::Confirmed),
            "pending" => Ok(RegistrationStatus::Pending),
            "waitlist" => Ok(RegistrationStatus::Waitlist),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            "attended" => Ok(RegistrationStatus::Attended),
            "no-show" => Ok(RegistrationStatus::NoShow),
            other => Err(format!("Unknown registration status: {}", other)),
        }
    }
}

/// One child on a registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildInfo {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub t_shirt_size: Option<String>,
    pub has_allergies: bool,
    pub allergy_details: Option<String>,
    pub has_medications: bool,
    pub medication_details: Option<String>,
    pub has_medical_conditions: bool,
    pub medical_condition_details: Option<String>,
    pub has_dietary_restrictions: bool,
    pub dietary_restriction_details: Option<String>,
}

impl ChildInfo {
    fn validate(&self, index: usize, camp: Option<&Camp>, details: &mut Vec<FieldError>) {
        let field = |name: &str| format!("children[{}].{}", index, name);

        if self.first_name.trim().is_empty() {
            details.push(FieldError::new(field("firstName"), "First name is required"));
        }
        if self.last_name.trim().is_empty() {
            details.push(FieldError::new(field("lastName"), "Last name is required"));
        }
        match (self.date_of_birth, camp) {
            (None, _) => {
                details.push(FieldError::new(field("dateOfBirth"), "Date of birth is required"));
            }
            (Some(dob), Some(camp)) => {
                let age = camp.age_at_start(dob);
                if age < camp.age_min || age > camp.age_max {
                    details.push(FieldError::new(
                        field("dateOfBirth"),
                        format!(
                            "Child must be between {} and {} years old at camp start",
                            camp.age_min, camp.age_max
                        ),
                    ));
                }
            }
            (Some(_), None) => {}
        }

        let conditional = [
            (self.has_allergies, &self.allergy_details, "allergyDetails"),
            (self.has_medications, &self.medication_details, "medicationDetails"),
            (
                self.has_medical_conditions,
                &self.medical_condition_details,
                "medicalConditionDetails",
            ),
            (
                self.has_dietary_restrictions,
                &self.dietary_restriction_details,
                "dietaryRestrictionDetails",
            ),
        ];
        for (flag, value, name) in conditional {
            if flag && is_blank(value) {
                details.push(FieldError::new(
                    field(name),
                    "Details are required when answered yes",
                ));
            }
        }
    }

    fn anonymize(&mut self) {
        *self = ChildInfo {
            first_name: REDACTED.to_string(),
            last_name: REDACTED.to_string(),
            ..ChildInfo::default()
        };
    }
}

/// Primary guardian contact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Guardian {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
}

/// Emergency contact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

impl EmergencyContact {
    fn validate(&self, prefix: &str, details: &mut Vec<FieldError>) {
        if self.name.trim().is_empty() {
            details.push(FieldError::new(format!("{}.name", prefix), "Name is required"));
        }
        if self.phone.trim().is_empty() {
            details.push(FieldError::new(format!("{}.phone", prefix), "Phone is required"));
        }
    }
}

/// Consent flags; every one must be granted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permissions {
    pub liability_waiver: bool,
    pub medical_treatment: bool,
    pub photo_release: bool,
    pub code_of_conduct: bool,
}

impl Permissions {
    pub fn all_granted() -> Self {
        Self {
            liability_waiver: true,
            medical_treatment: true,
            photo_release: true,
            code_of_conduct: true,
        }
    }

    fn validate(&self, details: &mut Vec<FieldError>) {
        let flags = [
            (self.liability_waiver, "liabilityWaiver"),
            (self.medical_treatment, "medicalTreatment"),
            (self.photo_release, "photoRelease"),
            (self.code_of_conduct, "codeOfConduct"),
        ];
        for (granted, name) in flags {
            if !granted {
                details.push(FieldError::new(
                    format!("permissions.{}", name),
                    "Permission must be granted",
                ));
            }
        }
    }
}

/// Body of `POST /api/submit`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    pub camp_id: Uuid,
    #[serde(default)]
    pub children: Vec<ChildInfo>,
    #[serde(default)]
    pub guardian: Guardian,
    #[serde(default)]
    pub emergency_contact1: Option<EmergencyContact>,
    #[serde(default)]
    pub emergency_contact2: Option<EmergencyContact>,
    #[serde(default)]
    pub permissions: Permissions,
    /// Optional pricing item ids; required items are added server-side
    #[serde(default)]
    pub selected_items: Vec<Uuid>,
    /// Present on the paid path
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    /// Client's view of the payment state. Informational only.
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

impl RegistrationPayload {
    pub fn child_count(&self) -> i32 {
        self.children.len() as i32
    }

    /// Authoritative server-side validation. `camp` enables the age check.
    pub fn validate(&self, camp: Option<&Camp>) -> Result<(), ValidationError> {
        let mut details = Vec::new();

        if self.children.is_empty() {
            details.push(FieldError::new("children", "At least one child is required"));
        }
        for (index, child) in self.children.iter().enumerate() {
            child.validate(index, camp, &mut details);
        }

        let guardian = &self.guardian;
        if guardian.first_name.trim().is_empty() {
            details.push(FieldError::new("guardian.firstName", "First name is required"));
        }
        if guardian.last_name.trim().is_empty() {
            details.push(FieldError::new("guardian.lastName", "Last name is required"));
        }
        if !looks_like_email(&guardian.email) {
            details.push(FieldError::new("guardian.email", "A valid email is required"));
        }
        if guardian.phone.trim().is_empty() {
            details.push(FieldError::new("guardian.phone", "Phone is required"));
        }

        match &self.emergency_contact1 {
            Some(contact) => contact.validate("emergencyContact1", &mut details),
            None => details.push(FieldError::new(
                "emergencyContact1",
                "Emergency contact is required",
            )),
        }
        if let Some(contact) = &self.emergency_contact2 {
            let blank = contact.name.trim().is_empty() && contact.phone.trim().is_empty();
            if !blank {
                contact.validate("emergencyContact2", &mut details);
            }
        }

        self.permissions.validate(&mut details);

        if details.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::with_details(
                "Registration is incomplete",
                details,
            ))
        }
    }
}

/// A stored registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: Uuid,
    pub camp_id: Uuid,
    pub children: Vec<ChildInfo>,
    pub guardian: Guardian,
    pub emergency_contact1: EmergencyContact,
    pub emergency_contact2: Option<EmergencyContact>,
    pub permissions: Permissions,
    /// Pricing lines as they were when charged
    pub selected_items: Vec<SelectedItem>,
    /// Minor units; never recomputed after commit
    pub total_amount: i64,
    pub currency: Currency,
    pub payment_status: PaymentStatus,
    pub registration_status: RegistrationStatus,
    pub payment_intent_id: Option<String>,
    pub notes: Option<String>,
    pub anonymized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const REDACTED: &str = "[deleted]";

/// Pricing and payment facts fixed at commit time
#[derive(Debug, Clone)]
pub struct Settlement {
    pub selected_items: Vec<SelectedItem>,
    pub total_amount: i64,
    pub currency: Currency,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
}

impl Registration {
    /// Build a confirmed registration from a validated payload
    pub fn confirmed(
        payload: RegistrationPayload,
        settlement: Settlement,
    ) -> Result<Self, ValidationError> {
        let emergency_contact1 = payload.emergency_contact1.ok_or_else(|| {
            ValidationError::field("emergencyContact1", "Emergency contact is required")
        })?;
        let emergency_contact2 = payload
            .emergency_contact2
            .filter(|c| !(c.name.trim().is_empty() && c.phone.trim().is_empty()));

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            camp_id: payload.camp_id,
            children: payload.children,
            guardian: payload.guardian,
            emergency_contact1,
            emergency_contact2,
            permissions: payload.permissions,
            selected_items: settlement.selected_items,
            total_amount: settlement.total_amount,
            currency: settlement.currency,
            payment_status: settlement.payment_status,
            registration_status: RegistrationStatus::Confirmed,
            payment_intent_id: settlement.payment_intent_id,
            notes: None,
            anonymized_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Spots this registration occupies while `holds_spot()`
    pub fn spot_count(&self) -> i32 {
        self.children.len() as i32
    }

    pub fn holds_spot(&self) -> bool {
        self.registration_status.holds_spot()
    }

    pub fn is_anonymized(&self) -> bool {
        self.anonymized_at.is_some()
    }

    /// Strip personal data, keeping the row, its status, amounts and
    /// child count (and therefore its capacity effect).
    pub fn anonymize(&mut self) {
        for child in &mut self.children {
            child.anonymize();
        }
        self.guardian = Guardian {
            first_name: REDACTED.to_string(),
            last_name: REDACTED.to_string(),
            ..Guardian::default()
        };
        self.emergency_contact1 = EmergencyContact {
            name: REDACTED.to_string(),
            ..EmergencyContact::default()
        };
        self.emergency_contact2 = None;
        self.notes = None;
        let now = Utc::now();
        self.anonymized_at = Some(now);
        self.updated_at = now;
    }
}

/// Admin edit of a registration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPatch {
    pub registration_status: Option<RegistrationStatus>,
    pub notes: Option<String>,
}

/// Admin listing filter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFilter {
    pub camp_id: Option<Uuid>,
    pub registration_status: Option<RegistrationStatus>,
}

impl RegistrationFilter {
    pub fn matches(&self, registration: &Registration) -> bool {
        self.camp_id.map_or(true, |id| registration.camp_id == id)
            && self
                .registration_status
                .map_or(true, |status| registration.registration_status == status)
    }
}

/// Response of a successful submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReceipt {
    pub id: Uuid,
    pub spots_left: i32,
    pub total: i32,
    pub max: i32,
    pub total_amount: i64,
    pub payment_status: PaymentStatus,
}

impl RegistrationReceipt {
    pub fn new(registration: &Registration, availability: CampAvailability) -> Self {
        Self {
            id: registration.id,
            spots_left: availability.spots_left,
            total: availability.total,
            max: availability.max,
            total_amount: registration.total_amount,
            payment_status: registration.payment_status,
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn looks_like_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn child(first_name: &str) -> ChildInfo {
        ChildInfo {
            first_name: first_name.to_string(),
            last_name: "Rivera".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2017, 3, 14),
            ..ChildInfo::default()
        }
    }

    pub(crate) fn payload(camp_id: Uuid, children: usize) -> RegistrationPayload {
        RegistrationPayload {
            camp_id,
            children: (0..children).map(|i| child(&format!("Kid{}", i))).collect(),
            guardian: Guardian {
                first_name: "Ana".to_string(),
                last_name: "Rivera".to_string(),
                email: "ana@example.com".to_string(),
                phone: "555-0100".to_string(),
                address: None,
            },
            emergency_contact1: Some(EmergencyContact {
                name: "Luis Rivera".to_string(),
                phone: "555-0101".to_string(),
                relationship: "Uncle".to_string(),
            }),
            emergency_contact2: None,
            permissions: Permissions::all_granted(),
            selected_items: Vec::new(),
            payment_intent_id: None,
            payment_status: None,
        }
    }

    #[test]
    fn test_valid_payload() {
        assert!(payload(Uuid::new_v4(), 2).validate(None).is_ok());
    }

    #[test]
    fn test_zero_children_rejected() {
        let err = payload(Uuid::new_v4(), 0).validate(None).unwrap_err();
        assert!(err.details.iter().any(|d| d.field == "children"));
    }

    #[test]
    fn test_missing_permission_rejected() {
        let mut p = payload(Uuid::new_v4(), 1);
        p.permissions.photo_release = false;
        let err = p.validate(None).unwrap_err();
        assert_eq!(err.details.len(), 1);
        assert_eq!(err.details[0].field, "permissions.photoRelease");
    }

    #[test]
    fn test_conditional_details_required() {
        let mut p = payload(Uuid::new_v4(), 2);
        p.children[1].has_allergies = true;
        p.children[1].allergy_details = Some("  ".to_string());
        let err = p.validate(None).unwrap_err();
        assert_eq!(err.details[0].field, "children[1].allergyDetails");

        p.children[1].allergy_details = Some("Peanuts".to_string());
        assert!(p.validate(None).is_ok());
    }

    #[test]
    fn test_emergency_contact_rules() {
        let mut p = payload(Uuid::new_v4(), 1);
        p.emergency_contact1 = None;
        let err = p.validate(None).unwrap_err();
        assert_eq!(err.details[0].field, "emergencyContact1");

        let mut p = payload(Uuid::new_v4(), 1);
        p.emergency_contact2 = Some(EmergencyContact::default());
        assert!(p.validate(None).is_ok());

        p.emergency_contact2 = Some(EmergencyContact {
            name: "Half filled".to_string(),
            ..EmergencyContact::default()
        });
        let err = p.validate(None).unwrap_err();
        assert_eq!(err.details[0].field, "emergencyContact2.phone");
    }

    #[test]
    fn test_status_spot_holding() {
        assert!(RegistrationStatus::Confirmed.holds_spot());
        assert!(RegistrationStatus::NoShow.holds_spot());
        assert!(!RegistrationStatus::Cancelled.holds_spot());
        assert!(!RegistrationStatus::Waitlist.holds_spot());
        assert_eq!(
            serde_json::to_string(&RegistrationStatus::NoShow).unwrap(),
            "\"no-show\""
        );
        assert_eq!("no-show".parse(), Ok(RegistrationStatus::NoShow));
    }

    #[test]
    fn test_anonymize_keeps_capacity_facts() {
        let settlement = Settlement {
            selected_items: Vec::new(),
            total_amount: 52_000,
            currency: Currency::USD,
            payment_status: PaymentStatus::Paid,
            payment_intent_id: Some("pi_123".to_string()),
        };
        let mut reg = Registration::confirmed(payload(Uuid::new_v4(), 2), settlement).unwrap();
        reg.notes = Some("Needs early drop-off".to_string());
        reg.anonymize();

        assert!(reg.is_anonymized());
        assert_eq!(reg.spot_count(), 2);
        assert_eq!(reg.total_amount, 52_000);
        assert_eq!(reg.registration_status, RegistrationStatus::Confirmed);
        assert_eq!(reg.guardian.email, "");
        assert_eq!(reg.children[0].first_name, "[deleted]");
        assert!(reg.children[0].date_of_birth.is_none());
        assert!(reg.notes.is_none());
    }

    #[test]
    fn test_payload_json_shape() {
        let json = serde_json::json!({
            "campId": Uuid::nil(),
            "children": [{ "firstName": "Mia", "lastName": "Lee", "dateOfBirth": "2016-05-01",
                           "hasAllergies": true, "allergyDetails": "Bees" }],
            "guardian": { "firstName": "Jo", "lastName": "Lee", "email": "jo@lee.dev", "phone": "1" },
            "emergencyContact1": { "name": "Sam", "phone": "2", "relationship": "Aunt" },
            "permissions": { "liabilityWaiver": true, "medicalTreatment": true,
                             "photoRelease": true, "codeOfConduct": true }
        });
        let p: RegistrationPayload = serde_json::from_value(json).unwrap();
        assert_eq!(p.child_count(), 1);
        assert!(p.validate(None).is_ok());
    }
}
