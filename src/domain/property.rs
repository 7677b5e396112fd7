use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::validators::{is_valid_text, required};

const MAX_TITLE_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 10_000;
const MAX_ADDRESS_FIELD_LENGTH: usize = 200;
const MAX_IMAGES: usize = 50;
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

/// Moderation state of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Draft => "draft",
            ListingStatus::Pending => "pending",
            ListingStatus::Approved => "approved",
            ListingStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ListingStatus::Draft),
            "pending" => Ok(ListingStatus::Pending),
            "approved" => Ok(ListingStatus::Approved),
            "rejected" => Ok(ListingStatus::Rejected),
            other => Err(format!("unknown listing status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    #[default]
    Sale,
    Rent,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Sale => "sale",
            ListingType::Rent => "rent",
        }
    }
}

impl FromStr for ListingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(ListingType::Sale),
            "rent" => Ok(ListingType::Rent),
            other => Err(format!("unknown listing type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
}

/// A property listing as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: Uuid,
    /// Owning agent. Set from the authenticated identity at creation.
    pub agent_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: String,
    pub listing_type: ListingType,
    pub property_type: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqm: Option<f64>,
    pub address: Address,
    pub images: Vec<String>,
    pub status: ListingStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.agent_id == user_id
    }

    /// Build a listing from validated input. Status and audit fields are
    /// left for the moderation engine to set.
    pub fn from_input(
        id: Uuid,
        agent_id: Uuid,
        input: ValidListing,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            agent_id,
            title: input.title,
            description: input.description,
            price: input.price,
            currency: input.currency,
            listing_type: input.listing_type,
            property_type: input.property_type,
            bedrooms: input.bedrooms,
            bathrooms: input.bathrooms,
            area_sqm: input.area_sqm,
            address: input.address,
            images: input.images,
            status: ListingStatus::Pending,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Lowercased words used by the token-prefix search.
    fn search_words(&self) -> Vec<String> {
        let mut text = format!("{} {}", self.title, self.address.city);
        if let Some(description) = &self.description {
            text.push(' ');
            text.push_str(description);
        }
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl AddressInput {
    pub fn validate(&self) -> Result<Address, ValidationError> {
        let line1 = required(&self.line1, "address.line1")?;
        let city = required(&self.city, "address.city")?;
        let country = required(&self.country, "address.country")?;

        Ok(Address {
            line1: is_valid_text(line1, "address.line1", MAX_ADDRESS_FIELD_LENGTH)?,
            line2: optional_text(&self.line2, "address.line2", MAX_ADDRESS_FIELD_LENGTH)?,
            city: is_valid_text(city, "address.city", MAX_ADDRESS_FIELD_LENGTH)?,
            state: optional_text(&self.state, "address.state", MAX_ADDRESS_FIELD_LENGTH)?,
            postal_code: optional_text(&self.postal_code, "address.postalCode", 20)?,
            country: is_valid_text(country, "address.country", MAX_ADDRESS_FIELD_LENGTH)?,
        })
    }
}

/// Create-listing body. Client-supplied `status`, `agentId` and audit fields
/// are not part of the schema and are dropped during deserialisation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub listing_type: Option<ListingType>,
    pub property_type: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqm: Option<f64>,
    pub address: Option<AddressInput>,
    pub images: Option<Vec<String>>,
}

/// Listing fields after validation.
#[derive(Debug, Clone)]
pub struct ValidListing {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: String,
    pub listing_type: ListingType,
    pub property_type: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqm: Option<f64>,
    pub address: Address,
    pub images: Vec<String>,
}

impl PropertyInput {
    pub fn validate(&self) -> Result<ValidListing, ValidationError> {
        let title = is_valid_text(required(&self.title, "title")?, "title", MAX_TITLE_LENGTH)?;
        let price = self
            .price
            .ok_or_else(|| ValidationError::MissingField("price".to_string()))?;
        let address = self
            .address
            .as_ref()
            .ok_or_else(|| ValidationError::MissingField("address".to_string()))?
            .validate()?;

        Ok(ValidListing {
            title,
            description: optional_text(&self.description, "description", MAX_DESCRIPTION_LENGTH)?,
            price: valid_price(price)?,
            currency: valid_currency(self.currency.as_deref())?,
            listing_type: self.listing_type.unwrap_or_default(),
            property_type: optional_text(&self.property_type, "propertyType", 50)?,
            bedrooms: valid_count(self.bedrooms, "bedrooms")?,
            bathrooms: valid_count(self.bathrooms, "bathrooms")?,
            area_sqm: valid_area(self.area_sqm)?,
            address,
            images: valid_images(self.images.clone().unwrap_or_default())?,
        })
    }
}

/// Partial update body. Status is not editable here; it only moves through
/// the moderation transitions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub listing_type: Option<ListingType>,
    pub property_type: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqm: Option<f64>,
    pub address: Option<AddressInput>,
    pub images: Option<Vec<String>>,
}

/// Outcome of applying a patch, consumed by the notification fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FieldChanges {
    pub price: Option<(f64, f64)>,
}

impl PropertyPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.currency.is_none()
            && self.listing_type.is_none()
            && self.property_type.is_none()
            && self.bedrooms.is_none()
            && self.bathrooms.is_none()
            && self.area_sqm.is_none()
            && self.address.is_none()
            && self.images.is_none()
    }

    /// Validate every supplied field and write it into `property`.
    /// Nothing is written when any field is invalid.
    pub fn apply_to(&self, property: &mut Property) -> Result<FieldChanges, ValidationError> {
        let mut next = property.clone();
        let mut changes = FieldChanges::default();

        if let Some(title) = &self.title {
            next.title = is_valid_text(title, "title", MAX_TITLE_LENGTH)?;
        }
        if self.description.is_some() {
            next.description =
                optional_text(&self.description, "description", MAX_DESCRIPTION_LENGTH)?;
        }
        if let Some(price) = self.price {
            let price = valid_price(price)?;
            if price != property.price {
                changes.price = Some((property.price, price));
            }
            next.price = price;
        }
        if let Some(currency) = &self.currency {
            next.currency = valid_currency(Some(currency))?;
        }
        if let Some(listing_type) = self.listing_type {
            next.listing_type = listing_type;
        }
        if self.property_type.is_some() {
            next.property_type = optional_text(&self.property_type, "propertyType", 50)?;
        }
        if self.bedrooms.is_some() {
            next.bedrooms = valid_count(self.bedrooms, "bedrooms")?;
        }
        if self.bathrooms.is_some() {
            next.bathrooms = valid_count(self.bathrooms, "bathrooms")?;
        }
        if self.area_sqm.is_some() {
            next.area_sqm = valid_area(self.area_sqm)?;
        }
        if let Some(address) = &self.address {
            next.address = address.validate()?;
        }
        if let Some(images) = &self.images {
            next.images = valid_images(images.clone())?;
        }

        *property = next;
        Ok(changes)
    }
}

/// Query parameters for listing searches (`?city=..&min_price=..`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyFilter {
    pub q: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub property_type: Option<String>,
    pub listing_type: Option<ListingType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub status: Option<ListingStatus>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl PropertyFilter {
    /// Lowercased tokens of the free-text query; empty when there is none.
    pub fn query_tokens(&self) -> Vec<String> {
        self.q
            .as_deref()
            .map(|q| q.split_whitespace().map(str::to_lowercase).collect())
            .unwrap_or_default()
    }

    /// Every query token must be a prefix of some word in the listing.
    pub fn matches_query(&self, property: &Property) -> bool {
        let tokens = self.query_tokens();
        if tokens.is_empty() {
            return true;
        }

        let words = property.search_words();
        tokens
            .iter()
            .all(|token| words.iter().any(|word| word.starts_with(token.as_str())))
    }

    /// Structured filters, excluding status and the free-text query.
    pub fn matches_fields(&self, property: &Property) -> bool {
        fn same(a: &Option<String>, b: &str) -> bool {
            a.as_deref().map_or(true, |a| a.trim().eq_ignore_ascii_case(b))
        }

        same(&self.city, &property.address.city)
            && same(&self.country, &property.address.country)
            && self.property_type.as_deref().map_or(true, |t| {
                property
                    .property_type
                    .as_deref()
                    .map_or(false, |pt| pt.eq_ignore_ascii_case(t.trim()))
            })
            && self.listing_type.map_or(true, |t| t == property.listing_type)
            && self.min_price.map_or(true, |min| property.price >= min)
            && self.max_price.map_or(true, |max| property.price <= max)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Rows to skip. Saturates for absurd page numbers, which then
    /// simply yield an empty page.
    pub fn offset(&self) -> usize {
        self.page
            .unwrap_or(1)
            .max(1)
            .saturating_sub(1)
            .saturating_mul(self.limit())
    }

    /// Apply the text query to listings already matching the structured
    /// filters, then slice out the requested page.
    pub fn paginate(&self, properties: Vec<Property>) -> Vec<Property> {
        properties
            .into_iter()
            .filter(|p| self.matches_query(p))
            .skip(self.offset())
            .take(self.limit())
            .collect()
    }
}

fn optional_text(
    value: &Option<String>,
    field: &str,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => is_valid_text(v, field, max).map(Some),
    }
}

fn valid_price(price: f64) -> Result<f64, ValidationError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ValidationError::OutOfRange("price".to_string()));
    }
    Ok(price)
}

fn valid_currency(currency: Option<&str>) -> Result<String, ValidationError> {
    match currency.map(str::trim) {
        None | Some("") => Ok(DEFAULT_CURRENCY.to_string()),
        Some(c) if c.len() == 3 && c.chars().all(|ch| ch.is_ascii_alphabetic()) => {
            Ok(c.to_ascii_uppercase())
        }
        Some(_) => Err(ValidationError::InvalidFormat("currency".to_string())),
    }
}

fn valid_count(value: Option<i32>, field: &str) -> Result<Option<i32>, ValidationError> {
    match value {
        Some(n) if !(0..=1000).contains(&n) => Err(ValidationError::OutOfRange(field.to_string())),
        other => Ok(other),
    }
}

fn valid_area(value: Option<f64>) -> Result<Option<f64>, ValidationError> {
    match value {
        Some(a) if !a.is_finite() || a < 0.0 => {
            Err(ValidationError::OutOfRange("areaSqm".to_string()))
        }
        other => Ok(other),
    }
}

fn valid_images(images: Vec<String>) -> Result<Vec<String>, ValidationError> {
    if images.len() > MAX_IMAGES {
        return Err(ValidationError::OutOfRange("images".to_string()));
    }
    images
        .iter()
        .map(|url| is_valid_text(url, "images", 2048))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> PropertyInput {
        PropertyInput {
            title: Some("Sunny loft".to_string()),
            description: Some("Two bedroom loft near the river".to_string()),
            price: Some(250_000.0),
            address: Some(AddressInput {
                line1: Some("1 Main St".to_string()),
                city: Some("Lisbon".to_string()),
                country: Some("PT".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn property() -> Property {
        Property::from_input(Uuid::new_v4(), Uuid::new_v4(), input().validate().unwrap(), Utc::now())
    }

    #[test]
    fn test_address_requires_line1_city_country() {
        for missing in ["line1", "city", "country"] {
            let mut body = input();
            let address = body.address.as_mut().unwrap();
            match missing {
                "line1" => address.line1 = None,
                "city" => address.city = None,
                _ => address.country = None,
            }
            assert!(body.validate().is_err(), "missing {}", missing);
        }
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut body = input();
        body.price = Some(-1.0);
        assert!(body.validate().is_err());

        body.price = Some(0.0);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_defaults_applied() {
        let valid = input().validate().unwrap();
        assert_eq!(valid.currency, "USD");
        assert_eq!(valid.listing_type, ListingType::Sale);
        assert!(valid.images.is_empty());
    }

    #[test]
    fn test_patch_reports_price_change_and_is_atomic() {
        let mut listing = property();
        let patch = PropertyPatch {
            price: Some(200_000.0),
            ..Default::default()
        };
        let changes = patch.apply_to(&mut listing).unwrap();
        assert_eq!(changes.price, Some((250_000.0, 200_000.0)));
        assert_eq!(listing.price, 200_000.0);

        let bad = PropertyPatch {
            title: Some("New title".to_string()),
            price: Some(-5.0),
            ..Default::default()
        };
        assert!(bad.apply_to(&mut listing).is_err());
        assert_eq!(listing.title, "Sunny loft");
    }

    #[test]
    fn test_token_prefix_search() {
        let listing = property();
        let query = |q: &str| PropertyFilter {
            q: Some(q.to_string()),
            ..Default::default()
        };

        assert!(query("sun lis").matches_query(&listing));
        assert!(query("RIV").matches_query(&listing));
        assert!(!query("sun porto").matches_query(&listing));
        assert!(!query("oft").matches_query(&listing));
    }

    #[test]
    fn test_field_filters() {
        let listing = property();
        let filter = PropertyFilter {
            city: Some("lisbon".to_string()),
            min_price: Some(100_000.0),
            max_price: Some(300_000.0),
            ..Default::default()
        };
        assert!(filter.matches_fields(&listing));

        let filter = PropertyFilter {
            listing_type: Some(ListingType::Rent),
            ..Default::default()
        };
        assert!(!filter.matches_fields(&listing));
    }

    #[test]
    fn test_pagination_bounds() {
        let filter = PropertyFilter {
            page: Some(0),
            limit: Some(1000),
            ..Default::default()
        };
        assert_eq!(filter.offset(), 0);
        assert_eq!(filter.limit(), 100);
    }

    #[test]
    fn test_huge_page_saturates_offset() {
        let filter = PropertyFilter {
            page: Some(usize::MAX),
            ..Default::default()
        };
        assert_eq!(filter.offset(), usize::MAX);
        assert!(filter.paginate(vec![property()]).is_empty());
    }

    #[test]
    fn test_query_tokens_are_lowercased() {
        let filter = PropertyFilter {
            q: Some("  Sunny  LOFT ".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.query_tokens(), vec!["sunny", "loft"]);
        assert!(PropertyFilter::default().query_tokens().is_empty());
    }
}
