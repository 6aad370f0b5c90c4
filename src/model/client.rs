use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::nullable_vec;

/// A client record from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Client id.
    #[serde(rename = "clientID")]
    pub client_id: i64,
    /// Title before the name, e.g. `Dr`.
    #[serde(default)]
    pub title_prefix: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Middle names.
    #[serde(default)]
    pub middle_name: Option<String>,
    /// Surname.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Title after the name.
    #[serde(default)]
    pub title_suffix: Option<String>,
    /// Surname at birth.
    #[serde(default)]
    pub name_at_birth: Option<String>,
    /// Nickname.
    #[serde(default)]
    pub nick_name: Option<String>,
    /// Primary citizenship.
    #[serde(default)]
    pub citizenship1: Option<String>,
    /// Second citizenship.
    #[serde(default)]
    pub citizenship2: Option<String>,
    /// Date the client was onboarded.
    #[serde(default)]
    pub onboarding_date: Option<NaiveDate>,
    /// Client status.
    #[serde(default)]
    pub status: Option<String>,
    /// Gender.
    #[serde(default)]
    pub gender: Option<String>,
    /// Date of birth.
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    /// Correspondence language.
    #[serde(default)]
    pub language: Option<String>,
    /// Occupation.
    #[serde(default)]
    pub occupation: Option<String>,
    /// Country of tax residence.
    #[serde(default)]
    pub country_of_tax: Option<String>,
    /// Country the funds originate from.
    #[serde(default)]
    pub source_of_funds_country: Option<String>,
    /// FATCA classification.
    #[serde(default)]
    pub fatca_status: Option<String>,
    /// CRS classification.
    #[serde(default)]
    pub crs_status: Option<String>,
    /// Postal addresses. Empty when masked.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub addresses: Vec<Address>,
    /// Identity documents. Empty when masked.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub identifiers: Vec<Identifier>,
    /// Related persons. Empty when masked.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub related_parties: Vec<RelatedParty>,
}

impl Client {
    /// Title, given names, surname and suffix joined by spaces.
    #[must_use]
    pub fn full_name(&self) -> String {
        [
            &self.title_prefix,
            &self.first_name,
            &self.middle_name,
            &self.last_name,
            &self.title_suffix,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// The first address on file.
    #[must_use]
    pub fn primary_address(&self) -> Option<&Address> {
        self.addresses.first()
    }

    /// The first identity document on file.
    #[must_use]
    pub fn primary_identifier(&self) -> Option<&Identifier> {
        self.identifiers.first()
    }
}

/// A postal address attached to a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Kind of address, e.g. `RESIDENTIAL`.
    #[serde(default)]
    pub address_type: Option<String>,
    /// First line.
    #[serde(default)]
    pub address_line1: Option<String>,
    /// Second line.
    #[serde(default)]
    pub address_line2: Option<String>,
    /// Additional address details.
    #[serde(default)]
    pub address_supplement: Option<String>,
    /// City.
    #[serde(default)]
    pub city: Option<String>,
    /// Postal code.
    #[serde(default)]
    pub zip: Option<String>,
    /// Country.
    #[serde(default)]
    pub country: Option<String>,
}

/// An identity document attached to a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    /// Document type, e.g. `PASSPORT`.
    #[serde(default)]
    pub identifier_type: Option<String>,
    /// Document number as sent by some sources.
    #[serde(default)]
    pub identifier_value: Option<String>,
    /// Document number as sent by others.
    #[serde(default)]
    pub identifier_number: Option<String>,
    /// Issuing authority.
    #[serde(default)]
    pub issuing_authority: Option<String>,
}

impl Identifier {
    /// The document number, from whichever field the source system filled.
    #[must_use]
    pub fn number(&self) -> Option<&str> {
        self.identifier_value
            .as_deref()
            .filter(|v| !v.is_empty())
            .or(self.identifier_number.as_deref())
    }
}

/// A person related to a client, such as a director or beneficial owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedParty {
    /// Party id.
    #[serde(rename = "relatedPartyID", default)]
    pub related_party_id: Option<i64>,
    /// Client the party belongs to.
    #[serde(rename = "clientID", default)]
    pub client_id: Option<i64>,
    /// Relation to the client, e.g. `DIRECTOR`.
    #[serde(default)]
    pub relation_type: Option<String>,
    /// Title before the name.
    #[serde(default)]
    pub title_prefix: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Middle names.
    #[serde(default)]
    pub middle_name: Option<String>,
    /// Surname.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Date of birth.
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    /// Primary citizenship.
    #[serde(default)]
    pub citizenship1: Option<String>,
    /// Party status.
    #[serde(default)]
    pub status: Option<String>,
}

impl RelatedParty {
    /// Given name and surname.
    #[must_use]
    pub fn name(&self) -> String {
        [&self.first_name, &self.last_name]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Body of `POST /clients/{id}/related-parties`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRelatedParty {
    /// Given name.
    pub first_name: String,
    /// Surname.
    pub last_name: String,
    /// Relation to the client.
    pub relation_type: String,
    /// Initial status.
    pub status: String,
}

impl NewRelatedParty {
    /// An active director, the default relation offered by the form.
    #[must_use]
    pub fn director(first_name: String, last_name: String) -> Self {
        Self {
            first_name,
            last_name,
            relation_type: "DIRECTOR".to_string(),
            status: "ACTIVE".to_string(),
        }
    }
}
