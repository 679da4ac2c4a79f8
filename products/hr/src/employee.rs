use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

/// Job family an employee belongs to. Wire values are upper-case.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Ios,
    Pm,
    Other,
    Web,
    Android,
    Sales,
    Tester,
}

impl Position {
    pub const ALL: [Position; 7] = [
        Position::Ios,
        Position::Pm,
        Position::Other,
        Position::Web,
        Position::Android,
        Position::Sales,
        Position::Tester,
    ];

    pub fn description(self) -> &'static str {
        match self {
            Position::Ios => "iOS Developer",
            Position::Pm => "Project Manager",
            Position::Other => "Other Staff",
            Position::Web => "Web Developer",
            Position::Android => "Android Developer",
            Position::Sales => "Sales",
            Position::Tester => "Software Tester",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

// Positions are listed by their display text.
impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.description()
            .to_lowercase()
            .cmp(&other.description().to_lowercase())
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ContactDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// One roster entry as served by the office endpoints.
///
/// Identity and ordering only look at `(last_name, first_name)`; an absent
/// name sorts before any present one.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Employee {
    #[serde(rename = "fname", default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "lname", default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_details: Option<ContactDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
    /// Address-book identifier attached after decoding; never on the wire.
    #[serde(skip)]
    pub contacts_card_identifier: Option<String>,
}

impl Employee {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            ..Self::default()
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    /// Lower-case lookup key, `"{last}.{first}"`.
    pub fn key(&self) -> String {
        format!(
            "{}.{}",
            self.last_name.as_deref().unwrap_or_default().to_lowercase(),
            self.first_name.as_deref().unwrap_or_default().to_lowercase()
        )
    }

    pub fn email(&self) -> Option<&str> {
        self.contact_details.as_ref()?.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.contact_details.as_ref()?.phone.as_deref()
    }

    pub fn projects(&self) -> &[String] {
        self.projects.as_deref().unwrap_or_default()
    }
}

impl PartialEq for Employee {
    fn eq(&self, other: &Self) -> bool {
        self.last_name == other.last_name && self.first_name == other.first_name
    }
}

impl Eq for Employee {}

impl Ord for Employee {
    fn cmp(&self, other: &Self) -> Ordering {
        self.last_name
            .cmp(&other.last_name)
            .then_with(|| self.first_name.cmp(&other.first_name))
    }
}

impl PartialOrd for Employee {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
