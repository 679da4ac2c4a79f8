//! Address-book collaborator used to link employees to contact cards.
//!
//! The directory never owns contact data; it only asks a [`ContactsService`]
//! for identifiers and, on demand, for the card behind an identifier.

use std::{
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContactsError {
    #[error("contacts access not granted")]
    Unauthorized,
    #[error("failed to read address book {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid address book: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessStatus {
    Granted,
    Denied,
    NotDetermined,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContactField {
    Name,
    Emails,
    Phones,
    Organization,
}

impl ContactField {
    pub const ALL: [ContactField; 4] = [
        ContactField::Name,
        ContactField::Emails,
        ContactField::Phones,
        ContactField::Organization,
    ];
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ContactRecord {
    pub identifier: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub organization: Option<String>,
}

impl ContactRecord {
    fn matches(&self, first_name: &str, last_name: &str) -> bool {
        self.given_name.to_lowercase() == first_name.to_lowercase()
            && self.family_name.to_lowercase() == last_name.to_lowercase()
    }

    fn project(&self, fields: &[ContactField]) -> Self {
        let mut card = ContactRecord {
            identifier: self.identifier.clone(),
            ..ContactRecord::default()
        };
        for field in fields {
            match field {
                ContactField::Name => {
                    card.given_name = self.given_name.clone();
                    card.family_name = self.family_name.clone();
                }
                ContactField::Emails => card.emails = self.emails.clone(),
                ContactField::Phones => card.phones = self.phones.clone(),
                ContactField::Organization => card.organization = self.organization.clone(),
            }
        }
        card
    }
}

/// Calls may block; callers run them on the blocking pool.
pub trait ContactsService: Send + Sync {
    /// Asks the user for access when undecided. Never prompts twice.
    fn request_access(&self) -> AccessStatus;

    fn access_status(&self) -> AccessStatus;

    /// Case-insensitive match on both names.
    fn lookup(&self, first_name: &str, last_name: &str) -> Result<Option<String>, ContactsError>;

    fn fetch(
        &self,
        identifier: &str,
        fields: &[ContactField],
    ) -> Result<Option<ContactRecord>, ContactsError>;
}

/// Stand-in for platforms without an address book: access is always denied.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoContacts;

impl ContactsService for NoContacts {
    fn request_access(&self) -> AccessStatus {
        AccessStatus::Denied
    }

    fn access_status(&self) -> AccessStatus {
        AccessStatus::Denied
    }

    fn lookup(&self, _: &str, _: &str) -> Result<Option<String>, ContactsError> {
        Err(ContactsError::Unauthorized)
    }

    fn fetch(&self, _: &str, _: &[ContactField]) -> Result<Option<ContactRecord>, ContactsError> {
        Err(ContactsError::Unauthorized)
    }
}

/// In-memory address book, optionally loaded from a JSON array of records.
#[derive(Debug)]
pub struct AddressBook {
    records: RwLock<Vec<ContactRecord>>,
    status: RwLock<AccessStatus>,
    answer: AccessStatus,
}

impl AddressBook {
    pub fn granted(records: Vec<ContactRecord>) -> Self {
        Self::prompting(records, AccessStatus::Granted)
    }

    /// Access stays undecided until [`ContactsService::request_access`]
    /// resolves it to `answer`.
    pub fn prompting(records: Vec<ContactRecord>, answer: AccessStatus) -> Self {
        Self {
            records: RwLock::new(records),
            status: RwLock::new(AccessStatus::NotDetermined),
            answer,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContactsError> {
        let records = read_records(path.as_ref())?;
        Ok(Self::granted(records))
    }

    pub fn reload(&self, path: impl AsRef<Path>) -> Result<usize, ContactsError> {
        let records = read_records(path.as_ref())?;
        let count = records.len();
        self.replace(records);
        Ok(count)
    }

    pub fn replace(&self, records: Vec<ContactRecord>) {
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = records;
    }

    fn ensure_granted(&self) -> Result<(), ContactsError> {
        match self.access_status() {
            AccessStatus::Granted => Ok(()),
            _ => Err(ContactsError::Unauthorized),
        }
    }
}

fn read_records(path: &Path) -> Result<Vec<ContactRecord>, ContactsError> {
    let raw = std::fs::read(path).map_err(|source| ContactsError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&raw)?)
}

impl ContactsService for AddressBook {
    fn request_access(&self) -> AccessStatus {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        if *status == AccessStatus::NotDetermined {
            *status = self.answer;
        }
        *status
    }

    fn access_status(&self) -> AccessStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, first_name: &str, last_name: &str) -> Result<Option<String>, ContactsError> {
        self.ensure_granted()?;
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .find(|record| record.matches(first_name, last_name))
            .map(|record| record.identifier.clone()))
    }

    fn fetch(
        &self,
        identifier: &str,
        fields: &[ContactField],
    ) -> Result<Option<ContactRecord>, ContactsError> {
        self.ensure_granted()?;
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .find(|record| record.identifier == identifier)
            .map(|record| record.project(fields)))
    }
}
