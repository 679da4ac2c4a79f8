//! HR employee directory.
//!
//! Pulls the employee roster from the office endpoints, keeps the raw payloads
//! in a disk cache, links entries to the address book and serves sorted,
//! grouped and searchable views of the result.

pub mod config;
pub mod contacts;
pub mod decode;
pub mod employee;
pub mod error;
pub mod fetch;
pub mod grouping;
pub mod model;
pub mod store;

pub use config::{DEFAULT_SOURCES, DirectoryConfig, PartialFailurePolicy};
pub use contacts::{
    AccessStatus, AddressBook, ContactField, ContactRecord, ContactsError, ContactsService,
    NoContacts,
};
pub use employee::{ContactDetails, Employee, Position};
pub use error::{DirectoryError, DirectoryResult, FetchError};
pub use grouping::{GroupKey, Grouping};
pub use model::{DirectoryModel, Phase, RefreshSummary};
pub use store::{EmployeeStore, StoreEvent, UpdateOrigin};
