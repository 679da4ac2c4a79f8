use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    contacts::ContactsService,
    employee::Employee,
    error::{DirectoryError, DirectoryResult},
};

#[derive(Deserialize)]
struct Roster {
    employees: Vec<Employee>,
}

/// Decodes every payload and concatenates the rosters in payload order.
/// The first payload that fails to decode fails the whole batch.
pub fn decode_payloads(payloads: &[Bytes]) -> DirectoryResult<Vec<Employee>> {
    let mut employees = Vec::new();
    for (index, payload) in payloads.iter().enumerate() {
        let roster: Roster = serde_json::from_slice(payload)
            .map_err(|source| DirectoryError::Decode { index, source })?;
        debug!(index, count = roster.employees.len(), "payload decoded");
        employees.extend(roster.employees);
    }
    Ok(employees)
}

/// Attaches address-book identifiers by name. Lookups are best effort: a
/// failing lookup leaves that employee unlinked.
pub fn enrich(mut employees: Vec<Employee>, contacts: &dyn ContactsService) -> Vec<Employee> {
    for employee in &mut employees {
        let Some(first_name) = employee.first_name.as_deref() else {
            continue;
        };
        let last_name = employee.last_name.as_deref().unwrap_or_default();
        employee.contacts_card_identifier = match contacts.lookup(first_name, last_name) {
            Ok(identifier) => identifier,
            Err(err) => {
                warn!(employee = %employee.full_name(), error = %err, "contact lookup failed");
                None
            }
        };
    }
    employees
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::{AccessStatus, AddressBook, ContactField, ContactRecord, ContactsError};
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Bytes {
        Bytes::from(serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn concatenates_payloads_in_order() {
        let batch = [
            payload(json!({"employees": [{"fname": "A", "lname": "One"}]})),
            payload(json!({"employees": [{"fname": "B", "lname": "Two"}, {"fname": "C"}]})),
        ];
        let employees = decode_payloads(&batch).unwrap();
        let names: Vec<_> = employees.iter().map(Employee::full_name).collect();
        assert_eq!(names, ["A One", "B Two", "C"]);
    }

    #[test]
    fn one_bad_payload_fails_the_batch() {
        let batch = [
            payload(json!({"employees": []})),
            Bytes::from_static(b"<html>gateway timeout</html>"),
        ];
        let err = decode_payloads(&batch).unwrap_err();
        assert!(matches!(err, DirectoryError::Decode { index: 1, .. }));
    }

    #[test]
    fn missing_roster_key_is_a_decode_error() {
        let batch = [payload(json!({"staff": []}))];
        assert!(decode_payloads(&batch).is_err());
    }

    #[test]
    fn enrich_links_matching_contacts() {
        let book = AddressBook::granted(vec![ContactRecord {
            identifier: "card-7".into(),
            given_name: "liis".into(),
            family_name: "TAMM".into(),
            ..ContactRecord::default()
        }]);
        book.request_access();
        let employees = enrich(
            vec![Employee::new("Liis", "Tamm"), Employee::new("Mart", "Kask")],
            &book,
        );
        assert_eq!(employees[0].contacts_card_identifier.as_deref(), Some("card-7"));
        assert_eq!(employees[1].contacts_card_identifier, None);
    }

    struct Flaky;

    impl ContactsService for Flaky {
        fn request_access(&self) -> AccessStatus {
            AccessStatus::Granted
        }

        fn access_status(&self) -> AccessStatus {
            AccessStatus::Granted
        }

        fn lookup(&self, first: &str, _: &str) -> Result<Option<String>, ContactsError> {
            if first == "Broken" {
                Err(ContactsError::Unauthorized)
            } else {
                Ok(Some(format!("id-{first}")))
            }
        }

        fn fetch(
            &self,
            _: &str,
            _: &[ContactField],
        ) -> Result<Option<ContactRecord>, ContactsError> {
            Ok(None)
        }
    }

    #[test]
    fn lookup_failure_only_affects_that_employee() {
        let employees = enrich(
            vec![
                Employee::new("Broken", "Record"),
                Employee::new("Kati", "Karu"),
                Employee {
                    last_name: Some("NoFirst".into()),
                    ..Employee::default()
                },
            ],
            &Flaky,
        );
        assert_eq!(employees[0].contacts_card_identifier, None);
        assert_eq!(employees[1].contacts_card_identifier.as_deref(), Some("id-Kati"));
        assert_eq!(employees[2].contacts_card_identifier, None);
    }
}
