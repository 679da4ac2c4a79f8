use std::{collections::BTreeMap, fmt};

use crate::employee::{Employee, Position};

/// How the directory is sectioned for display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Grouping {
    #[default]
    LastNameInitial,
    Position,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    Initial(char),
    Position(Position),
}

/// Section used for employees without a last name.
pub const UNKNOWN_INITIAL: char = '#';

impl GroupKey {
    pub fn for_employee(employee: &Employee, grouping: Grouping) -> Self {
        match grouping {
            Grouping::LastNameInitial => GroupKey::Initial(initial(employee)),
            Grouping::Position => {
                GroupKey::Position(employee.position.unwrap_or(Position::Other))
            }
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Initial(c) => write!(f, "{c}"),
            GroupKey::Position(position) => write!(f, "{position}"),
        }
    }
}

fn initial(employee: &Employee) -> char {
    employee
        .last_name
        .as_deref()
        .and_then(|name| name.trim().chars().next())
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or(UNKNOWN_INITIAL)
}

/// Buckets employees by key, keeping input order inside every bucket.
pub fn group(employees: &[Employee], grouping: Grouping) -> BTreeMap<GroupKey, Vec<Employee>> {
    let mut groups: BTreeMap<GroupKey, Vec<Employee>> = BTreeMap::new();
    for employee in employees {
        groups
            .entry(GroupKey::for_employee(employee, grouping))
            .or_default()
            .push(employee.clone());
    }
    groups
}

pub fn flatten(groups: &BTreeMap<GroupKey, Vec<Employee>>) -> Vec<Employee> {
    groups.values().flatten().cloned().collect()
}

/// Case-insensitive substring filter over names, contact details, position
/// and projects. A blank query matches everyone.
pub fn search(employees: &[Employee], query: &str) -> Vec<Employee> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return employees.to_vec();
    }
    employees
        .iter()
        .filter(|employee| matches(employee, &needle))
        .cloned()
        .collect()
}

fn matches(employee: &Employee, needle: &str) -> bool {
    let hit = |text: &str| text.to_lowercase().contains(needle);
    hit(&employee.full_name())
        || employee.email().is_some_and(hit)
        || employee.phone().is_some_and(hit)
        || employee.position.is_some_and(|p| hit(p.description()))
        || employee.projects().iter().any(|project| hit(project.as_str()))
}
