use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use products_hr::{
    ContactRecord, Employee, GroupKey, Grouping, Phase, Position, RefreshSummary, StoreEvent,
    UpdateOrigin,
};

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum PositionKind {
    Ios,
    Pm,
    Other,
    Web,
    Android,
    Sales,
    Tester,
}

impl From<Position> for PositionKind {
    fn from(value: Position) -> Self {
        match value {
            Position::Ios => PositionKind::Ios,
            Position::Pm => PositionKind::Pm,
            Position::Other => PositionKind::Other,
            Position::Web => PositionKind::Web,
            Position::Android => PositionKind::Android,
            Position::Sales => PositionKind::Sales,
            Position::Tester => PositionKind::Tester,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum GroupBy {
    #[default]
    Initial,
    Position,
}

impl From<GroupBy> for Grouping {
    fn from(value: GroupBy) -> Self {
        match value {
            GroupBy::Initial => Grouping::LastNameInitial,
            GroupBy::Position => Grouping::Position,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum PhaseKind {
    Idle,
    FetchingRemote,
    ReadingCache,
    Decoding,
    Caching,
    Updated,
    FetchFailed,
    ReadFailed,
}

impl From<Phase> for PhaseKind {
    fn from(value: Phase) -> Self {
        match value {
            Phase::Idle => PhaseKind::Idle,
            Phase::FetchingRemote => PhaseKind::FetchingRemote,
            Phase::ReadingCache => PhaseKind::ReadingCache,
            Phase::Decoding => PhaseKind::Decoding,
            Phase::Caching => PhaseKind::Caching,
            Phase::Updated => PhaseKind::Updated,
            Phase::FetchFailed => PhaseKind::FetchFailed,
            Phase::ReadFailed => PhaseKind::ReadFailed,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum OriginKind {
    Remote,
    Cache,
}

impl From<UpdateOrigin> for OriginKind {
    fn from(value: UpdateOrigin) -> Self {
        match value {
            UpdateOrigin::Remote => OriginKind::Remote,
            UpdateOrigin::Cache => OriginKind::Cache,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct EmployeeNode {
    pub key: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub position: Option<PositionKind>,
    pub position_title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub projects: Vec<String>,
    pub contacts_card_identifier: Option<String>,
}

impl From<&Employee> for EmployeeNode {
    fn from(employee: &Employee) -> Self {
        Self {
            key: employee.key(),
            first_name: employee.first_name.clone(),
            last_name: employee.last_name.clone(),
            full_name: employee.full_name(),
            position: employee.position.map(PositionKind::from),
            position_title: employee.position.map(|p| p.description().to_string()),
            email: employee.email().map(str::to_string),
            phone: employee.phone().map(str::to_string),
            projects: employee.projects().to_vec(),
            contacts_card_identifier: employee.contacts_card_identifier.clone(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct SectionNode {
    pub title: String,
    pub employees: Vec<EmployeeNode>,
}

impl SectionNode {
    pub fn new(key: &GroupKey, employees: &[Employee]) -> Self {
        Self {
            title: key.to_string(),
            employees: employees.iter().map(EmployeeNode::from).collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ContactCardNode {
    pub identifier: String,
    pub given_name: String,
    pub family_name: String,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub organization: Option<String>,
}

impl From<ContactRecord> for ContactCardNode {
    fn from(record: ContactRecord) -> Self {
        Self {
            identifier: record.identifier,
            given_name: record.given_name,
            family_name: record.family_name,
            emails: record.emails,
            phones: record.phones,
            organization: record.organization,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct StatusPayload {
    pub phase: PhaseKind,
    pub is_data_cached: bool,
    pub employees: usize,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct RefreshPayload {
    pub employees: usize,
    pub payloads: usize,
    pub failed_sources: usize,
    pub cached: bool,
    pub refreshed_at: DateTime<Utc>,
}

impl From<RefreshSummary> for RefreshPayload {
    fn from(summary: RefreshSummary) -> Self {
        Self {
            employees: summary.employees,
            payloads: summary.payloads,
            failed_sources: summary.failed_sources,
            cached: summary.cached,
            refreshed_at: summary.refreshed_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct UpdatePayload {
    pub origin: OriginKind,
    pub employees: usize,
}

impl From<StoreEvent> for UpdatePayload {
    fn from(event: StoreEvent) -> Self {
        Self {
            origin: event.origin.into(),
            employees: event.employees,
        }
    }
}
