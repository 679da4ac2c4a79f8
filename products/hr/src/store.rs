use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::{Mutex, broadcast};
use tracing::debug;

use crate::{
    employee::Employee,
    grouping::{self, GroupKey, Grouping},
};

const EVENT_CAPACITY: usize = 16;

/// Where a store replacement came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOrigin {
    Remote,
    Cache,
}

#[derive(Clone, Debug)]
pub struct StoreEvent {
    pub origin: UpdateOrigin,
    pub employees: usize,
}

/// Sorted employee list behind a single access point.
///
/// Writers replace the whole list; readers compute their views while holding
/// the same lock, so nobody observes a half-replaced list.
#[derive(Debug)]
pub struct EmployeeStore {
    employees: Mutex<Arc<Vec<Employee>>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for EmployeeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EmployeeStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            employees: Mutex::new(Arc::new(Vec::new())),
            events,
        }
    }

    pub async fn replace(&self, mut employees: Vec<Employee>, origin: UpdateOrigin) {
        employees.sort();
        let count = employees.len();
        {
            let mut current = self.employees.lock().await;
            *current = Arc::new(employees);
        }
        debug!(count, ?origin, "employee store replaced");
        // No subscribers is fine.
        let _ = self.events.send(StoreEvent {
            origin,
            employees: count,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Arc<Vec<Employee>> {
        Arc::clone(&*self.employees.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.employees.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn grouped(&self, grouping: Grouping) -> BTreeMap<GroupKey, Vec<Employee>> {
        let employees = self.employees.lock().await;
        grouping::group(&employees, grouping)
    }

    pub async fn search(&self, query: &str) -> Vec<Employee> {
        let employees = self.employees.lock().await;
        grouping::search(&employees, query)
    }

    pub async fn find(&self, key: &str) -> Option<Employee> {
        let key = key.to_lowercase();
        let employees = self.employees.lock().await;
        employees.iter().find(|employee| employee.key() == key).cloned()
    }
}
