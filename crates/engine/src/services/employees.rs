use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::EmployeeId;
use domain::Employee;
use tokio::sync::RwLock;

use crate::error::Result;

/// Read-only view of the staff directory.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn get(&self, id: EmployeeId) -> Result<Option<Employee>>;
}

#[derive(Clone, Default)]
pub struct InMemoryEmployeeDirectory {
    employees: Arc<RwLock<HashMap<EmployeeId, Employee>>>,
}

impl InMemoryEmployeeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, employee: Employee) -> Employee {
        self.employees
            .write()
            .await
            .insert(employee.id, employee.clone());
        employee
    }
}

#[async_trait]
impl EmployeeDirectory for InMemoryEmployeeDirectory {
    async fn get(&self, id: EmployeeId) -> Result<Option<Employee>> {
        Ok(self.employees.read().await.get(&id).cloned())
    }
}
