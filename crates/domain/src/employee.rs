use common::{EmployeeId, SiteId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub site_id: SiteId,
    /// Free-form role name as configured for the site, e.g. `picker` or `Cashier`.
    pub role: String,
}

impl Employee {
    pub fn new(name: impl Into<String>, site_id: SiteId, role: impl Into<String>) -> Self {
        Self {
            id: EmployeeId::new(),
            name: name.into(),
            site_id,
            role: role.into(),
        }
    }

    /// Case-insensitive role match against a list of role names.
    pub fn has_role_in<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles
            .iter()
            .any(|role| role.as_ref().eq_ignore_ascii_case(&self.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_match_ignores_case() {
        let employee = Employee::new("Ana", SiteId::new(), "Picker");
        assert!(employee.has_role_in(&["picker", "packer"]));
        assert!(!employee.has_role_in(&["cashier"]));
    }
}
