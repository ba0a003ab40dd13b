//! The acting principal, passed explicitly into every mutating call.

use uuid::Uuid;

use crate::domain::types::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn new(id: Uuid, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            id,
            roles: roles.into_iter().collect(),
        }
    }

    pub fn customer(id: Uuid) -> Self {
        Self::new(id, [Role::Customer])
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, [Role::Admin])
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Owner of the resource, or elevated.
    pub fn may_manage(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.is_admin()
    }
}
