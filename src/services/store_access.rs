use std::sync::Arc;

use tracing::warn;

use crate::entities::user::{Model as UserModel, Role};
use crate::errors::ServiceError;
use crate::repositories::ManagerStoreLookup;

/// Authorization gate for store-scoped manager actions.
///
/// The role check always runs first and never touches persistence; the
/// manager-store relationship is only consulted once the role passes.
#[derive(Clone)]
pub struct StoreAccessGate {
    lookup: Arc<dyn ManagerStoreLookup>,
    admin_bypass: bool,
}

impl StoreAccessGate {
    pub fn new(lookup: Arc<dyn ManagerStoreLookup>, admin_bypass: bool) -> Self {
        Self {
            lookup,
            admin_bypass,
        }
    }

    /// Rejects anyone who is neither ADMIN nor MANAGER.
    pub fn ensure_role(&self, user: &UserModel) -> Result<(), ServiceError> {
        if user.role.is_staff() {
            Ok(())
        } else {
            warn!(user_id = user.id, role = ?user.role, "Store action refused: insufficient role");
            Err(ServiceError::Forbidden(
                "Manager or admin role required".to_string(),
            ))
        }
    }

    /// Role check followed by the manager-store relationship check.
    pub async fn ensure_store_access(
        &self,
        user: &UserModel,
        store_id: i64,
    ) -> Result<(), ServiceError> {
        self.ensure_role(user)?;

        if self.admin_bypass && user.role == Role::Admin {
            return Ok(());
        }

        if self.lookup.manages_store(user.id, store_id).await? {
            Ok(())
        } else {
            warn!(user_id = user.id, store_id, "Store action refused: no manager-store relationship");
            Err(ServiceError::Forbidden(format!(
                "No access to store {}",
                store_id
            )))
        }
    }
}
