//! Organization repository for database operations.
//!
//! Organizations are thin collaborator entities here; the interesting part
//! is the permission surface. Identities never carry roles themselves: they
//! act through employee rows, and an employee row carries zero or more
//! named permission grants.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QuerySelect, RelationTrait, Set,
};
use uuid::Uuid;

use crate::entities::{employee_permissions, employees, organizations};

/// Permission to redeem vouchers at a provider organization.
pub const PERM_SCAN_VOUCHERS: &str = "scan_vouchers";

/// Permission to decide fund-provider applications for a sponsor.
pub const PERM_MANAGE_PROVIDERS: &str = "manage_providers";

/// Permission to view transaction listings and finances reports.
pub const PERM_VIEW_FINANCES: &str = "view_finances";

/// Organization repository for CRUD and permission lookups.
#[derive(Debug, Clone)]
pub struct OrganizationRepository {
    db: DatabaseConnection,
}

impl OrganizationRepository {
    /// Creates a new organization repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds an organization by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<organizations::Model>, DbErr> {
        organizations::Entity::find_by_id(id).one(&self.db).await
    }

    /// Creates a new organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(
        &self,
        identity_address: &str,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<organizations::Model, DbErr> {
        let now = chrono::Utc::now().into();

        let org = organizations::ActiveModel {
            id: Set(Uuid::new_v4()),
            identity_address: Set(identity_address.to_string()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            phone: Set(phone.map(String::from)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        org.insert(&self.db).await
    }

    /// Adds an employee to an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn add_employee(
        &self,
        organization_id: Uuid,
        identity_address: &str,
        name: &str,
        email: &str,
    ) -> Result<employees::Model, DbErr> {
        let now = chrono::Utc::now().into();

        let employee = employees::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            identity_address: Set(identity_address.to_string()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        employee.insert(&self.db).await
    }

    /// Grants a named permission to an employee.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn grant_permission(
        &self,
        employee_id: Uuid,
        permission: &str,
    ) -> Result<employee_permissions::Model, DbErr> {
        let grant = employee_permissions::ActiveModel {
            employee_id: Set(employee_id),
            permission: Set(permission.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        grant.insert(&self.db).await
    }

    /// Checks whether an identity is an employee of an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_member(
        &self,
        organization_id: Uuid,
        identity_address: &str,
    ) -> Result<bool, DbErr> {
        let count = employees::Entity::find()
            .filter(employees::Column::OrganizationId.eq(organization_id))
            .filter(employees::Column::IdentityAddress.eq(identity_address))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// Checks whether an identity holds a permission on an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn identity_can(
        &self,
        organization_id: Uuid,
        identity_address: &str,
        permission: &str,
    ) -> Result<bool, DbErr> {
        let count = employees::Entity::find()
            .filter(employees::Column::OrganizationId.eq(organization_id))
            .filter(employees::Column::IdentityAddress.eq(identity_address))
            .join(
                JoinType::InnerJoin,
                employees::Relation::EmployeePermissions.def(),
            )
            .filter(employee_permissions::Column::Permission.eq(permission))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// Lists the organizations on which an identity holds a permission.
    ///
    /// This is the query behind the redemption authorizer's
    /// scannable-organization set.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn organizations_with_permission(
        &self,
        identity_address: &str,
        permission: &str,
    ) -> Result<Vec<Uuid>, DbErr> {
        employees::Entity::find()
            .filter(employees::Column::IdentityAddress.eq(identity_address))
            .join(
                JoinType::InnerJoin,
                employees::Relation::EmployeePermissions.def(),
            )
            .filter(employee_permissions::Column::Permission.eq(permission))
            .select_only()
            .column(employees::Column::OrganizationId)
            .into_tuple()
            .all(&self.db)
            .await
    }
}
