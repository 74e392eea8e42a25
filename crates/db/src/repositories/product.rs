//! Product and product-category repository for database operations.

use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use uuid::Uuid;

use crate::entities::{product_categories, products};

/// Product repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    db: DatabaseConnection,
}

impl ProductRepository {
    /// Creates a new product repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a product by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<products::Model>, DbErr> {
        products::Entity::find_by_id(id).one(&self.db).await
    }

    /// Creates a new product.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(
        &self,
        organization_id: Uuid,
        product_category_id: Option<Uuid>,
        name: &str,
        price: Decimal,
    ) -> Result<products::Model, DbErr> {
        let now = chrono::Utc::now().into();

        let product = products::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            product_category_id: Set(product_category_id),
            name: Set(name.to_string()),
            price: Set(price),
            created_at: Set(now),
            updated_at: Set(now),
        };

        product.insert(&self.db).await
    }

    /// Creates a new product category.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create_category(
        &self,
        key: &str,
        name: &str,
    ) -> Result<product_categories::Model, DbErr> {
        let now = chrono::Utc::now().into();

        let category = product_categories::ActiveModel {
            id: Set(Uuid::new_v4()),
            key: Set(key.to_string()),
            name: Set(name.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        category.insert(&self.db).await
    }
}
