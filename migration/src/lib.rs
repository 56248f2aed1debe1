pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_test_requests_table;
mod m20250601_000002_create_pledges_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_test_requests_table::Migration),
            Box::new(m20250601_000002_create_pledges_table::Migration),
        ]
    }
}
