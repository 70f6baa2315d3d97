pub use sea_orm_migration::prelude::*;

use sea_orm_migration::sea_orm::DatabaseBackend;
use sea_orm_migration::schema::pk_uuid;

mod m20250801_000001_create_users_and_children;
mod m20250801_000002_create_notifications_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250801_000001_create_users_and_children::Migration),
            Box::new(m20250801_000002_create_notifications_tables::Migration),
        ]
    }
}

/// UUID primary key. Postgres generates the value server-side; SQLite has no uuid
/// function, so ids there always come from the application.
pub(crate) fn uuid_pk<T: IntoIden>(backend: DatabaseBackend, col: T) -> ColumnDef {
    let mut def = pk_uuid(col);
    if backend == DatabaseBackend::Postgres {
        def.default(Expr::cust("gen_random_uuid()"));
    }
    def
}
