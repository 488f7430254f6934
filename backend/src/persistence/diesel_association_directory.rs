//! Diesel-backed association lookups.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{AssociationDirectory, DirectoryError};
use crate::domain::Association;
use crate::persistence::diesel_data_mapper::DieselDataMapper;
use crate::persistence::schema::associations;

/// Directory reading active associations through the bound mapper's pool.
pub struct DieselAssociationDirectory {
    mapper: Arc<DieselDataMapper>,
}

impl DieselAssociationDirectory {
    /// Share the mapper whose pool serves the lookups.
    pub fn new(mapper: Arc<DieselDataMapper>) -> Self {
        Self { mapper }
    }
}

#[derive(Queryable)]
struct AssociationRow {
    id: i32,
    name: String,
}

impl AssociationRow {
    fn into_record(self) -> Association {
        Association::new(self.id, self.name)
    }
}

#[async_trait]
impl AssociationDirectory for DieselAssociationDirectory {
    async fn fetch_all(&self) -> Result<Vec<Association>, DirectoryError> {
        let pool = self
            .mapper
            .pool()
            .ok_or_else(|| DirectoryError::unavailable("data layer not bound"))?;
        let mut conn = pool
            .get()
            .await
            .map_err(|err| DirectoryError::unavailable(err.to_string()))?;

        let rows: Vec<AssociationRow> = associations::table
            .filter(associations::active.eq(true))
            .select((associations::id, associations::name))
            .order(associations::id.asc())
            .load(&mut conn)
            .await
            .map_err(|err| DirectoryError::query(err.to_string()))?;

        Ok(rows.into_iter().map(AssociationRow::into_record).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::persistence::pool::PoolConfig;

    use super::*;

    #[actix_web::test]
    async fn unbound_mapper_yields_unavailable() {
        let mapper = Arc::new(DieselDataMapper::new(PoolConfig::new(
            "postgres://localhost/lend_manager",
        )));
        let directory = DieselAssociationDirectory::new(mapper);
        let err = directory.fetch_all().await.expect_err("must be unavailable");
        assert!(matches!(err, DirectoryError::Unavailable { .. }));
    }
}
