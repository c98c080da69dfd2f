use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::Row;

use sentra_core::TenantCredential;

use super::{RepositoryError, TenantRepository};
use crate::DbPool;

pub struct SqlTenantRepository {
    pool: DbPool,
}

impl SqlTenantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRepository for SqlTenantRepository {
    async fn upsert(&self, record: TenantCredential) -> Result<TenantCredential, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO tenants (name, client_id, client_secret, vanity_domain, customer_id, test_tenant)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(name) DO UPDATE SET
                client_id = excluded.client_id,
                client_secret = excluded.client_secret,
                vanity_domain = excluded.vanity_domain,
                customer_id = excluded.customer_id,
                test_tenant = excluded.test_tenant,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            "#,
        )
        .bind(&record.name)
        .bind(record.client_id.as_deref())
        .bind(record.client_secret.as_ref().map(|secret| secret.expose_secret().to_string()))
        .bind(record.vanity_domain.as_deref())
        .bind(record.customer_id.as_deref())
        .bind(i64::from(record.test_tenant))
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<TenantCredential>, RepositoryError> {
        let row = sqlx::query(
            "SELECT name, client_id, client_secret, vanity_domain, customer_id, test_tenant \
             FROM tenants WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_row).transpose()
    }

    async fn list(&self) -> Result<Vec<TenantCredential>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT name, client_id, client_secret, vanity_domain, customer_id, test_tenant \
             FROM tenants ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_row).collect()
    }

    async fn delete(&self, name: &str) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM tenants WHERE name = ?1").bind(name).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

fn decode_row(row: sqlx::sqlite::SqliteRow) -> Result<TenantCredential, RepositoryError> {
    let secret: Option<String> = row
        .try_get("client_secret")
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(TenantCredential {
        name: row.try_get("name").map_err(|error| RepositoryError::Decode(error.to_string()))?,
        client_id: row
            .try_get("client_id")
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        client_secret: secret.map(Into::into),
        vanity_domain: row
            .try_get("vanity_domain")
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        customer_id: row
            .try_get("customer_id")
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        test_tenant: row
            .try_get::<i64, _>("test_tenant")
            .map_err(|error| RepositoryError::Decode(error.to_string()))?
            != 0,
    })
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;
    use sentra_core::TenantCredential;

    use super::SqlTenantRepository;
    use crate::repositories::TenantRepository;
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlTenantRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.unwrap();
        migrations::run_pending(&pool).await.unwrap();
        SqlTenantRepository::new(pool)
    }

    fn acme() -> TenantCredential {
        TenantCredential {
            name: "acme".to_string(),
            client_id: Some("client-1".to_string()),
            client_secret: Some("secret-1".to_string().into()),
            vanity_domain: Some("acme".to_string()),
            customer_id: Some("216199618143191040".to_string()),
            test_tenant: false,
        }
    }

    #[tokio::test]
    async fn upsert_then_find_returns_the_stored_record() {
        let repo = repository().await;
        repo.upsert(acme()).await.unwrap();

        let found = repo.find_by_name("acme").await.unwrap().expect("record");
        assert_eq!(found.client_id.as_deref(), Some("client-1"));
        assert_eq!(found.client_secret.unwrap().expose_secret(), "secret-1");
        assert_eq!(found.vanity_domain.as_deref(), Some("acme"));
        assert!(!found.test_tenant);
    }

    #[tokio::test]
    async fn unknown_name_returns_none_not_a_partial_record() {
        let repo = repository().await;
        assert!(repo.find_by_name("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_is_last_write_wins_never_a_merge() {
        let repo = repository().await;
        repo.upsert(acme()).await.unwrap();

        // Second write clears most fields; the read must reflect exactly that,
        // not a merge of both writes.
        let mut second = TenantCredential::named("acme");
        second.client_id = Some("client-2".to_string());
        repo.upsert(second).await.unwrap();

        let found = repo.find_by_name("acme").await.unwrap().expect("record");
        assert_eq!(found.client_id.as_deref(), Some("client-2"));
        assert!(found.client_secret.is_none());
        assert!(found.vanity_domain.is_none());
        assert!(found.customer_id.is_none());
    }

    #[tokio::test]
    async fn list_is_ordered_by_name() {
        let repo = repository().await;
        repo.upsert(TenantCredential::named("zeta")).await.unwrap();
        repo.upsert(TenantCredential::named("acme")).await.unwrap();

        let names: Vec<String> =
            repo.list().await.unwrap().into_iter().map(|record| record.name).collect();
        assert_eq!(names, vec!["acme".to_string(), "zeta".to_string()]);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_existed() {
        let repo = repository().await;
        repo.upsert(acme()).await.unwrap();
        assert!(repo.delete("acme").await.unwrap());
        assert!(!repo.delete("acme").await.unwrap());
        assert!(repo.find_by_name("acme").await.unwrap().is_none());
    }
}
