use crate::dialect::Credentials;
use sqlx::PgPool;
use testcontainers::{
    GenericImage, ImageExt,
    core::{ContainerAsync, WaitFor},
    runners::AsyncRunner,
};

const USER: &str = "ingestkit";
const PASSWORD: &str = "ingestkit_test";
const DATABASE: &str = "ingestkit_test";

/// Test database container and pool wrapper
pub struct TestDb {
    pub pool: PgPool,
    port: u16,
    _container: ContainerAsync<GenericImage>,
}

impl TestDb {
    /// Start a new postgres container and connection pool
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let image = GenericImage::new("postgres", "16")
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_USER", USER)
            .with_env_var("POSTGRES_PASSWORD", PASSWORD)
            .with_env_var("POSTGRES_DB", DATABASE);

        let container = image.start().await?;
        let port = container.get_host_port_ipv4(5432).await?;

        let database_url = format!(
            "postgres://{}:{}@127.0.0.1:{}/{}",
            USER, PASSWORD, port, DATABASE
        );

        // Wait for the connection
        let mut attempts = 0;
        let pool = loop {
            match PgPool::connect(&database_url).await {
                Ok(p) => break p,
                Err(_) if attempts < 30 => {
                    attempts += 1;
                    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                }
                Err(e) => return Err(Box::new(e)),
            }
        };

        Ok(TestDb {
            pool,
            port,
            _container: container,
        })
    }

    /// Credentials a `DatabaseSource` can use to reach this database
    pub fn credentials(&self) -> Credentials {
        Credentials::new(USER, PASSWORD, "127.0.0.1", Some(self.port), DATABASE)
    }

    /// Cleanup all test tables
    pub async fn cleanup(&self) -> Result<(), sqlx::Error> {
        crate::fixtures::cleanup(&self.pool).await
    }
}
