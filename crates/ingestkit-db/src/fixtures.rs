use serde_json::json;
use sqlx::PgPool;

/// Create a users table with one column per supported type
pub async fn create_users(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            email VARCHAR(255),
            age INTEGER,
            score DOUBLE PRECISION,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            profile JSONB,
            balance NUMERIC(12, 2),
            signup_date DATE,
            last_login TIMESTAMPTZ,
            external_id UUID
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 20 rows, every 5th user has no email and is inactive
    for i in 0..20i64 {
        let email = (i % 5 != 0).then(|| format!("user{}@example.com", i));
        let profile = json!({
            "country": if i % 2 == 0 { "NL" } else { "US" },
            "tags": ["verified"]
        });

        // user i signed up i days after 2024-01-01, last logged in i hours after midnight,
        // external_id is md5('user-i') read as a uuid
        sqlx::query(
            r#"
            INSERT INTO users (name, email, age, score, active, profile,
                               balance, signup_date, last_login, external_id)
            VALUES ($1, $2, $3, $4, $5, $6,
                    $7::numeric(12, 2),
                    DATE '2024-01-01' + $8,
                    TIMESTAMPTZ '2024-01-01 00:00:00+00' + make_interval(hours => $8),
                    md5('user-' || $8::text)::uuid)
            "#,
        )
        .bind(format!("User {}", i))
        .bind(email)
        .bind(20 + (i % 40) as i32)
        .bind(i as f64 * 1.5)
        .bind(i % 5 != 0)
        .bind(profile)
        .bind(format!("{}.{:02}", i * 100, i))
        .bind(i as i32)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Create an events table with a small fixed set of rows
pub async fn create_events(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id SERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL,
            kind TEXT NOT NULL,
            payload JSON
        )
        "#,
    )
    .execute(pool)
    .await?;

    for (user_id, kind) in [(1i64, "login"), (1, "logout"), (2, "login")] {
        sqlx::query("INSERT INTO events (user_id, kind, payload) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(kind)
            .bind(json!({ "source": "web" }))
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Clean up all test tables
pub async fn cleanup(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("DROP TABLE IF EXISTS users")
        .execute(pool)
        .await?;
    sqlx::query("DROP TABLE IF EXISTS events")
        .execute(pool)
        .await?;
    Ok(())
}
