// src/db/fixtures.rs
//
// Sementes mínimas para os testes que rodam contra o Postgres
// (`#[sqlx::test]` cria um banco novo por teste e aplica as migrações).

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::UserRepository,
    models::auth::{Assignment, User},
};

pub async fn district(pool: &PgPool, number: i32) -> Uuid {
    sqlx::query_scalar::<_, Uuid>("INSERT INTO districts (name, district_number) VALUES ($1, $2) RETURNING id")
        .bind(format!("District {number}"))
        .bind(number)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn area(pool: &PgPool, district_id: Uuid) -> Uuid {
    sqlx::query_scalar::<_, Uuid>("INSERT INTO area_supervisors (name, district_id) VALUES ('Area 1', $1) RETURNING id")
        .bind(district_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn centre(pool: &PgPool, area_id: Uuid) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO cith_centres (name, area_supervisor_id) VALUES ('Centre 1', $1) RETURNING id",
    )
    .bind(area_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Usuário direto no banco, sem passar pela checagem de cadeiras.
pub async fn user(pool: &PgPool, assignment: Assignment) -> User {
    let email = format!("{}@church.org", Uuid::new_v4());
    UserRepository::new(pool.clone())
        .create_user(pool, "Test User", &email, "not-a-hash", None, assignment)
        .await
        .unwrap()
}
