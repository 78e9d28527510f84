//! Durable row types for the `users` and `user_files` tables.

use sqlx::FromRow;

/// A durable user row. `password` is an Argon2 PHC string, never plaintext.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    #[sqlx(rename = "user_name")]
    pub name: String,
    #[sqlx(rename = "user_password")]
    pub password: String,
    #[sqlx(rename = "user_ip")]
    pub ip: String,
    #[sqlx(rename = "user_port")]
    pub port: i32,
}

/// A durable registered-file row.
#[derive(Debug, Clone, FromRow)]
pub struct UserFile {
    pub file_id: i64,
    pub file_name: String,
    pub file_type: String,
    pub file_path: String,
    pub file_size: i64,
    pub user_name: String,
}

/// A row surfaced by `search_files`, already joined against the owner's
/// current network address for the host-lookup use case.
#[derive(Debug, Clone, FromRow)]
pub struct FileWithOwner {
    pub file_id: i64,
    pub file_name: String,
    pub file_type: String,
    pub file_path: String,
    pub file_size: i64,
    pub owner_name: String,
    pub owner_ip: String,
    pub owner_port: i32,
}
