//! SQLite schema definitions for the todo database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

// =============================================================================
// Version 1 - Users and todos
// =============================================================================

const USERS_TABLE_V1: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("username", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("email", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
};

const TODOS_TABLE_V1: Table = Table {
    name: "todos",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "users",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text),
        // YYYY-MM-DD
        sqlite_column!("due_date", &SqlType::Text),
        sqlite_column!(
            "priority",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'low'")
        ),
        sqlite_column!(
            "completed",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_todos_user_id", "user_id")],
};

// =============================================================================
// Version 2 - Reminder fields
// =============================================================================

const TODOS_TABLE_V2: Table = Table {
    name: "todos",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "users",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!("due_date", &SqlType::Text),
        sqlite_column!(
            "priority",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'low'")
        ),
        sqlite_column!(
            "completed",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "reminder",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        // HH:MM, 24-hour clock
        sqlite_column!("reminder_time", &SqlType::Text),
    ],
    indices: &[
        ("idx_todos_user_id", "user_id"),
        ("idx_todos_due_reminder", "due_date, reminder"),
    ],
};

/// Migration from version 1 to version 2: add reminder columns
fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute(
        "ALTER TABLE todos ADD COLUMN reminder INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    conn.execute("ALTER TABLE todos ADD COLUMN reminder_time TEXT", [])?;
    conn.execute(
        "CREATE INDEX idx_todos_due_reminder ON todos(due_date, reminder)",
        [],
    )?;
    Ok(())
}

pub const TODO_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[USERS_TABLE_V1, TODOS_TABLE_V1],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[USERS_TABLE_V1, TODOS_TABLE_V2],
        migration: Some(migrate_v1_to_v2),
    },
];
