//! SQLite schema for the service's own state database.
//!
//! Holds background job runs and schedules, and the reminder log that backs
//! duplicate-send suppression.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Job runs and schedules
// =============================================================================

/// Job runs table - stores history of background job executions
const JOB_RUNS_TABLE_V1: Table = Table {
    name: "job_runs",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("job_id", &SqlType::Text, non_null = true),
        sqlite_column!("started_at", &SqlType::Text, non_null = true),
        sqlite_column!("finished_at", &SqlType::Text),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("error_message", &SqlType::Text),
        sqlite_column!("triggered_by", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_job_runs_job_id_started", "job_id, started_at DESC"),
        ("idx_job_runs_status", "status"),
    ],
    unique_constraints: &[],
};

/// Job schedules table - stores next run times for scheduled jobs
const JOB_SCHEDULES_TABLE_V1: Table = Table {
    name: "job_schedules",
    columns: &[
        sqlite_column!("job_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("next_run_at", &SqlType::Text, non_null = true),
        sqlite_column!("last_run_at", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};

// =============================================================================
// Version 2 - Reminder log
// =============================================================================

/// Reminder log - one row per cart token, recording the last reminder sent.
const REMINDER_LOG_TABLE_V2: Table = Table {
    name: "reminder_log",
    columns: &[
        sqlite_column!("cart_token", &SqlType::Text, is_primary_key = true),
        sqlite_column!("email", &SqlType::Text, non_null = true),
        sqlite_column!("last_reminded_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_reminder_log_email", "email")],
    unique_constraints: &[],
};

/// Migration from version 1 to version 2: add the reminder_log table.
fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE reminder_log (
            cart_token TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            last_reminded_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX idx_reminder_log_email ON reminder_log(email)",
        [],
    )?;
    Ok(())
}

pub const SERVER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[JOB_RUNS_TABLE_V1, JOB_SCHEDULES_TABLE_V1],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            JOB_RUNS_TABLE_V1,
            JOB_SCHEDULES_TABLE_V1,
            REMINDER_LOG_TABLE_V2,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];
