//! Database module for SQLite persistence.
//!
//! Configuration and content rows are owned by the administration side of the
//! platform; this service reads them and only writes submissions, tips and
//! notification state.

mod notifications;
mod repository;
mod submissions;

pub use repository::*;
pub use submissions::SubmissionRecord;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    // Node configuration
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS node (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            name TEXT NOT NULL DEFAULT '',
            public_site TEXT NOT NULL DEFAULT '',
            hidden_service TEXT NOT NULL DEFAULT '',
            tb_download_link TEXT NOT NULL DEFAULT 'https://www.torproject.org/download/',
            default_language TEXT NOT NULL DEFAULT 'en',
            maximum_namesize INTEGER NOT NULL DEFAULT 128,
            maximum_textsize INTEGER NOT NULL DEFAULT 4096,
            maximum_filesize INTEGER NOT NULL DEFAULT 30,
            submission_minimum_delay INTEGER NOT NULL DEFAULT 10,
            submission_maximum_ttl INTEGER NOT NULL DEFAULT 10800,
            allow_indexing INTEGER NOT NULL DEFAULT 0,
            ahmia INTEGER NOT NULL DEFAULT 0,
            simplified_login INTEGER NOT NULL DEFAULT 0,
            tor2web_unauth INTEGER NOT NULL DEFAULT 1,
            enable_custom_privacy_badge INTEGER NOT NULL DEFAULT 0,
            wizard_done INTEGER NOT NULL DEFAULT 0
        );

        INSERT OR IGNORE INTO node (id) VALUES (1);

        CREATE TABLE IF NOT EXISTS config_l10n (
            lang TEXT NOT NULL,
            var_group TEXT NOT NULL,
            var_name TEXT NOT NULL,
            value TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (lang, var_group, var_name)
        );

        CREATE TABLE IF NOT EXISTS enabled_languages (
            name TEXT PRIMARY KEY
        );

        INSERT OR IGNORE INTO enabled_languages (name) VALUES ('en');

        CREATE TABLE IF NOT EXISTS files (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL DEFAULT ''
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Users and receivers
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            public_name TEXT NOT NULL DEFAULT '',
            state TEXT NOT NULL DEFAULT 'enabled',
            language TEXT NOT NULL DEFAULT 'en',
            mail_address TEXT NOT NULL DEFAULT '',
            picture_id TEXT REFERENCES files(id) ON DELETE SET NULL,
            description TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS receivers (
            id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            configuration TEXT NOT NULL DEFAULT 'default',
            presentation_order INTEGER NOT NULL DEFAULT 0,
            tip_notification INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Questionnaires
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questionnaires (
            id TEXT PRIMARY KEY,
            key TEXT NOT NULL DEFAULT '',
            editable INTEGER NOT NULL DEFAULT 1,
            name TEXT NOT NULL DEFAULT '',
            show_steps_navigation_bar INTEGER NOT NULL DEFAULT 0,
            steps_navigation_requires_completion INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS steps (
            id TEXT PRIMARY KEY,
            questionnaire_id TEXT NOT NULL REFERENCES questionnaires(id) ON DELETE CASCADE,
            presentation_order INTEGER NOT NULL DEFAULT 0,
            triggered_by_score INTEGER NOT NULL DEFAULT 0,
            label TEXT NOT NULL DEFAULT '{}',
            description TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS fields (
            id TEXT PRIMARY KEY,
            key TEXT NOT NULL DEFAULT '',
            instance TEXT NOT NULL DEFAULT 'instance',
            editable INTEGER NOT NULL DEFAULT 1,
            type TEXT NOT NULL DEFAULT 'inputbox',
            template_id TEXT REFERENCES fields(id) ON DELETE CASCADE,
            step_id TEXT REFERENCES steps(id) ON DELETE CASCADE,
            fieldgroup_id TEXT REFERENCES fields(id) ON DELETE CASCADE,
            multi_entry INTEGER NOT NULL DEFAULT 0,
            required INTEGER NOT NULL DEFAULT 0,
            preview INTEGER NOT NULL DEFAULT 0,
            stats_enabled INTEGER NOT NULL DEFAULT 0,
            x INTEGER NOT NULL DEFAULT 0,
            y INTEGER NOT NULL DEFAULT 0,
            width INTEGER NOT NULL DEFAULT 0,
            triggered_by_score INTEGER NOT NULL DEFAULT 0,
            label TEXT NOT NULL DEFAULT '{}',
            description TEXT NOT NULL DEFAULT '{}',
            hint TEXT NOT NULL DEFAULT '{}',
            multi_entry_hint TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS field_attrs (
            id TEXT PRIMARY KEY,
            field_id TEXT NOT NULL REFERENCES fields(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            value TEXT NOT NULL DEFAULT '',
            UNIQUE (field_id, name)
        );

        CREATE TABLE IF NOT EXISTS field_options (
            id TEXT PRIMARY KEY,
            field_id TEXT NOT NULL REFERENCES fields(id) ON DELETE CASCADE,
            presentation_order INTEGER NOT NULL DEFAULT 0,
            score_points INTEGER NOT NULL DEFAULT 0,
            trigger_field TEXT REFERENCES fields(id) ON DELETE SET NULL,
            trigger_step TEXT REFERENCES steps(id) ON DELETE SET NULL,
            label TEXT NOT NULL DEFAULT '{}'
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Contexts
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contexts (
            id TEXT PRIMARY KEY,
            questionnaire_id TEXT NOT NULL REFERENCES questionnaires(id),
            picture_id TEXT REFERENCES files(id) ON DELETE SET NULL,
            presentation_order INTEGER NOT NULL DEFAULT 0,
            tip_timetolive INTEGER NOT NULL DEFAULT 15,
            select_all_receivers INTEGER NOT NULL DEFAULT 0,
            maximum_selectable_receivers INTEGER NOT NULL DEFAULT 0,
            show_context INTEGER NOT NULL DEFAULT 1,
            show_recipients_details INTEGER NOT NULL DEFAULT 0,
            allow_recipients_selection INTEGER NOT NULL DEFAULT 0,
            show_small_receiver_cards INTEGER NOT NULL DEFAULT 0,
            enable_comments INTEGER NOT NULL DEFAULT 1,
            enable_messages INTEGER NOT NULL DEFAULT 0,
            enable_two_way_comments INTEGER NOT NULL DEFAULT 1,
            enable_two_way_messages INTEGER NOT NULL DEFAULT 1,
            enable_attachments INTEGER NOT NULL DEFAULT 1,
            show_receivers_in_alphabetical_order INTEGER NOT NULL DEFAULT 0,
            name TEXT NOT NULL DEFAULT '{}',
            description TEXT NOT NULL DEFAULT '{}',
            recipients_clarification TEXT NOT NULL DEFAULT '{}',
            status_page_message TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS receiver_contexts (
            receiver_id TEXT NOT NULL REFERENCES receivers(id) ON DELETE CASCADE,
            context_id TEXT NOT NULL REFERENCES contexts(id) ON DELETE CASCADE,
            presentation_order INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (receiver_id, context_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Submissions, tips and notifications
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS internal_tips (
            id TEXT PRIMARY KEY,
            context_id TEXT NOT NULL REFERENCES contexts(id),
            progressive INTEGER NOT NULL UNIQUE,
            answers TEXT NOT NULL DEFAULT '{}',
            finalized INTEGER NOT NULL DEFAULT 0,
            creation_date TEXT NOT NULL,
            expiration_date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS internal_tip_receivers (
            internal_tip_id TEXT NOT NULL REFERENCES internal_tips(id) ON DELETE CASCADE,
            receiver_id TEXT NOT NULL REFERENCES receivers(id) ON DELETE CASCADE,
            PRIMARY KEY (internal_tip_id, receiver_id)
        );

        CREATE TABLE IF NOT EXISTS receiver_tips (
            id TEXT PRIMARY KEY,
            internal_tip_id TEXT NOT NULL REFERENCES internal_tips(id) ON DELETE CASCADE,
            receiver_id TEXT NOT NULL REFERENCES receivers(id) ON DELETE CASCADE,
            creation_date TEXT NOT NULL,
            new INTEGER NOT NULL DEFAULT 1,
            UNIQUE (internal_tip_id, receiver_id)
        );

        CREATE TABLE IF NOT EXISTS event_logs (
            id TEXT PRIMARY KEY,
            receiver_tip_id TEXT NOT NULL REFERENCES receiver_tips(id) ON DELETE CASCADE,
            receiver_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            creation_date TEXT NOT NULL,
            mail_sent INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS mails (
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL,
            source TEXT NOT NULL,
            address TEXT NOT NULL,
            subject TEXT NOT NULL,
            body TEXT NOT NULL,
            creation_date TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_steps_questionnaire ON steps(questionnaire_id);
        CREATE INDEX IF NOT EXISTS idx_fields_step ON fields(step_id);
        CREATE INDEX IF NOT EXISTS idx_fields_fieldgroup ON fields(fieldgroup_id);
        CREATE INDEX IF NOT EXISTS idx_field_options_field ON field_options(field_id);
        CREATE INDEX IF NOT EXISTS idx_receiver_tips_new ON receiver_tips(new);
        CREATE INDEX IF NOT EXISTS idx_event_logs_mail_sent ON event_logs(mail_sent);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
