//! Database repository for the public projections.
//!
//! Every projection is loaded inside one read transaction so a response is
//! built from a consistent snapshot.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::l10n::LocalizedText;
use crate::models::{
    ContextRow, ContextSettings, FieldAttrRow, FieldOptionRow, FieldRow, NodeSettings,
    NodeSnapshot, PublicSnapshot, QuestionnaireRow, ReceiverContextRow, ReceiverRow, StepRow,
    NODE_FILES,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current configuration revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Increment the revision ID and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&self.pool)
            .await?;
        self.get_revision_id().await
    }

    /// Get the node configuration row.
    pub async fn get_node_settings(&self) -> Result<NodeSettings, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_node_settings(&mut *conn).await
    }

    /// Get the enabled languages, sorted.
    pub async fn list_enabled_languages(&self) -> Result<Vec<String>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_enabled_languages(&mut *conn).await
    }

    /// Load what the node description and the ahmia descriptor need.
    pub async fn load_node_snapshot(&self) -> Result<NodeSnapshot, AppError> {
        let mut tx = self.pool.begin().await?;
        let snapshot = fetch_node_snapshot(&mut *tx).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    /// Load the whole public surface: node, contexts with their forms, receivers.
    pub async fn load_public_snapshot(&self) -> Result<PublicSnapshot, AppError> {
        let mut tx = self.pool.begin().await?;

        let node = fetch_node_snapshot(&mut *tx).await?;

        let contexts = sqlx::query(
            r#"SELECT id, questionnaire_id, picture_id, presentation_order, tip_timetolive,
                      select_all_receivers, maximum_selectable_receivers, show_context,
                      show_recipients_details, allow_recipients_selection,
                      show_small_receiver_cards, enable_comments, enable_messages,
                      enable_two_way_comments, enable_two_way_messages, enable_attachments,
                      show_receivers_in_alphabetical_order,
                      name, description, recipients_clarification, status_page_message
               FROM contexts ORDER BY presentation_order, id"#,
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(context_from_row)
        .collect();

        let receivers = sqlx::query(
            r#"SELECT r.id, r.configuration, r.presentation_order, r.tip_notification,
                      u.username, u.public_name, u.state, u.language, u.mail_address,
                      u.picture_id, u.description
               FROM receivers r JOIN users u ON u.id = r.id
               ORDER BY r.presentation_order, u.public_name"#,
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(receiver_from_row)
        .collect();

        let receiver_contexts = sqlx::query(
            r#"SELECT receiver_id, context_id, presentation_order
               FROM receiver_contexts ORDER BY presentation_order, receiver_id"#,
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| ReceiverContextRow {
            receiver_id: row.get("receiver_id"),
            context_id: row.get("context_id"),
            presentation_order: row.get("presentation_order"),
        })
        .collect();

        let questionnaires = sqlx::query(
            r#"SELECT id, key, editable, name, show_steps_navigation_bar,
                      steps_navigation_requires_completion
               FROM questionnaires ORDER BY id"#,
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| QuestionnaireRow {
            id: row.get("id"),
            key: row.get("key"),
            editable: flag(row, "editable"),
            name: row.get("name"),
            show_steps_navigation_bar: flag(row, "show_steps_navigation_bar"),
            steps_navigation_requires_completion: flag(row, "steps_navigation_requires_completion"),
        })
        .collect();

        let steps = sqlx::query(
            r#"SELECT id, questionnaire_id, presentation_order, triggered_by_score, label, description
               FROM steps ORDER BY questionnaire_id, presentation_order, id"#,
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| StepRow {
            id: row.get("id"),
            questionnaire_id: row.get("questionnaire_id"),
            presentation_order: row.get("presentation_order"),
            triggered_by_score: row.get("triggered_by_score"),
            label: localized(row, "label"),
            description: localized(row, "description"),
        })
        .collect();

        let fields = sqlx::query(
            r#"SELECT id, key, instance, editable, type, template_id, step_id, fieldgroup_id,
                      multi_entry, required, preview, stats_enabled, x, y, width,
                      triggered_by_score, label, description, hint, multi_entry_hint
               FROM fields ORDER BY y, x, id"#,
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(field_from_row)
        .collect();

        let attrs = sqlx::query(
            "SELECT id, field_id, name, type, value FROM field_attrs ORDER BY field_id, name",
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| FieldAttrRow {
            id: row.get("id"),
            field_id: row.get("field_id"),
            name: row.get("name"),
            attr_type: row.get("type"),
            value: row.get("value"),
        })
        .collect();

        let options = sqlx::query(
            r#"SELECT id, field_id, presentation_order, score_points, trigger_field, trigger_step, label
               FROM field_options ORDER BY presentation_order, id"#,
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| FieldOptionRow {
            id: row.get("id"),
            field_id: row.get("field_id"),
            presentation_order: row.get("presentation_order"),
            score_points: row.get("score_points"),
            trigger_field: row.get("trigger_field"),
            trigger_step: row.get("trigger_step"),
            label: localized(row, "label"),
        })
        .collect();

        let pictures: HashMap<String, String> = sqlx::query(
            r#"SELECT id, data FROM files
               WHERE id IN (SELECT picture_id FROM contexts WHERE picture_id IS NOT NULL
                            UNION
                            SELECT picture_id FROM users WHERE picture_id IS NOT NULL)"#,
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| (row.get("id"), row.get("data")))
        .collect();

        tx.commit().await?;

        Ok(PublicSnapshot {
            node,
            contexts,
            receivers,
            receiver_contexts,
            questionnaires,
            steps,
            fields,
            attrs,
            options,
            pictures,
        })
    }

    /// Get a receiver joined with its user account.
    pub async fn get_receiver(&self, id: &str) -> Result<Option<ReceiverRow>, AppError> {
        let row = sqlx::query(
            r#"SELECT r.id, r.configuration, r.presentation_order, r.tip_notification,
                      u.username, u.public_name, u.state, u.language, u.mail_address,
                      u.picture_id, u.description
               FROM receivers r JOIN users u ON u.id = r.id
               WHERE r.id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(receiver_from_row))
    }

    /// Get the localized name of a context.
    pub async fn get_context_name(&self, id: &str) -> Result<Option<LocalizedText>, AppError> {
        let row = sqlx::query("SELECT name FROM contexts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(|row| localized(row, "name")))
    }

    /// Get the per-language values of a configuration text group, keyed by variable name.
    pub async fn get_config_texts(
        &self,
        var_group: &str,
    ) -> Result<BTreeMap<String, LocalizedText>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_config_texts(&mut *conn, var_group).await
    }
}

async fn fetch_node_snapshot(conn: &mut SqliteConnection) -> Result<NodeSnapshot, AppError> {
    let settings = fetch_node_settings(conn).await?;
    let texts = fetch_config_texts(conn, "node").await?;
    let enabled_languages = fetch_enabled_languages(conn).await?;

    let mut files: HashMap<String, String> = HashMap::new();
    for file_id in NODE_FILES {
        let row = sqlx::query("SELECT data FROM files WHERE id = ?")
            .bind(file_id)
            .fetch_optional(&mut *conn)
            .await?;
        if let Some(row) = row {
            files.insert(file_id.to_string(), row.get("data"));
        }
    }

    let associations: i64 = sqlx::query("SELECT COUNT(*) AS n FROM receiver_contexts")
        .fetch_one(&mut *conn)
        .await?
        .get("n");

    Ok(NodeSnapshot {
        settings,
        texts,
        enabled_languages,
        files,
        configured: associations > 0,
    })
}

async fn fetch_node_settings(conn: &mut SqliteConnection) -> Result<NodeSettings, AppError> {
    let row = sqlx::query(
        r#"SELECT name, public_site, hidden_service, tb_download_link, default_language,
                  maximum_namesize, maximum_textsize, maximum_filesize,
                  submission_minimum_delay, submission_maximum_ttl, allow_indexing, ahmia,
                  simplified_login, tor2web_unauth, enable_custom_privacy_badge, wizard_done
           FROM node WHERE id = 1"#,
    )
    .fetch_one(&mut *conn)
    .await?;

    Ok(NodeSettings {
        name: row.get("name"),
        public_site: row.get("public_site"),
        hidden_service: row.get("hidden_service"),
        tb_download_link: row.get("tb_download_link"),
        default_language: row.get("default_language"),
        maximum_namesize: row.get("maximum_namesize"),
        maximum_textsize: row.get("maximum_textsize"),
        maximum_filesize: row.get("maximum_filesize"),
        submission_minimum_delay: row.get("submission_minimum_delay"),
        submission_maximum_ttl: row.get("submission_maximum_ttl"),
        allow_indexing: flag(&row, "allow_indexing"),
        ahmia: flag(&row, "ahmia"),
        simplified_login: flag(&row, "simplified_login"),
        tor2web_unauth: flag(&row, "tor2web_unauth"),
        enable_custom_privacy_badge: flag(&row, "enable_custom_privacy_badge"),
        wizard_done: flag(&row, "wizard_done"),
    })
}

async fn fetch_enabled_languages(conn: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
    let rows = sqlx::query("SELECT name FROM enabled_languages ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().map(|row| row.get("name")).collect())
}

async fn fetch_config_texts(
    conn: &mut SqliteConnection,
    var_group: &str,
) -> Result<BTreeMap<String, LocalizedText>, AppError> {
    let rows = sqlx::query("SELECT lang, var_name, value FROM config_l10n WHERE var_group = ?")
        .bind(var_group)
        .fetch_all(&mut *conn)
        .await?;

    let mut by_name: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for row in &rows {
        by_name
            .entry(row.get("var_name"))
            .or_default()
            .push((row.get("lang"), row.get("value")));
    }

    Ok(by_name
        .into_iter()
        .map(|(name, values)| (name, values.into_iter().collect::<LocalizedText>()))
        .collect())
}

// Helper functions for row conversion

fn flag(row: &SqliteRow, column: &str) -> bool {
    let value: i64 = row.get(column);
    value != 0
}

fn localized(row: &SqliteRow, column: &str) -> LocalizedText {
    let raw: Option<String> = row.get(column);
    LocalizedText::from_column(raw.as_deref())
}

fn context_from_row(row: &SqliteRow) -> ContextRow {
    ContextRow {
        id: row.get("id"),
        questionnaire_id: row.get("questionnaire_id"),
        picture_id: row.get("picture_id"),
        settings: ContextSettings {
            presentation_order: row.get("presentation_order"),
            tip_timetolive: row.get("tip_timetolive"),
            select_all_receivers: flag(row, "select_all_receivers"),
            maximum_selectable_receivers: row.get("maximum_selectable_receivers"),
            show_context: flag(row, "show_context"),
            show_recipients_details: flag(row, "show_recipients_details"),
            allow_recipients_selection: flag(row, "allow_recipients_selection"),
            show_small_receiver_cards: flag(row, "show_small_receiver_cards"),
            enable_comments: flag(row, "enable_comments"),
            enable_messages: flag(row, "enable_messages"),
            enable_two_way_comments: flag(row, "enable_two_way_comments"),
            enable_two_way_messages: flag(row, "enable_two_way_messages"),
            enable_attachments: flag(row, "enable_attachments"),
            show_receivers_in_alphabetical_order: flag(row, "show_receivers_in_alphabetical_order"),
        },
        name: localized(row, "name"),
        description: localized(row, "description"),
        recipients_clarification: localized(row, "recipients_clarification"),
        status_page_message: localized(row, "status_page_message"),
    }
}

pub(super) fn receiver_from_row(row: &SqliteRow) -> ReceiverRow {
    ReceiverRow {
        id: row.get("id"),
        configuration: row.get("configuration"),
        presentation_order: row.get("presentation_order"),
        tip_notification: flag(row, "tip_notification"),
        username: row.get("username"),
        public_name: row.get("public_name"),
        state: row.get("state"),
        language: row.get("language"),
        mail_address: row.get("mail_address"),
        picture_id: row.get("picture_id"),
        description: localized(row, "description"),
    }
}

fn field_from_row(row: &SqliteRow) -> FieldRow {
    FieldRow {
        id: row.get("id"),
        key: row.get("key"),
        instance: row.get("instance"),
        editable: flag(row, "editable"),
        field_type: row.get("type"),
        template_id: row.get("template_id"),
        step_id: row.get("step_id"),
        fieldgroup_id: row.get("fieldgroup_id"),
        multi_entry: flag(row, "multi_entry"),
        required: flag(row, "required"),
        preview: flag(row, "preview"),
        stats_enabled: flag(row, "stats_enabled"),
        x: row.get("x"),
        y: row.get("y"),
        width: row.get("width"),
        triggered_by_score: row.get("triggered_by_score"),
        label: localized(row, "label"),
        description: localized(row, "description"),
        hint: localized(row, "hint"),
        multi_entry_hint: localized(row, "multi_entry_hint"),
    }
}
