use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::error;

use mini_notion_common::account::{Account, Email, OwnerSummary};
use mini_notion_common::note::{Note, NoteFilters, NoteStatus, NoteWithMeta, Section, SectionWithField};
use mini_notion_common::template::{Field, NewField, Template, TemplateFilters, TemplateWithUsage};

use crate::errors::NotionResult;

/// Async-safe handle to the notes database.
///
/// Wraps `NotionDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O
/// never ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<NotionDb>>,
}

impl DbHandle {
    pub fn new(db: NotionDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    ///
    /// A closure that panicked mid-transaction has already been rolled back
    /// when its `Transaction` dropped, so a poisoned lock is recovered.
    pub async fn call<F, R>(&self, f: F) -> NotionResult<R>
    where
        F: FnOnce(&NotionDb) -> NotionResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().unwrap_or_else(|poisoned| {
                error!("Database lock poisoned by a panicked task, recovering");
                db.clear_poison();
                poisoned.into_inner()
            });
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

/// Current time as an RFC 3339 UTC timestamp with millisecond precision.
/// Stored timestamps sort lexicographically in time order.
pub fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub struct NotionDb {
    conn: Connection,
}

impl NotionDb {
    /// Open (or create) a SQLite database at the given path and create the schema.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.register_functions()
            .context("Failed to register SQL functions")?;
        self.create_schema().context("Failed to create schema")?;
        Ok(())
    }

    /// `fold_case(text)`: Unicode lowercase, matching how search terms are
    /// folded. SQLite's own `LOWER()` only folds ASCII.
    fn register_functions(&self) -> Result<()> {
        self.conn.create_scalar_function(
            "fold_case",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let text: Option<String> = ctx.get(0)?;
                Ok(text.map(|t| t.to_lowercase()))
            },
        )?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS accounts (
                    id TEXT PRIMARY KEY,
                    email TEXT NOT NULL UNIQUE,
                    first_name TEXT NOT NULL DEFAULT '',
                    last_name TEXT NOT NULL DEFAULT '',
                    provider TEXT NOT NULL,
                    provider_account_id TEXT NOT NULL,
                    thumbnail TEXT,
                    last_login_at TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS templates (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    owner_id TEXT NOT NULL REFERENCES accounts(id),
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS template_fields (
                    id TEXT PRIMARY KEY,
                    template_id TEXT NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
                    label TEXT NOT NULL,
                    sort_order INTEGER NOT NULL CHECK (sort_order > 0),
                    is_required INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS notes (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    template_id TEXT NOT NULL REFERENCES templates(id) ON DELETE RESTRICT,
                    owner_id TEXT NOT NULL REFERENCES accounts(id),
                    status TEXT NOT NULL DEFAULT 'Draft' CHECK (status IN ('Draft', 'Publish')),
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS note_sections (
                    id TEXT PRIMARY KEY,
                    note_id TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
                    field_id TEXT NOT NULL REFERENCES template_fields(id) ON DELETE RESTRICT,
                    content TEXT NOT NULL DEFAULT '',
                    UNIQUE(note_id, field_id)
                );

                CREATE INDEX IF NOT EXISTS idx_templates_owner ON templates(owner_id);
                CREATE INDEX IF NOT EXISTS idx_fields_template ON template_fields(template_id);
                CREATE INDEX IF NOT EXISTS idx_notes_template ON notes(template_id);
                CREATE INDEX IF NOT EXISTS idx_notes_owner ON notes(owner_id);
                CREATE INDEX IF NOT EXISTS idx_sections_note ON note_sections(note_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    /// Run `f` inside a transaction. Any error rolls back everything `f` wrote.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<anyhow::Error>,
    {
        // unchecked_transaction is fine here: DbHandle's Mutex already
        // serializes access to the connection.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let value = f(self)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    // ── Accounts ──────────────────────────────────────────────────────

    pub fn insert_account(&self, account: &Account) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO accounts (id, email, first_name, last_name, provider, provider_account_id, thumbnail, last_login_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    account.id,
                    account.email.as_str(),
                    account.first_name,
                    account.last_name,
                    account.provider,
                    account.provider_account_id,
                    account.thumbnail,
                    account.last_login_at,
                    account.created_at,
                    account.updated_at,
                ],
            )
            .context("Failed to insert account")?;
        Ok(())
    }

    pub fn update_account(&self, account: &Account) -> Result<()> {
        self.conn
            .execute(
                "UPDATE accounts SET email = ?1, first_name = ?2, last_name = ?3, provider = ?4,
                     provider_account_id = ?5, thumbnail = ?6, last_login_at = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    account.email.as_str(),
                    account.first_name,
                    account.last_name,
                    account.provider,
                    account.provider_account_id,
                    account.thumbnail,
                    account.last_login_at,
                    account.updated_at,
                    account.id,
                ],
            )
            .context("Failed to update account")?;
        Ok(())
    }

    pub fn get_account(&self, id: &str) -> Result<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id], account_row)
            .optional()
            .context("Failed to query account")?;
        row.map(AccountRow::into_account).transpose()
    }

    pub fn get_account_by_email(&self, email: &Email) -> Result<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts WHERE email = ?1", ACCOUNT_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![email.as_str()], account_row)
            .optional()
            .context("Failed to query account by email")?;
        row.map(AccountRow::into_account).transpose()
    }

    // ── Templates ─────────────────────────────────────────────────────

    /// Insert a template and its fields. Returns the new template id.
    pub fn create_template(&self, name: &str, owner_id: &str, fields: &[NewField]) -> Result<String> {
        let id = new_id();
        let ts = now();
        self.conn
            .execute(
                "INSERT INTO templates (id, name, owner_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id, name, owner_id, ts],
            )
            .context("Failed to insert template")?;
        for field in fields {
            self.insert_field(&id, field)?;
        }
        Ok(id)
    }

    pub fn insert_field(&self, template_id: &str, field: &NewField) -> Result<String> {
        let id = new_id();
        self.conn
            .execute(
                "INSERT INTO template_fields (id, template_id, label, sort_order, is_required) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, template_id, field.label, field.order, field.is_required],
            )
            .context("Failed to insert template field")?;
        Ok(id)
    }

    pub fn update_field(&self, field: &Field) -> Result<()> {
        self.conn
            .execute(
                "UPDATE template_fields SET label = ?1, sort_order = ?2, is_required = ?3 WHERE id = ?4",
                params![field.label, field.order, field.is_required, field.id],
            )
            .context("Failed to update template field")?;
        Ok(())
    }

    pub fn delete_field(&self, field_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM template_fields WHERE id = ?1", params![field_id])
            .context("Failed to delete template field")?;
        Ok(())
    }

    pub fn rename_template(&self, id: &str, name: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE templates SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, now(), id],
            )
            .context("Failed to update template")?;
        Ok(())
    }

    pub fn template_fields(&self, template_id: &str) -> Result<Vec<Field>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, label, sort_order, is_required FROM template_fields
                 WHERE template_id = ?1 ORDER BY sort_order",
            )
            .context("Failed to prepare template_fields")?;
        let rows = stmt
            .query_map(params![template_id], |row| {
                Ok(Field {
                    id: row.get(0)?,
                    label: row.get(1)?,
                    order: row.get(2)?,
                    is_required: row.get(3)?,
                })
            })
            .context("Failed to query template fields")?;
        let mut fields = Vec::new();
        for row in rows {
            fields.push(row.context("Failed to read template field row")?);
        }
        Ok(fields)
    }

    pub fn get_template(&self, id: &str) -> Result<Option<TemplateWithUsage>> {
        let sql = format!("{} WHERE t.id = ?1", TEMPLATE_SELECT);
        let row = self
            .conn
            .query_row(&sql, params![id], template_row)
            .optional()
            .context("Failed to query template")?;
        match row {
            Some(r) => {
                let fields = self.template_fields(&r.id)?;
                Ok(Some(r.into_template(fields)))
            }
            None => Ok(None),
        }
    }

    pub fn list_templates(&self, filters: &TemplateFilters) -> Result<Vec<TemplateWithUsage>> {
        let mut sql = format!("{} WHERE 1 = 1", TEMPLATE_SELECT);
        let mut args: Vec<String> = Vec::new();
        if let Some(q) = non_blank(filters.query.as_deref()) {
            args.push(like_pattern(q));
            sql.push_str(&format!(" AND fold_case(t.name) LIKE ?{} ESCAPE '\\'", args.len()));
        }
        if let Some(owner_id) = non_blank(filters.owner_id.as_deref()) {
            args.push(owner_id.to_string());
            sql.push_str(&format!(" AND t.owner_id = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY t.updated_at DESC, t.rowid DESC");

        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_templates")?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), template_row)
            .context("Failed to query templates")?;
        let mut templates = Vec::new();
        for row in rows {
            let r = row.context("Failed to read template row")?;
            let fields = self.template_fields(&r.id)?;
            templates.push(r.into_template(fields));
        }
        Ok(templates)
    }

    pub fn delete_template(&self, id: &str) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM templates WHERE id = ?1", params![id])
            .context("Failed to delete template")?;
        Ok(count > 0)
    }

    // ── Notes ─────────────────────────────────────────────────────────

    /// Insert a draft note with one section per entry. Returns the note id.
    pub fn create_note(
        &self,
        title: &str,
        template_id: &str,
        owner_id: &str,
        sections: &[Section],
    ) -> Result<String> {
        let id = new_id();
        let ts = now();
        self.conn
            .execute(
                "INSERT INTO notes (id, title, template_id, owner_id, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![id, title, template_id, owner_id, NoteStatus::Draft.as_str(), ts],
            )
            .context("Failed to insert note")?;
        for section in sections {
            self.conn
                .execute(
                    "INSERT INTO note_sections (id, note_id, field_id, content) VALUES (?1, ?2, ?3, ?4)",
                    params![new_id(), id, section.field_id, section.content],
                )
                .context("Failed to insert note section")?;
        }
        Ok(id)
    }

    pub fn update_note_title(&self, id: &str, title: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE notes SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, now(), id],
            )
            .context("Failed to update note title")?;
        Ok(())
    }

    pub fn update_section_content(&self, note_id: &str, section_id: &str, content: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE note_sections SET content = ?1 WHERE id = ?2 AND note_id = ?3",
                params![content, section_id, note_id],
            )
            .context("Failed to update note section")?;
        Ok(())
    }

    pub fn set_note_status(&self, id: &str, status: NoteStatus) -> Result<()> {
        self.conn
            .execute(
                "UPDATE notes SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now(), id],
            )
            .context("Failed to update note status")?;
        Ok(())
    }

    pub fn note_sections(&self, note_id: &str) -> Result<Vec<SectionWithField>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT s.id, s.field_id, f.label, f.sort_order, s.content, f.is_required
                 FROM note_sections s JOIN template_fields f ON f.id = s.field_id
                 WHERE s.note_id = ?1 ORDER BY f.sort_order",
            )
            .context("Failed to prepare note_sections")?;
        let rows = stmt
            .query_map(params![note_id], |row| {
                Ok(SectionWithField {
                    id: row.get(0)?,
                    field_id: row.get(1)?,
                    field_label: row.get(2)?,
                    field_order: row.get(3)?,
                    content: row.get(4)?,
                    is_required: row.get(5)?,
                })
            })
            .context("Failed to query note sections")?;
        let mut sections = Vec::new();
        for row in rows {
            sections.push(row.context("Failed to read note section row")?);
        }
        Ok(sections)
    }

    pub fn get_note(&self, id: &str) -> Result<Option<NoteWithMeta>> {
        let sql = format!("{} WHERE n.id = ?1", NOTE_SELECT);
        let row = self
            .conn
            .query_row(&sql, params![id], note_row)
            .optional()
            .context("Failed to query note")?;
        match row {
            Some(r) => {
                let sections = self.note_sections(&r.id)?;
                Ok(Some(r.into_note(sections)?))
            }
            None => Ok(None),
        }
    }

    pub fn list_notes(&self, filters: &NoteFilters) -> Result<Vec<NoteWithMeta>> {
        let mut sql = format!("{} WHERE 1 = 1", NOTE_SELECT);
        let mut args: Vec<String> = Vec::new();
        if let Some(status) = filters.status {
            args.push(status.as_str().to_string());
            sql.push_str(&format!(" AND n.status = ?{}", args.len()));
        }
        if let Some(template_id) = non_blank(filters.template_id.as_deref()) {
            args.push(template_id.to_string());
            sql.push_str(&format!(" AND n.template_id = ?{}", args.len()));
        }
        if let Some(owner_id) = non_blank(filters.owner_id.as_deref()) {
            args.push(owner_id.to_string());
            sql.push_str(&format!(" AND n.owner_id = ?{}", args.len()));
        }
        if let Some(q) = non_blank(filters.query.as_deref()) {
            args.push(like_pattern(q));
            sql.push_str(&format!(" AND fold_case(n.title) LIKE ?{} ESCAPE '\\'", args.len()));
        }
        sql.push_str(" ORDER BY n.updated_at DESC, n.rowid DESC");

        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_notes")?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), note_row)
            .context("Failed to query notes")?;
        let mut notes = Vec::new();
        for row in rows {
            let r = row.context("Failed to read note row")?;
            let sections = self.note_sections(&r.id)?;
            notes.push(r.into_note(sections)?);
        }
        Ok(notes)
    }

    pub fn delete_note(&self, id: &str) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1", params![id])
            .context("Failed to delete note")?;
        Ok(count > 0)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Case-folded substring pattern with `%`, `_` and `\` taken literally.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::from("%");
    for c in query.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// ── Row mapping ───────────────────────────────────────────────────────

const ACCOUNT_COLUMNS: &str = "id, email, first_name, last_name, provider, provider_account_id, thumbnail, last_login_at, created_at, updated_at";

const TEMPLATE_SELECT: &str = "SELECT t.id, t.name, t.owner_id, t.updated_at,
        a.first_name, a.last_name, a.thumbnail,
        EXISTS(SELECT 1 FROM notes n WHERE n.template_id = t.id)
    FROM templates t JOIN accounts a ON a.id = t.owner_id";

const NOTE_SELECT: &str = "SELECT n.id, n.title, n.template_id, n.owner_id, n.status, n.created_at, n.updated_at,
        t.name, a.first_name, a.last_name, a.thumbnail
    FROM notes n
    JOIN templates t ON t.id = n.template_id
    JOIN accounts a ON a.id = n.owner_id";

/// Intermediate row struct for accounts.
struct AccountRow {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    provider: String,
    provider_account_id: String,
    thumbnail: Option<String>,
    last_login_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn account_row(row: &Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        provider: row.get(4)?,
        provider_account_id: row.get(5)?,
        thumbnail: row.get(6)?,
        last_login_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl AccountRow {
    fn into_account(self) -> Result<Account> {
        let email =
            Email::parse(&self.email).context("Failed to parse stored account email")?;
        Ok(Account {
            id: self.id,
            email,
            first_name: self.first_name,
            last_name: self.last_name,
            provider: self.provider,
            provider_account_id: self.provider_account_id,
            thumbnail: self.thumbnail,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Intermediate row struct for templates joined with their owner.
struct TemplateRow {
    id: String,
    name: String,
    owner_id: String,
    updated_at: String,
    owner_first_name: String,
    owner_last_name: String,
    owner_thumbnail: Option<String>,
    is_used: bool,
}

fn template_row(row: &Row<'_>) -> rusqlite::Result<TemplateRow> {
    Ok(TemplateRow {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        updated_at: row.get(3)?,
        owner_first_name: row.get(4)?,
        owner_last_name: row.get(5)?,
        owner_thumbnail: row.get(6)?,
        is_used: row.get(7)?,
    })
}

impl TemplateRow {
    fn into_template(self, fields: Vec<Field>) -> TemplateWithUsage {
        let owner = OwnerSummary {
            id: self.owner_id.clone(),
            first_name: self.owner_first_name,
            last_name: self.owner_last_name,
            thumbnail: self.owner_thumbnail,
        };
        TemplateWithUsage {
            template: Template {
                id: self.id,
                name: self.name,
                owner_id: self.owner_id,
                fields,
                updated_at: self.updated_at,
            },
            owner,
            is_used: self.is_used,
        }
    }
}

/// Intermediate row struct for notes joined with template and owner.
struct NoteRow {
    id: String,
    title: String,
    template_id: String,
    owner_id: String,
    status: String,
    created_at: String,
    updated_at: String,
    template_name: String,
    owner_first_name: String,
    owner_last_name: String,
    owner_thumbnail: Option<String>,
}

fn note_row(row: &Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get(0)?,
        title: row.get(1)?,
        template_id: row.get(2)?,
        owner_id: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        template_name: row.get(7)?,
        owner_first_name: row.get(8)?,
        owner_last_name: row.get(9)?,
        owner_thumbnail: row.get(10)?,
    })
}

impl NoteRow {
    fn into_note(self, sections: Vec<SectionWithField>) -> Result<NoteWithMeta> {
        let status = NoteStatus::from_str(&self.status).context("Failed to parse note status")?;
        let owner = OwnerSummary {
            id: self.owner_id.clone(),
            first_name: self.owner_first_name,
            last_name: self.owner_last_name,
            thumbnail: self.owner_thumbnail,
        };
        Ok(NoteWithMeta {
            note: Note {
                id: self.id,
                title: self.title,
                template_id: self.template_id,
                owner_id: self.owner_id,
                status,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            template_name: self.template_name,
            owner,
            sections,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
