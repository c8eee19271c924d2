use crate::error::Result;
use crate::models::*;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Mutex, MutexGuard};

pub struct Db {
    pub conn: Mutex<Connection>,
}

impl Db {
    pub fn new(path: &str) -> Self {
        let conn = Connection::open(path).expect("Failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .expect("Failed to set pragmas");
        let db = Db {
            conn: Mutex::new(conn),
        };
        db.migrate();
        db
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) {
        let conn = self.conn();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS clients (
                tenant_id TEXT NOT NULL,
                email TEXT NOT NULL,
                name TEXT,
                phone TEXT,
                company TEXT,
                status TEXT NOT NULL DEFAULT 'lead',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (tenant_id, email)
            );

            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                client_email TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                current_step INTEGER NOT NULL DEFAULT 1,
                status TEXT NOT NULL DEFAULT 'lead',
                chosen_date TEXT,
                locked_room_id TEXT,
                record TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_thread ON events(tenant_id, thread_id);
            CREATE INDEX IF NOT EXISTS idx_events_client ON events(tenant_id, client_email);
            CREATE INDEX IF NOT EXISTS idx_events_hold ON events(tenant_id, chosen_date, locked_room_id);

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                event_id TEXT,
                direction TEXT NOT NULL,
                sender TEXT NOT NULL,
                body TEXT NOT NULL,
                subject TEXT,
                extras TEXT DEFAULT '{}',
                created_at TEXT NOT NULL,
                seq INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(tenant_id, thread_id, seq);

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                event_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                category TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                draft_body TEXT NOT NULL,
                draft_body_markdown TEXT,
                signature TEXT NOT NULL,
                notes TEXT,
                edited_body TEXT,
                created_at TEXT NOT NULL,
                resolved_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_tenant_status ON tasks(tenant_id, status);
            CREATE INDEX IF NOT EXISTS idx_tasks_signature ON tasks(tenant_id, signature);

            CREATE TABLE IF NOT EXISTS snapshots (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS config (
                tenant_id TEXT NOT NULL,
                section TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (tenant_id, section)
            );

            CREATE TABLE IF NOT EXISTS prompt_history (
                tenant_id TEXT NOT NULL,
                idx INTEGER NOT NULL,
                prompts TEXT NOT NULL,
                saved_at TEXT NOT NULL,
                PRIMARY KEY (tenant_id, idx)
            );

            CREATE TABLE IF NOT EXISTS activities (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                event_id TEXT NOT NULL,
                granularity TEXT NOT NULL DEFAULT 'high',
                label TEXT NOT NULL,
                detail TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_activities_event ON activities(tenant_id, event_id);
            ",
        )
        .expect("Failed to run migrations");

        // Per-client billing column came later (idempotent — .ok() ignores duplicates)
        conn.execute_batch("ALTER TABLE clients ADD COLUMN billing TEXT;").ok();
    }

    // --- Clients ---

    pub fn upsert_client(&self, tenant: &str, email: &str, name: Option<&str>) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn();
        let existing: Option<String> = conn
            .query_row(
                "SELECT email FROM clients WHERE tenant_id = ?1 AND email = ?2",
                params![tenant, email],
                |r| r.get(0),
            )
            .optional()?;
        if existing.is_some() {
            if let Some(name) = name {
                conn.execute(
                    "UPDATE clients SET name = COALESCE(name, ?1), updated_at = ?2
                     WHERE tenant_id = ?3 AND email = ?4",
                    params![name, now, tenant, email],
                )?;
            }
        } else {
            conn.execute(
                "INSERT INTO clients (tenant_id, email, name, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'lead', ?4, ?4)",
                params![tenant, email, name, now],
            )?;
        }
        Ok(())
    }

    pub fn set_client_status(&self, tenant: &str, email: &str, status: EventStatus) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn().execute(
            "UPDATE clients SET status = ?1, updated_at = ?2 WHERE tenant_id = ?3 AND email = ?4",
            params![status.as_str(), now, tenant, email],
        )?;
        Ok(())
    }

    // --- Events ---

    pub fn insert_event(&self, ev: &EventRecord) -> Result<()> {
        let record = serde_json::to_string(ev)?;
        self.conn().execute(
            "INSERT INTO events (id, tenant_id, client_email, thread_id, current_step, status,
                                 chosen_date, locked_room_id, record, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                ev.id,
                ev.tenant_id,
                ev.client_email,
                ev.thread_id,
                ev.current_step,
                ev.status.as_str(),
                ev.chosen_date,
                ev.locked_room_id,
                record,
                ev.created_at,
                ev.updated_at
            ],
        )?;
        Ok(())
    }

    /// Persist the full record and mirror the hot columns. Called once per
    /// turn by the router (no mid-turn saves).
    pub fn save_event(&self, ev: &mut EventRecord) -> Result<()> {
        ev.updated_at = chrono::Utc::now().to_rfc3339();
        let record = serde_json::to_string(ev)?;
        self.conn().execute(
            "UPDATE events SET current_step = ?1, status = ?2, chosen_date = ?3,
                               locked_room_id = ?4, record = ?5, updated_at = ?6, thread_id = ?7
             WHERE id = ?8",
            params![
                ev.current_step,
                ev.status.as_str(),
                ev.chosen_date,
                ev.locked_room_id,
                record,
                ev.updated_at,
                ev.thread_id,
                ev.id
            ],
        )?;
        Ok(())
    }

    pub fn load_event(&self, tenant: &str, event_id: &str) -> Result<Option<EventRecord>> {
        let conn = self.conn();
        let record: Option<String> = conn
            .query_row(
                "SELECT record FROM events WHERE tenant_id = ?1 AND id = ?2",
                params![tenant, event_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(match record {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    /// Latest event on a thread, if any.
    pub fn latest_event_for_thread(&self, tenant: &str, thread_id: &str) -> Result<Option<EventRecord>> {
        let conn = self.conn();
        let record: Option<String> = conn
            .query_row(
                "SELECT record FROM events WHERE tenant_id = ?1 AND thread_id = ?2
                 ORDER BY created_at DESC LIMIT 1",
                params![tenant, thread_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(match record {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    /// Latest event for a client email, used by the continue-vs-new decision.
    pub fn latest_event_for_client(&self, tenant: &str, email: &str) -> Result<Option<EventRecord>> {
        let conn = self.conn();
        let record: Option<String> = conn
            .query_row(
                "SELECT record FROM events WHERE tenant_id = ?1 AND client_email = ?2
                 ORDER BY created_at DESC LIMIT 1",
                params![tenant, email],
                |r| r.get(0),
            )
            .optional()?;
        Ok(match record {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    /// All other events holding the given (date, room) pair. Snapshot read,
    /// not a coordinated transaction.
    pub fn events_holding(
        &self,
        tenant: &str,
        date: &str,
        room_id: &str,
        exclude_event: &str,
    ) -> Result<Vec<EventRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT record FROM events
             WHERE tenant_id = ?1 AND chosen_date = ?2 AND locked_room_id = ?3
               AND id != ?4 AND status IN ('option', 'confirmed')",
        )?;
        let rows = stmt
            .query_map(params![tenant, date, room_id, exclude_event], |r| {
                r.get::<_, String>(0)
            })?
            .filter_map(|r| r.ok())
            .filter_map(|json| serde_json::from_str(&json).ok())
            .collect();
        Ok(rows)
    }

    /// Dates on which the room is held by any active event (for availability).
    pub fn held_dates_for_room(&self, tenant: &str, room_id: &str) -> Result<Vec<(String, EventStatus)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT chosen_date, status FROM events
             WHERE tenant_id = ?1 AND locked_room_id = ?2 AND chosen_date IS NOT NULL
               AND status IN ('option', 'confirmed')",
        )?;
        let rows = stmt
            .query_map(params![tenant, room_id], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(d, s)| {
                let status = match s.as_str() {
                    "option" => EventStatus::Option,
                    "confirmed" => EventStatus::Confirmed,
                    _ => return None,
                };
                Some((d, status))
            })
            .collect();
        Ok(rows)
    }

    // --- Messages ---

    #[allow(clippy::too_many_arguments)]
    pub fn insert_message(
        &self,
        tenant: &str,
        thread_id: &str,
        event_id: Option<&str>,
        direction: &str,
        sender: &str,
        body: &str,
        subject: Option<&str>,
        extras: &serde_json::Value,
    ) -> Result<StoredMessage> {
        let conn = self.conn();
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let seq: i64 = conn
            .query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM messages", [], |r| r.get(0))
            .unwrap_or(1);
        conn.execute(
            "INSERT INTO messages (id, tenant_id, thread_id, event_id, direction, sender, body, subject, extras, created_at, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id,
                tenant,
                thread_id,
                event_id,
                direction,
                sender,
                body,
                subject,
                serde_json::to_string(extras)?,
                now,
                seq
            ],
        )?;
        Ok(StoredMessage {
            id,
            tenant_id: tenant.to_string(),
            thread_id: thread_id.to_string(),
            event_id: event_id.map(String::from),
            direction: direction.to_string(),
            sender: sender.to_string(),
            body: body.to_string(),
            subject: subject.map(String::from),
            created_at: now,
            seq,
        })
    }

    /// Body of the most recent inbound message on the thread (duplicate gate).
    pub fn last_inbound_body(&self, tenant: &str, thread_id: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let body = conn
            .query_row(
                "SELECT body FROM messages
                 WHERE tenant_id = ?1 AND thread_id = ?2 AND direction = 'in'
                 ORDER BY seq DESC LIMIT 1",
                params![tenant, thread_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(body)
    }

    // --- Tasks ---

    pub fn insert_task(&self, task: &HilTask) -> Result<()> {
        self.conn().execute(
            "INSERT INTO tasks (id, tenant_id, event_id, thread_id, category, status, draft_body,
                                draft_body_markdown, signature, notes, edited_body, created_at, resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                task.id,
                task.tenant_id,
                task.event_id,
                task.thread_id,
                task.category.as_str(),
                task.status.as_str(),
                task.draft_body,
                task.draft_body_markdown,
                task.signature,
                task.notes,
                task.edited_body,
                task.created_at,
                task.resolved_at
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, tenant: &str, task_id: &str) -> Result<Option<HilTask>> {
        let conn = self.conn();
        let task = conn
            .query_row(
                "SELECT id, tenant_id, event_id, thread_id, category, status, draft_body,
                        draft_body_markdown, signature, notes, edited_body, created_at, resolved_at
                 FROM tasks WHERE tenant_id = ?1 AND id = ?2",
                params![tenant, task_id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    pub fn pending_tasks(&self, tenant: &str) -> Result<Vec<HilTask>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, event_id, thread_id, category, status, draft_body,
                    draft_body_markdown, signature, notes, edited_body, created_at, resolved_at
             FROM tasks WHERE tenant_id = ?1 AND status = 'pending' ORDER BY created_at ASC",
        )?;
        let tasks = stmt
            .query_map(params![tenant], row_to_task)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(tasks)
    }

    pub fn pending_task_by_signature(&self, tenant: &str, signature: &str) -> Result<Option<HilTask>> {
        let conn = self.conn();
        let task = conn
            .query_row(
                "SELECT id, tenant_id, event_id, thread_id, category, status, draft_body,
                        draft_body_markdown, signature, notes, edited_body, created_at, resolved_at
                 FROM tasks WHERE tenant_id = ?1 AND signature = ?2 AND status = 'pending' LIMIT 1",
                params![tenant, signature],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// Was any task with this signature already resolved? (second-approve dedup)
    pub fn resolved_task_by_signature(&self, tenant: &str, signature: &str) -> Result<Option<HilTask>> {
        let conn = self.conn();
        let task = conn
            .query_row(
                "SELECT id, tenant_id, event_id, thread_id, category, status, draft_body,
                        draft_body_markdown, signature, notes, edited_body, created_at, resolved_at
                 FROM tasks WHERE tenant_id = ?1 AND signature = ?2 AND status IN ('approved', 'rejected')
                 LIMIT 1",
                params![tenant, signature],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    pub fn resolve_task(
        &self,
        tenant: &str,
        task_id: &str,
        status: TaskStatus,
        notes: Option<&str>,
        edited_body: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn().execute(
            "UPDATE tasks SET status = ?1, notes = COALESCE(?2, notes), edited_body = ?3, resolved_at = ?4
             WHERE tenant_id = ?5 AND id = ?6",
            params![status.as_str(), notes, edited_body, now, tenant, task_id],
        )?;
        Ok(())
    }

    pub fn mark_thread_tasks_stale(&self, tenant: &str, thread_id: &str) -> Result<usize> {
        let now = chrono::Utc::now().to_rfc3339();
        let n = self.conn().execute(
            "UPDATE tasks SET status = 'stale', resolved_at = ?1
             WHERE tenant_id = ?2 AND thread_id = ?3 AND status = 'pending'",
            params![now, tenant, thread_id],
        )?;
        Ok(n)
    }

    /// Remove resolved tasks older than the cutoff. Returns number removed.
    pub fn cleanup_tasks(&self, tenant: &str, older_than_hours: i64) -> Result<usize> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::hours(older_than_hours)).to_rfc3339();
        let n = self.conn().execute(
            "DELETE FROM tasks WHERE tenant_id = ?1 AND status IN ('approved', 'rejected', 'stale')
             AND resolved_at IS NOT NULL AND resolved_at < ?2",
            params![tenant, cutoff],
        )?;
        Ok(n)
    }

    // --- Snapshots ---

    pub fn insert_snapshot(&self, tenant: &str, kind: &str, payload: &serde_json::Value, ttl_days: i64) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now();
        self.conn().execute(
            "INSERT INTO snapshots (id, tenant_id, kind, payload, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                tenant,
                kind,
                serde_json::to_string(payload)?,
                now.to_rfc3339(),
                (now + chrono::Duration::days(ttl_days)).to_rfc3339()
            ],
        )?;
        Ok(id)
    }

    pub fn get_snapshot(&self, tenant: &str, id: &str) -> Result<Option<serde_json::Value>> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM snapshots WHERE tenant_id = ?1 AND id = ?2 AND expires_at > ?3",
                params![tenant, id, now],
                |r| r.get(0),
            )
            .optional()?;
        Ok(match payload {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    pub fn sweep_expired_snapshots(conn: &Connection) -> usize {
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute("DELETE FROM snapshots WHERE expires_at <= ?1", params![now])
            .unwrap_or(0)
    }

    // --- Config ---

    pub fn get_config(&self, tenant: &str, section: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM config WHERE tenant_id = ?1 AND section = ?2",
                params![tenant, section],
                |r| r.get(0),
            )
            .optional()?;
        Ok(match value {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    pub fn set_config(&self, tenant: &str, section: &str, value: &serde_json::Value) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO config (tenant_id, section, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(tenant_id, section) DO UPDATE SET value = ?3, updated_at = ?4",
            params![tenant, section, serde_json::to_string(value)?, now],
        )?;
        Ok(())
    }

    // --- Prompt history ---

    pub fn push_prompt_history(&self, tenant: &str, prompts: &serde_json::Value) -> Result<i64> {
        let conn = self.conn();
        let next: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(idx), -1) + 1 FROM prompt_history WHERE tenant_id = ?1",
                params![tenant],
                |r| r.get(0),
            )
            .unwrap_or(0);
        conn.execute(
            "INSERT INTO prompt_history (tenant_id, idx, prompts, saved_at) VALUES (?1, ?2, ?3, ?4)",
            params![tenant, next, serde_json::to_string(prompts)?, chrono::Utc::now().to_rfc3339()],
        )?;
        // Keep the latest 50 versions
        conn.execute(
            "DELETE FROM prompt_history WHERE tenant_id = ?1 AND idx <= ?2 - 50",
            params![tenant, next],
        )?;
        Ok(next)
    }

    pub fn prompt_history(&self, tenant: &str) -> Result<Vec<(i64, serde_json::Value, String)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT idx, prompts, saved_at FROM prompt_history WHERE tenant_id = ?1 ORDER BY idx DESC",
        )?;
        let rows = stmt
            .query_map(params![tenant], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(idx, json, at)| serde_json::from_str(&json).ok().map(|v| (idx, v, at)))
            .collect();
        Ok(rows)
    }

    pub fn prompt_history_at(&self, tenant: &str, idx: i64) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let value: Option<String> = conn
            .query_row(
                "SELECT prompts FROM prompt_history WHERE tenant_id = ?1 AND idx = ?2",
                params![tenant, idx],
                |r| r.get(0),
            )
            .optional()?;
        Ok(match value {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    // --- Activity log ---

    pub fn log_activity(
        &self,
        tenant: &str,
        event_id: &str,
        granularity: &str,
        label: &str,
        detail: Option<&str>,
    ) {
        let _ = self.conn().execute(
            "INSERT INTO activities (id, tenant_id, event_id, granularity, label, detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                uuid::Uuid::new_v4().to_string(),
                tenant,
                event_id,
                granularity,
                label,
                detail,
                chrono::Utc::now().to_rfc3339()
            ],
        );
    }

    pub fn list_activities(
        &self,
        tenant: &str,
        event_id: &str,
        granularity: &str,
        limit: i64,
    ) -> Result<Vec<ActivityEntry>> {
        let limit = limit.clamp(1, 50);
        let conn = self.conn();
        // "detailed" includes coarse entries too; "high" is coarse-only.
        let sql = if granularity == "detailed" {
            "SELECT id, event_id, granularity, label, detail, created_at FROM activities
             WHERE tenant_id = ?1 AND event_id = ?2 ORDER BY created_at DESC LIMIT ?3"
        } else {
            "SELECT id, event_id, granularity, label, detail, created_at FROM activities
             WHERE tenant_id = ?1 AND event_id = ?2 AND granularity = 'high'
             ORDER BY created_at DESC LIMIT ?3"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![tenant, event_id, limit], |r| {
                Ok(ActivityEntry {
                    id: r.get(0)?,
                    event_id: r.get(1)?,
                    granularity: r.get(2)?,
                    label: r.get(3)?,
                    detail: r.get(4)?,
                    created_at: r.get(5)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<HilTask> {
    let category_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    Ok(HilTask {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        event_id: row.get(2)?,
        thread_id: row.get(3)?,
        category: TaskCategory::parse(&category_str).unwrap_or(TaskCategory::ManagerRequest),
        status: match status_str.as_str() {
            "approved" => TaskStatus::Approved,
            "rejected" => TaskStatus::Rejected,
            "stale" => TaskStatus::Stale,
            _ => TaskStatus::Pending,
        },
        draft_body: row.get(6)?,
        draft_body_markdown: row.get(7)?,
        signature: row.get(8)?,
        notes: row.get(9)?,
        edited_body: row.get(10)?,
        created_at: row.get(11)?,
        resolved_at: row.get(12)?,
    })
}
