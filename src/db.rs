//! Persistence store (§4.A): a durable keyed store over four logical
//! collections — direct messages, groups, group members, group messages —
//! backed by a single on-disk sqlite file. Grounded in the teacher's
//! `Db { conn: Mutex<Connection> }` shape (src/db.rs), generalized from one
//! room-scoped `messages` table to the direct/group split §3 describes.

use crate::codec::{canonicalize_content, canonicalize_reply_to, inflate_content, inflate_reply_to};
use crate::models::{
    DeliveryStatus, DirectMessageRecord, Group, GroupMember, GroupMessageRecord, MemberRole,
};
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Mutex, MutexGuard};

pub struct Store {
    conn: Mutex<Connection>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub direct_messages: i64,
    pub groups: i64,
    pub group_messages: i64,
}

fn status_to_str(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Sent => "sent",
        DeliveryStatus::Delivered => "delivered",
        DeliveryStatus::Read => "read",
    }
}

fn status_from_str(s: &str) -> DeliveryStatus {
    match s {
        "delivered" => DeliveryStatus::Delivered,
        "read" => DeliveryStatus::Read,
        _ => DeliveryStatus::Sent,
    }
}

fn role_to_str(role: MemberRole) -> &'static str {
    match role {
        MemberRole::Admin => "admin",
        MemberRole::Member => "member",
    }
}

fn role_from_str(s: &str) -> MemberRole {
    match s {
        "admin" => MemberRole::Admin,
        _ => MemberRole::Member,
    }
}

impl Store {
    pub fn open(path: &str) -> Self {
        let conn = Connection::open(path).expect("failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .expect("failed to set pragmas");
        let store = Store {
            conn: Mutex::new(conn),
        };
        store.migrate();
        store
    }

    pub fn open_in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("failed to open in-memory database");
        conn.execute_batch("PRAGMA foreign_keys=ON;").ok();
        let store = Store {
            conn: Mutex::new(conn),
        };
        store.migrate();
        store
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) {
        let conn = self.conn();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS direct_messages (
                id TEXT PRIMARY KEY,
                from_id TEXT NOT NULL,
                to_id TEXT NOT NULL,
                content TEXT NOT NULL,
                reply_to TEXT,
                timestamp INTEGER NOT NULL,
                delivered INTEGER NOT NULL DEFAULT 0,
                read_status INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'sent'
            );
            CREATE INDEX IF NOT EXISTS idx_dm_from ON direct_messages(from_id);
            CREATE INDEX IF NOT EXISTS idx_dm_to ON direct_messages(to_id);
            CREATE INDEX IF NOT EXISTS idx_dm_timestamp ON direct_messages(timestamp);

            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_by TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS group_members (
                group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'member',
                joined_at INTEGER NOT NULL,
                is_muted INTEGER NOT NULL DEFAULT 0,
                is_banned INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (group_id, user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_members_user ON group_members(user_id);

            CREATE TABLE IF NOT EXISTS group_messages (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                from_id TEXT NOT NULL,
                content TEXT NOT NULL,
                reply_to TEXT,
                timestamp INTEGER NOT NULL,
                read_by TEXT NOT NULL DEFAULT '[]'
            );
            CREATE INDEX IF NOT EXISTS idx_gm_group_ts ON group_messages(group_id, timestamp);",
        )
        .expect("failed to run migrations");
    }

    // --- Direct messages (§4.A) -------------------------------------------

    /// Idempotent on `id` — a duplicate insert is a no-op, prior mutable
    /// fields win (§4.A, invariant 1).
    pub fn insert_direct_message(&self, record: &DirectMessageRecord) {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO direct_messages
                (id, from_id, to_id, content, reply_to, timestamp, delivered, read_status, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO NOTHING",
            params![
                &record.id,
                &record.from_id,
                &record.to_id,
                &record.content,
                &record.reply_to,
                record.timestamp,
                record.delivered as i64,
                record.read_status as i64,
                status_to_str(record.status),
            ],
        )
        .expect("insert_direct_message failed");
    }

    /// Atomic mutation of the lifecycle flags on a single row (invariant 6).
    /// `read` implies `delivered`, matching invariant 2's monotonicity.
    pub fn mark_direct_message(&self, id: &str, delivered: bool, read: bool) {
        let conn = self.conn();
        let status = if read {
            "read"
        } else if delivered {
            "delivered"
        } else {
            "sent"
        };
        conn.execute(
            "UPDATE direct_messages
             SET delivered = delivered OR ?2, read_status = read_status OR ?3, status = ?4
             WHERE id = ?1",
            params![id, delivered as i64, read as i64, status],
        )
        .ok();
    }

    /// Flags a batch of rows delivered in one transaction — used by initial
    /// sync, which must mark every undelivered row it is about to replay as
    /// delivered as a single atomic unit (§4.G step 3a).
    pub fn mark_delivered_batch(&self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        let mut conn = self.conn();
        let tx = conn.transaction().expect("failed to start transaction");
        for id in ids {
            tx.execute(
                "UPDATE direct_messages SET delivered = 1, status = CASE WHEN status = 'read' THEN status ELSE 'delivered' END WHERE id = ?1",
                params![id],
            )
            .expect("mark_delivered_batch failed");
        }
        tx.commit().expect("failed to commit delivered batch");
    }

    /// Ascending-by-timestamp range of every row where `userId` is a
    /// participant (§4.A Range by participant).
    pub fn direct_messages_for(&self, user_id: &str) -> Vec<DirectMessageRecord> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, from_id, to_id, content, reply_to, timestamp, delivered, read_status, status
                 FROM direct_messages WHERE from_id = ?1 OR to_id = ?1 ORDER BY timestamp ASC",
            )
            .unwrap();
        stmt.query_map(params![user_id], row_to_direct_message)
            .unwrap()
            .filter_map(Result::ok)
            .collect()
    }

    /// Deletes all rows where `{from_id,to_id}` equals the unordered pair
    /// `{user_id, contact_id}`, as a single atomic unit (§4.A Purge).
    pub fn purge_conversation(&self, user_id: &str, contact_id: &str) {
        let mut conn = self.conn();
        let tx = conn.transaction().expect("failed to start transaction");
        tx.execute(
            "DELETE FROM direct_messages
             WHERE (from_id = ?1 AND to_id = ?2) OR (from_id = ?2 AND to_id = ?1)",
            params![user_id, contact_id],
        )
        .expect("purge_conversation failed");
        tx.commit().expect("failed to commit purge");
    }

    pub fn direct_message_exists(&self, id: &str) -> bool {
        let conn = self.conn();
        conn.query_row(
            "SELECT COUNT(*) FROM direct_messages WHERE id = ?1",
            params![id],
            |r| r.get::<_, i64>(0),
        )
        .map(|c| c > 0)
        .unwrap_or(false)
    }

    // --- Groups (§4.A) -----------------------------------------------------

    /// Creates a group with its initial members transactionally — partial
    /// success must not be observable (§4.A).
    pub fn create_group(&self, group: &Group, members: &[(String, MemberRole)], now: i64) {
        let mut conn = self.conn();
        let tx = conn.transaction().expect("failed to start transaction");
        tx.execute(
            "INSERT INTO groups (id, name, description, created_by, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![&group.id, &group.name, &group.description, &group.created_by, group.created_at],
        )
        .expect("create_group failed");
        for (user_id, role) in members {
            tx.execute(
                "INSERT INTO group_members (group_id, user_id, role, joined_at, is_muted, is_banned)
                 VALUES (?1, ?2, ?3, ?4, 0, 0)",
                params![&group.id, user_id, role_to_str(*role), now],
            )
            .expect("insert initial member failed");
        }
        tx.commit().expect("failed to commit group creation");
    }

    pub fn group_by_id(&self, group_id: &str) -> Option<Group> {
        let conn = self.conn();
        conn.query_row(
            "SELECT g.id, g.name, g.description, g.created_by, g.created_at,
                    (SELECT COUNT(*) FROM group_members m WHERE m.group_id = g.id AND m.is_banned = 0),
                    (SELECT MAX(timestamp) FROM group_messages WHERE group_id = g.id),
                    (SELECT content FROM group_messages WHERE group_id = g.id ORDER BY timestamp DESC LIMIT 1)
             FROM groups g WHERE g.id = ?1",
            params![group_id],
            |row| {
                Ok(Group {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    created_by: row.get(3)?,
                    created_at: row.get(4)?,
                    member_count: row.get(5)?,
                    last_activity: row.get(6)?,
                    last_message: row.get(7)?,
                })
            },
        )
        .optional()
        .unwrap_or(None)
    }

    pub fn add_group_member(&self, group_id: &str, user_id: &str, role: MemberRole, now: i64) {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO group_members (group_id, user_id, role, joined_at, is_muted, is_banned)
             VALUES (?1, ?2, ?3, ?4, 0, 0)
             ON CONFLICT(group_id, user_id) DO UPDATE SET is_banned = 0, is_muted = 0",
            params![group_id, user_id, role_to_str(role), now],
        )
        .expect("add_group_member failed");
    }

    pub fn remove_group_member(&self, group_id: &str, user_id: &str) {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id, user_id],
        )
        .ok();
    }

    pub fn member(&self, group_id: &str, user_id: &str) -> Option<GroupMember> {
        let conn = self.conn();
        conn.query_row(
            "SELECT group_id, user_id, role, joined_at, is_muted, is_banned
             FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id, user_id],
            row_to_member,
        )
        .optional()
        .unwrap_or(None)
    }

    /// Sets the member's role and moderation flags in one statement — group
    /// moderation is serialized per group by the caller holding a per-group
    /// lock around the authorization-read + this write (§5).
    pub fn set_member_state(
        &self,
        group_id: &str,
        user_id: &str,
        role: MemberRole,
        is_muted: bool,
        is_banned: bool,
    ) {
        let conn = self.conn();
        conn.execute(
            "UPDATE group_members SET role = ?3, is_muted = ?4, is_banned = ?5
             WHERE group_id = ?1 AND user_id = ?2",
            params![group_id, user_id, role_to_str(role), is_muted as i64, is_banned as i64],
        )
        .ok();
    }

    /// Non-banned members of a group (invariant 4).
    pub fn members_excluding_banned(&self, group_id: &str) -> Vec<GroupMember> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT group_id, user_id, role, joined_at, is_muted, is_banned
                 FROM group_members WHERE group_id = ?1 AND is_banned = 0",
            )
            .unwrap();
        stmt.query_map(params![group_id], row_to_member)
            .unwrap()
            .filter_map(Result::ok)
            .collect()
    }

    /// Non-banned groups a user belongs to.
    pub fn groups_for_user(&self, user_id: &str) -> Vec<Group> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT g.id, g.name, g.description, g.created_by, g.created_at,
                        (SELECT COUNT(*) FROM group_members m WHERE m.group_id = g.id AND m.is_banned = 0),
                        (SELECT MAX(timestamp) FROM group_messages WHERE group_id = g.id),
                        (SELECT content FROM group_messages WHERE group_id = g.id ORDER BY timestamp DESC LIMIT 1)
                 FROM groups g
                 JOIN group_members m ON m.group_id = g.id
                 WHERE m.user_id = ?1 AND m.is_banned = 0",
            )
            .unwrap();
        stmt.query_map(params![user_id], |row| {
            Ok(Group {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                created_by: row.get(3)?,
                created_at: row.get(4)?,
                member_count: row.get(5)?,
                last_activity: row.get(6)?,
                last_message: row.get(7)?,
            })
        })
        .unwrap()
        .filter_map(Result::ok)
        .collect()
    }

    pub fn admin_count(&self, group_id: &str) -> i64 {
        let conn = self.conn();
        conn.query_row(
            "SELECT COUNT(*) FROM group_members WHERE group_id = ?1 AND role = 'admin' AND is_banned = 0",
            params![group_id],
            |r| r.get(0),
        )
        .unwrap_or(0)
    }

    // --- Group messages (§4.A) ---------------------------------------------

    pub fn insert_group_message(&self, record: &GroupMessageRecord) {
        let conn = self.conn();
        let read_by = serde_json::to_string(&record.read_by).unwrap_or_else(|_| "[]".to_string());
        conn.execute(
            "INSERT INTO group_messages (id, group_id, from_id, content, reply_to, timestamp, read_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO NOTHING",
            params![
                &record.id,
                &record.group_id,
                &record.from_id,
                &record.content,
                &record.reply_to,
                record.timestamp,
                &read_by,
            ],
        )
        .expect("insert_group_message failed");
    }

    pub fn mark_group_message_read(&self, message_id: &str, reader: &str) {
        let conn = self.conn();
        let current: Option<String> = conn
            .query_row(
                "SELECT read_by FROM group_messages WHERE id = ?1",
                params![message_id],
                |r| r.get(0),
            )
            .optional()
            .unwrap_or(None);
        let Some(current) = current else { return };
        let mut read_by: Vec<String> = serde_json::from_str(&current).unwrap_or_default();
        if !read_by.iter().any(|r| r == reader) {
            read_by.push(reader.to_string());
            let updated = serde_json::to_string(&read_by).unwrap_or(current);
            conn.execute(
                "UPDATE group_messages SET read_by = ?2 WHERE id = ?1",
                params![message_id, &updated],
            )
            .ok();
        }
    }

    /// Coarse operational counters for the health/stats control-plane
    /// endpoint (§4.H), mirroring the shape of the teacher's `stats` route
    /// but scoped to this store's actual tables.
    pub fn stats(&self) -> StoreStats {
        let conn = self.conn();
        let direct_messages = conn
            .query_row("SELECT COUNT(*) FROM direct_messages", [], |r| r.get(0))
            .unwrap_or(0);
        let groups = conn
            .query_row("SELECT COUNT(*) FROM groups", [], |r| r.get(0))
            .unwrap_or(0);
        let group_messages = conn
            .query_row("SELECT COUNT(*) FROM group_messages", [], |r| r.get(0))
            .unwrap_or(0);
        StoreStats {
            direct_messages,
            groups,
            group_messages,
        }
    }

    /// Latest N group messages by timestamp, oldest-first for display
    /// (§4.A: N≥50, 50 on join / 100 on explicit fetch).
    pub fn latest_group_messages(&self, group_id: &str, limit: i64) -> Vec<GroupMessageRecord> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, group_id, from_id, content, reply_to, timestamp, read_by
                 FROM group_messages WHERE group_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
            )
            .unwrap();
        let mut rows: Vec<GroupMessageRecord> = stmt
            .query_map(params![group_id, limit], row_to_group_message)
            .unwrap()
            .filter_map(Result::ok)
            .collect();
        rows.reverse();
        rows
    }
}

fn row_to_direct_message(row: &rusqlite::Row) -> rusqlite::Result<DirectMessageRecord> {
    let status_str: String = row.get(8)?;
    Ok(DirectMessageRecord {
        id: row.get(0)?,
        from_id: row.get(1)?,
        to_id: row.get(2)?,
        content: row.get(3)?,
        reply_to: row.get(4)?,
        timestamp: row.get(5)?,
        delivered: row.get::<_, i64>(6)? != 0,
        read_status: row.get::<_, i64>(7)? != 0,
        status: status_from_str(&status_str),
    })
}

fn row_to_member(row: &rusqlite::Row) -> rusqlite::Result<GroupMember> {
    let role_str: String = row.get(2)?;
    Ok(GroupMember {
        group_id: row.get(0)?,
        user_id: row.get(1)?,
        role: role_from_str(&role_str),
        joined_at: row.get(3)?,
        is_muted: row.get::<_, i64>(4)? != 0,
        is_banned: row.get::<_, i64>(5)? != 0,
        online: None,
    })
}

fn row_to_group_message(row: &rusqlite::Row) -> rusqlite::Result<GroupMessageRecord> {
    let read_by_str: String = row.get(6)?;
    Ok(GroupMessageRecord {
        id: row.get(0)?,
        group_id: row.get(1)?,
        from_id: row.get(2)?,
        content: row.get(3)?,
        reply_to: row.get(4)?,
        timestamp: row.get(5)?,
        read_by: serde_json::from_str(&read_by_str).unwrap_or_default(),
    })
}

/// Build a persisted record from a chat envelope, canonicalizing content and
/// reply_to the way the codec does for the wire <-> store boundary (§4.C).
pub fn record_from_envelope(envelope: &crate::models::ChatEnvelope) -> DirectMessageRecord {
    DirectMessageRecord {
        id: envelope.id.clone(),
        from_id: envelope.from_id.clone(),
        to_id: envelope.to_id.clone(),
        content: canonicalize_content(&envelope.content),
        reply_to: canonicalize_reply_to(&envelope.reply_to),
        timestamp: envelope.timestamp,
        delivered: envelope.delivered,
        read_status: envelope.read_status,
        status: envelope.status,
    }
}

/// Inverse of [`record_from_envelope`] for replaying stored rows back onto
/// the wire during initial sync (§4.G).
pub fn envelope_from_record(record: &DirectMessageRecord) -> crate::models::ChatEnvelope {
    crate::models::ChatEnvelope {
        id: record.id.clone(),
        from_id: record.from_id.clone(),
        to_id: record.to_id.clone(),
        content: inflate_content(&record.content),
        timestamp: record.timestamp,
        delivered: record.delivered,
        read_status: record.read_status,
        status: record.status,
        reply_to: inflate_reply_to(&record.reply_to),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeliveryStatus, MemberRole};

    fn sample(id: &str, from: &str, to: &str, ts: i64) -> DirectMessageRecord {
        DirectMessageRecord {
            id: id.to_string(),
            from_id: from.to_string(),
            to_id: to.to_string(),
            content: "hi".to_string(),
            reply_to: None,
            timestamp: ts,
            delivered: false,
            read_status: false,
            status: DeliveryStatus::Sent,
        }
    }

    #[test]
    fn insert_is_idempotent_on_id() {
        let store = Store::open_in_memory();
        store.insert_direct_message(&sample("m1", "A", "B", 1));
        store.mark_direct_message("m1", true, false);
        // Re-inserting the same id must not clobber the mutated flags.
        store.insert_direct_message(&sample("m1", "A", "B", 1));
        let rows = store.direct_messages_for("A");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].delivered);
    }

    #[test]
    fn mark_delivered_batch_flags_every_row_without_touching_read_status() {
        let store = Store::open_in_memory();
        store.insert_direct_message(&sample("m1", "A", "B", 1));
        store.insert_direct_message(&sample("m2", "A", "B", 2));
        store.mark_delivered_batch(&["m1".to_string(), "m2".to_string()]);
        let rows = store.direct_messages_for("A");
        assert!(rows.iter().all(|r| r.delivered));
        assert!(rows.iter().all(|r| !r.read_status));
    }

    #[test]
    fn range_by_participant_is_ascending_by_timestamp() {
        let store = Store::open_in_memory();
        store.insert_direct_message(&sample("m2", "A", "B", 20));
        store.insert_direct_message(&sample("m1", "A", "B", 10));
        store.insert_direct_message(&sample("m3", "A", "C", 30));
        let rows = store.direct_messages_for("A");
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn purge_deletes_unordered_pair_atomically() {
        let store = Store::open_in_memory();
        store.insert_direct_message(&sample("m1", "A", "B", 1));
        store.insert_direct_message(&sample("m2", "B", "A", 2));
        store.insert_direct_message(&sample("m3", "A", "C", 3));
        store.purge_conversation("A", "B");
        let rows = store.direct_messages_for("A");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "m3");
    }

    #[test]
    fn group_creation_seeds_initial_members_transactionally() {
        let store = Store::open_in_memory();
        let group = Group {
            id: "GROUP_ABCD".to_string(),
            name: "test".to_string(),
            description: String::new(),
            created_by: "A".to_string(),
            created_at: 1,
            member_count: 0,
            last_activity: None,
            last_message: None,
        };
        store.create_group(
            &group,
            &[
                ("A".to_string(), MemberRole::Admin),
                ("B".to_string(), MemberRole::Member),
            ],
            1,
        );
        let members = store.members_excluding_banned("GROUP_ABCD");
        assert_eq!(members.len(), 2);
        assert_eq!(store.admin_count("GROUP_ABCD"), 1);
    }

    #[test]
    fn banned_members_excluded_from_listing() {
        let store = Store::open_in_memory();
        let group = Group {
            id: "GROUP_ZZZZ".to_string(),
            name: "t".to_string(),
            description: String::new(),
            created_by: "A".to_string(),
            created_at: 1,
            member_count: 0,
            last_activity: None,
            last_message: None,
        };
        store.create_group(
            &group,
            &[
                ("A".to_string(), MemberRole::Admin),
                ("B".to_string(), MemberRole::Member),
            ],
            1,
        );
        store.set_member_state("GROUP_ZZZZ", "B", MemberRole::Member, false, true);
        let members = store.members_excluding_banned("GROUP_ZZZZ");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, "A");
    }

    #[test]
    fn group_message_read_by_always_includes_sender() {
        let store = Store::open_in_memory();
        let record = GroupMessageRecord {
            id: "gm1".to_string(),
            group_id: "GROUP_AAAA".to_string(),
            from_id: "A".to_string(),
            content: "hello".to_string(),
            reply_to: None,
            timestamp: 1,
            read_by: vec!["A".to_string()],
        };
        store.insert_group_message(&record);
        let rows = store.latest_group_messages("GROUP_AAAA", 50);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].read_by, vec!["A".to_string()]);
    }
}
