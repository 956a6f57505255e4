//! Table layout and statement text shared by every row store.
//!
//! Timestamps that drive eligibility (`claim_expires`) are Unix epoch
//! milliseconds taken from the store's own clock, so processes sharing a
//! networked store agree on "now".

/// Current time in epoch milliseconds, evaluated by the store
macro_rules! now_ms {
    () => {
        "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)"
    };
}

/// A row may be claimed when it was never leased, or when its lease or
/// backoff window has passed.
macro_rules! claimable {
    () => {
        concat!(
            "((claimed = 0 AND claim_expires IS NULL) OR claim_expires <= ",
            now_ms!(),
            ")"
        )
    };
}

pub const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    payload TEXT NOT NULL,
    enqueued_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    claimed INTEGER NOT NULL DEFAULT 0,
    claim_expires INTEGER,
    retries INTEGER NOT NULL DEFAULT 0
)
"#;

pub const CREATE_UNCLAIMED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_unclaimed ON queue (id) WHERE claimed = 0";

/// Statements run, in order, when a store is opened
pub const MIGRATIONS: &[&str] = &[CREATE_TABLE, CREATE_UNCLAIMED_INDEX];

/// Binds: payload
pub const INSERT_JOB: &str = "INSERT INTO queue (payload) VALUES (?) RETURNING id";

/// Binds: max_retries
pub const SELECT_CANDIDATE: &str = concat!(
    "SELECT id FROM queue WHERE retries <= ? AND ",
    claimable!(),
    " ORDER BY id ASC LIMIT 1"
);

/// Binds: lease_ms, id, max_retries.
/// Re-checks eligibility so a row taken since the scan updates nothing.
pub const CLAIM_CANDIDATE: &str = concat!(
    "UPDATE queue SET claimed = 1, claim_expires = ",
    now_ms!(),
    " + ? WHERE id = ? AND retries <= ? AND ",
    claimable!(),
    " RETURNING id, payload, enqueued_at, claimed, claim_expires, retries"
);

/// Binds: id
pub const DELETE_JOB: &str = "DELETE FROM queue WHERE id = ?";

/// Binds: delay_ms, id
pub const NACK_JOB: &str = concat!(
    "UPDATE queue SET retries = retries + 1, claimed = 0, claim_expires = ",
    now_ms!(),
    " + ? WHERE id = ?"
);

/// Binds: max_retries
pub const COUNT_LIVE: &str = "SELECT COUNT(*) FROM queue WHERE retries <= ?";

pub const RECLAIM_EXPIRED: &str = concat!(
    "UPDATE queue SET claimed = 0, claim_expires = NULL \
     WHERE claimed = 1 AND claim_expires IS NOT NULL AND claim_expires < ",
    now_ms!(),
    " RETURNING id"
);

/// Binds: id
pub const SELECT_RECORD: &str =
    "SELECT id, payload, enqueued_at, claimed, claim_expires, retries FROM queue WHERE id = ?";
