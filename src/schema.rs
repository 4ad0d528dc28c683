// Table: profiles, the local fallback copy of analytics profiles
pub const PROFILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    profile_type    TEXT,
    analysis_scope  TEXT,
    log_source_name TEXT,
    log_source_type TEXT,
    description     TEXT,
    data            JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_profiles_created_at ON profiles (created_at DESC);
"#;

// Table: profile_status, one row per profile, removed with it
pub const PROFILE_STATUS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS profile_status (
    profile_id  TEXT PRIMARY KEY REFERENCES profiles(id) ON DELETE CASCADE,
    status      TEXT NOT NULL DEFAULT 'stopped',
    last_run    TIMESTAMPTZ,
    next_run    TIMESTAMPTZ,
    priority    TEXT DEFAULT 'medium',
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

/// Full schema in dependency order.
pub fn statements() -> [&'static str; 2] {
    [PROFILES_TABLE, PROFILE_STATUS_TABLE]
}
