//! SQLite schema definitions
//!
//! Timestamps are integer microseconds since the Unix epoch. JSON columns are
//! TEXT and queried through the json1 functions.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

-- =============================================================================
-- 1. Projects
-- =============================================================================
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at INTEGER NOT NULL
);

-- =============================================================================
-- 2. Traces
-- =============================================================================
CREATE TABLE IF NOT EXISTS traces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trace_id TEXT NOT NULL UNIQUE,
    project_rowid INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    start_time INTEGER NOT NULL,
    end_time INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_traces_project ON traces(project_rowid, start_time);

-- =============================================================================
-- 3. Spans
-- =============================================================================
CREATE TABLE IF NOT EXISTS spans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    span_id TEXT NOT NULL UNIQUE,
    trace_rowid INTEGER NOT NULL REFERENCES traces(id) ON DELETE CASCADE,
    parent_id TEXT,
    name TEXT NOT NULL,
    span_kind TEXT NOT NULL,
    start_time INTEGER NOT NULL,
    end_time INTEGER NOT NULL,
    attributes TEXT NOT NULL DEFAULT '{}',
    events TEXT NOT NULL DEFAULT '[]',
    status_code TEXT NOT NULL DEFAULT 'UNSET',
    status_message TEXT NOT NULL DEFAULT '',
    cumulative_error_count INTEGER NOT NULL DEFAULT 0,
    cumulative_llm_token_count_prompt INTEGER NOT NULL DEFAULT 0,
    cumulative_llm_token_count_completion INTEGER NOT NULL DEFAULT 0,
    llm_token_count_prompt INTEGER,
    llm_token_count_completion INTEGER
);

CREATE INDEX IF NOT EXISTS idx_spans_trace ON spans(trace_rowid);
CREATE INDEX IF NOT EXISTS idx_spans_parent ON spans(parent_id);
CREATE INDEX IF NOT EXISTS idx_spans_start_time ON spans(start_time);

-- =============================================================================
-- 4. Span annotations (evaluations)
-- =============================================================================
CREATE TABLE IF NOT EXISTS span_annotations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    span_rowid INTEGER NOT NULL REFERENCES spans(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    label TEXT,
    score REAL,
    explanation TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    annotator_kind TEXT NOT NULL DEFAULT 'LLM',
    UNIQUE (name, span_rowid)
);

CREATE INDEX IF NOT EXISTS idx_span_annotations_span ON span_annotations(span_rowid);
"#;

/// Rows every fresh database starts with
pub const DEFAULT_DATA: &str = r#"
INSERT OR IGNORE INTO projects (name, description, created_at)
VALUES ('default', 'Default project', CAST(strftime('%s', 'now') AS INTEGER) * 1000000);
"#;
