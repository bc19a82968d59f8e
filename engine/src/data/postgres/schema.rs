//! PostgreSQL schema definitions
//!
//! Same tables as the SQLite schema. JSON columns are JSONB.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL for PostgreSQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at BIGINT NOT NULL,
    description TEXT
);

-- =============================================================================
-- 1. Projects
-- =============================================================================
CREATE TABLE IF NOT EXISTS projects (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at BIGINT NOT NULL
);

-- =============================================================================
-- 2. Traces
-- =============================================================================
CREATE TABLE IF NOT EXISTS traces (
    id BIGSERIAL PRIMARY KEY,
    trace_id TEXT NOT NULL UNIQUE,
    project_rowid BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    start_time BIGINT NOT NULL,
    end_time BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_traces_project ON traces(project_rowid, start_time);

-- =============================================================================
-- 3. Spans
-- =============================================================================
CREATE TABLE IF NOT EXISTS spans (
    id BIGSERIAL PRIMARY KEY,
    span_id TEXT NOT NULL UNIQUE,
    trace_rowid BIGINT NOT NULL REFERENCES traces(id) ON DELETE CASCADE,
    parent_id TEXT,
    name TEXT NOT NULL,
    span_kind TEXT NOT NULL,
    start_time BIGINT NOT NULL,
    end_time BIGINT NOT NULL,
    attributes JSONB NOT NULL DEFAULT '{}'::jsonb,
    events JSONB NOT NULL DEFAULT '[]'::jsonb,
    status_code TEXT NOT NULL DEFAULT 'UNSET',
    status_message TEXT NOT NULL DEFAULT '',
    cumulative_error_count BIGINT NOT NULL DEFAULT 0,
    cumulative_llm_token_count_prompt BIGINT NOT NULL DEFAULT 0,
    cumulative_llm_token_count_completion BIGINT NOT NULL DEFAULT 0,
    llm_token_count_prompt BIGINT,
    llm_token_count_completion BIGINT
);

CREATE INDEX IF NOT EXISTS idx_spans_trace ON spans(trace_rowid);
CREATE INDEX IF NOT EXISTS idx_spans_parent ON spans(parent_id);
CREATE INDEX IF NOT EXISTS idx_spans_start_time ON spans(start_time);

-- =============================================================================
-- 4. Span annotations (evaluations)
-- =============================================================================
CREATE TABLE IF NOT EXISTS span_annotations (
    id BIGSERIAL PRIMARY KEY,
    span_rowid BIGINT NOT NULL REFERENCES spans(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    label TEXT,
    score DOUBLE PRECISION,
    explanation TEXT,
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    annotator_kind TEXT NOT NULL DEFAULT 'LLM',
    UNIQUE (name, span_rowid)
);

CREATE INDEX IF NOT EXISTS idx_span_annotations_span ON span_annotations(span_rowid);
"#;

/// Rows every fresh database starts with
pub const DEFAULT_DATA: &str = r#"
INSERT INTO projects (name, description, created_at)
VALUES ('default', 'Default project', (EXTRACT(EPOCH FROM NOW()) * 1000000)::BIGINT)
ON CONFLICT (name) DO NOTHING;
"#;
