// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "Phoenix";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".phoenix";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "phoenix.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "PHOENIX_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "PHOENIX_LOG";

/// Default log filter when neither PHOENIX_LOG nor RUST_LOG is set
pub const DEFAULT_LOG_FILTER: &str = "info,phoenix=info,phoenix_engine=info";

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "PHOENIX_DATA_DIR";

/// Environment variable selecting the database backend (sqlite or postgres)
pub const ENV_DATABASE_BACKEND: &str = "PHOENIX_DATABASE_BACKEND";

/// Environment variable for the PostgreSQL connection URL
pub const ENV_POSTGRES_URL: &str = "PHOENIX_POSTGRES_URL";

/// Environment variable for the SQLite database file
pub const ENV_SQLITE_PATH: &str = "PHOENIX_SQLITE_PATH";

/// Environment variable for the default span query limit
pub const ENV_QUERY_LIMIT: &str = "PHOENIX_QUERY_LIMIT";

// =============================================================================
// SQLite Database
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "phoenix.db";

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -64000 = 64MB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

// =============================================================================
// PostgreSQL Database
// =============================================================================

/// PostgreSQL default max connections
pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// PostgreSQL default min connections
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 1;

/// PostgreSQL default connection acquire timeout in seconds
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// PostgreSQL idle connection timeout in seconds
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// PostgreSQL max connection lifetime in seconds
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// PostgreSQL statement timeout in seconds (0 = disabled)
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Projects
// =============================================================================

/// Project seeded on first run and queried when none is given
pub const DEFAULT_PROJECT_NAME: &str = "default";

// =============================================================================
// Span Queries
// =============================================================================

/// Maximum spans returned by a query unless overridden
pub const DEFAULT_QUERY_LIMIT: u64 = 1000;

/// Separator placed between concatenated array values
pub const DEFAULT_CONCAT_SEPARATOR: &str = "\n\n";

/// Index column of query results
pub const DEFAULT_SPAN_INDEX: &str = "context.span_id";
