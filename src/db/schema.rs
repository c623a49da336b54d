pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS app_usage (
    date TEXT NOT NULL,
    name TEXT NOT NULL,
    executable_path TEXT NOT NULL DEFAULT '',
    process_id INTEGER NOT NULL DEFAULT 0,
    usage_ms INTEGER NOT NULL,
    PRIMARY KEY (date, name, executable_path)
);

CREATE INDEX IF NOT EXISTS idx_app_usage_date ON app_usage(date);
";
