pub const RUNWATCH_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS test_runs (
    test_name TEXT NOT NULL,
    start_timestamp INTEGER NOT NULL,
    end_timestamp INTEGER NOT NULL,
    covered_line_count INTEGER NOT NULL DEFAULT 0,
    total_line_count INTEGER NOT NULL DEFAULT 0,
    has_coverage INTEGER NOT NULL DEFAULT 0,
    devices_json TEXT NOT NULL DEFAULT '[]',
    PRIMARY KEY (test_name, start_timestamp)
);

CREATE TABLE IF NOT EXISTS test_case_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    test_name TEXT NOT NULL,
    start_timestamp INTEGER NOT NULL,
    seq INTEGER NOT NULL,
    cases_json TEXT NOT NULL,
    FOREIGN KEY (test_name, start_timestamp)
        REFERENCES test_runs(test_name, start_timestamp) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_case_runs_run
    ON test_case_runs(test_name, start_timestamp, seq);

CREATE TABLE IF NOT EXISTS test_status (
    test_name TEXT PRIMARY KEY,
    updated_timestamp INTEGER NOT NULL,
    pass_count INTEGER NOT NULL,
    fail_count INTEGER NOT NULL,
    failing_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS coverage_status (
    test_name TEXT PRIMARY KEY,
    updated_timestamp INTEGER NOT NULL,
    covered_line_count INTEGER NOT NULL,
    total_line_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS acknowledgments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    test_name TEXT NOT NULL,
    user TEXT NOT NULL DEFAULT '',
    devices_json TEXT NOT NULL DEFAULT '[]',
    branches_json TEXT NOT NULL DEFAULT '[]',
    test_cases_json TEXT NOT NULL DEFAULT '[]',
    note TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_acks_test ON acknowledgments(test_name);

CREATE TABLE IF NOT EXISTS subscriptions (
    test_name TEXT NOT NULL,
    email TEXT NOT NULL,
    PRIMARY KEY (test_name, email)
);

CREATE TABLE IF NOT EXISTS profiling_points (
    test_name TEXT NOT NULL,
    name TEXT NOT NULL,
    regression_mode TEXT NOT NULL,
    x_label TEXT NOT NULL DEFAULT '',
    y_label TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (test_name, name)
);

CREATE TABLE IF NOT EXISTS profiling_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    test_name TEXT NOT NULL,
    profiling_point TEXT NOT NULL,
    start_timestamp INTEGER NOT NULL,
    branch TEXT NOT NULL,
    device TEXT NOT NULL,
    labels_json TEXT NOT NULL,
    values_json TEXT NOT NULL,
    options_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiling_runs_applied (
    run_id INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiling_summaries (
    test_name TEXT NOT NULL,
    profiling_point TEXT NOT NULL,
    branch TEXT NOT NULL,
    device TEXT NOT NULL,
    option_alias TEXT NOT NULL,
    day_start INTEGER NOT NULL,
    summary_json TEXT NOT NULL,
    PRIMARY KEY (test_name, profiling_point, branch, device, option_alias, day_start)
);
"#;
