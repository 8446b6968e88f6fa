pub const MIG_0001_INIT: &str = r#"
BEGIN;

CREATE TABLE programs (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  program_name    TEXT UNIQUE NOT NULL,
  com             TEXT,
  url             TEXT
);

CREATE TABLE domains (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  program_id      INTEGER NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
  domain_name     TEXT UNIQUE NOT NULL
);

CREATE TABLE domain_details (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  domain_id       INTEGER NOT NULL REFERENCES domains(id) ON DELETE CASCADE,
  http_status     TEXT,
  ip              TEXT,
  title           TEXT,
  techno          TEXT,
  open_port       TEXT,
  screen          BLOB,
  phash           TEXT,
  spfdmarc        TEXT,
  ssltls          TEXT,
  method          TEXT,
  com             TEXT
);

CREATE INDEX idx_domains_program ON domains(program_id);
CREATE INDEX idx_details_domain ON domain_details(domain_id);

COMMIT;
"#;
