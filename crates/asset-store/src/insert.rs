use crate::{BatchSummary, Db, DetailRecord, DomainId, ProgramId, StoreError};
use rusqlite::{params, OptionalExtension};
use std::collections::{BTreeMap, HashMap};

impl Db {
    /// Create a program if it does not exist yet. Re-adding is a no-op.
    pub fn add_program(&self, name: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO programs(program_name) VALUES (?)",
            params![name],
        )?;
        Ok(())
    }

    pub fn program_id(&self, name: &str) -> Result<Option<ProgramId>, StoreError> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM programs WHERE program_name = ?",
                params![name],
                |r| r.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Persist one enumeration batch in a single transaction.
    ///
    /// `records` maps hostname to its merged aggregate, `None` for hostnames
    /// the run produced no data for (these are skipped, not inserted).
    /// `ports_by_ip` is the post-pass port-scan result; every record whose IP
    /// appears there gets the same comma-joined port string.
    ///
    /// An unknown program skips the whole batch with `UnknownProgram`; any
    /// other failure rolls the transaction back — there is no partial commit.
    pub fn write_batch(
        &mut self,
        program: &str,
        records: &BTreeMap<String, Option<DetailRecord>>,
        ports_by_ip: &HashMap<String, Vec<u16>>,
    ) -> Result<BatchSummary, StoreError> {
        let tx = self.conn.transaction()?;
        let program_id: ProgramId = match tx
            .query_row(
                "SELECT id FROM programs WHERE program_name = ?",
                params![program],
                |r| r.get(0),
            )
            .optional()?
        {
            Some(id) => id,
            None => return Err(StoreError::UnknownProgram(program.to_string())),
        };

        let mut summary = BatchSummary::default();
        for (host, record) in records {
            let Some(record) = record else {
                summary.skipped += 1;
                continue;
            };
            tx.execute(
                "INSERT OR IGNORE INTO domains(program_id, domain_name) VALUES (?, ?)",
                params![program_id, host],
            )?;
            let domain_id: DomainId = tx.query_row(
                "SELECT id FROM domains WHERE domain_name = ?",
                params![host],
                |r| r.get(0),
            )?;
            let open_port = record
                .ip
                .as_deref()
                .and_then(|ip| ports_by_ip.get(ip))
                .map(|ports| {
                    ports
                        .iter()
                        .map(u16::to_string)
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .or_else(|| record.open_ports.clone());
            tx.execute(
                "INSERT INTO domain_details
                 (domain_id, http_status, ip, title, techno, open_port, screen, phash, spfdmarc, ssltls, method, com)
                 VALUES (?,?,?,?,?,?,?,?,?,?,?,?)",
                params![
                    domain_id,
                    record.http_status,
                    record.ip,
                    record.title,
                    record.technologies,
                    open_port,
                    record.screenshot,
                    record.phash,
                    record.mail_posture,
                    record.tls,
                    record.methods,
                    record.comment,
                ],
            )?;
            summary.written += 1;
        }
        tx.commit()?;
        Ok(summary)
    }

    /// Append a URL to the program's newline-joined URL list.
    pub fn append_url(&self, program: &str, url: &str) -> Result<(), StoreError> {
        let current: Option<String> = self
            .conn
            .query_row(
                "SELECT url FROM programs WHERE program_name = ?",
                params![program],
                |r| r.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::UnknownProgram(program.to_string()))?;
        let combined = match current {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, url),
            _ => url.to_string(),
        };
        self.conn.execute(
            "UPDATE programs SET url = ? WHERE program_name = ?",
            params![combined, program],
        )?;
        Ok(())
    }

    pub fn set_program_comment(&self, program: &str, comment: &str) -> Result<bool, StoreError> {
        let n = self.conn.execute(
            "UPDATE programs SET com = ? WHERE program_name = ?",
            params![comment, program],
        )?;
        Ok(n > 0)
    }

    /// Annotate a domain: updates the comment on all of its detail rows.
    pub fn set_domain_comment(&self, domain: &str, comment: &str) -> Result<bool, StoreError> {
        let n = self.conn.execute(
            "UPDATE domain_details SET com = ?
             WHERE domain_id = (SELECT id FROM domains WHERE domain_name = ?)",
            params![comment, domain],
        )?;
        Ok(n > 0)
    }

    /// Delete a program; its domains and details cascade.
    pub fn remove_program(&self, name: &str) -> Result<bool, StoreError> {
        let n = self.conn.execute(
            "DELETE FROM programs WHERE program_name = ?",
            params![name],
        )?;
        Ok(n > 0)
    }

    /// Delete one domain, or every domain below an apex when given a
    /// `*.example.com` pattern. Returns the number of domains removed.
    pub fn remove_domains(&self, pattern: &str) -> Result<usize, StoreError> {
        let n = if let Some(suffix) = pattern.strip_prefix("*.") {
            self.conn.execute(
                "DELETE FROM domains WHERE domain_name LIKE ?",
                params![format!("%.{}", suffix)],
            )?
        } else {
            self.conn.execute(
                "DELETE FROM domains WHERE domain_name = ?",
                params![pattern],
            )?
        };
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_program(name: &str) -> Db {
        let db = Db::open_in_memory().unwrap();
        db.add_program(name).unwrap();
        db
    }

    fn record(status: &str, ip: Option<&str>) -> DetailRecord {
        DetailRecord {
            http_status: Some(status.to_string()),
            ip: ip.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn add_program_is_idempotent() {
        let db = store_with_program("acme");
        db.add_program("acme").unwrap();
        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(1) FROM programs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn batch_stores_ports_for_the_records_ip_and_omits_dead_hosts() {
        let mut db = store_with_program("acme");
        let mut records = BTreeMap::new();
        records.insert(
            "a.example.com".to_string(),
            Some(record("200", Some("1.2.3.4"))),
        );
        let mut ports = HashMap::new();
        ports.insert("1.2.3.4".to_string(), vec![80, 443]);

        let summary = db.write_batch("acme", &records, &ports).unwrap();
        assert_eq!(summary.written, 1);

        let (status, open_port): (String, String) = db
            .conn
            .query_row(
                "SELECT d.http_status, d.open_port FROM domain_details d
                 JOIN domains ON domains.id = d.domain_id
                 WHERE domains.domain_name = 'a.example.com'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "200");
        assert_eq!(open_port, "80,443");

        let b_rows: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(1) FROM domains WHERE domain_name = 'b.example.com'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(b_rows, 0);
    }

    #[test]
    fn null_records_are_skipped_not_inserted() {
        let mut db = store_with_program("acme");
        let mut records = BTreeMap::new();
        records.insert("dead.example.com".to_string(), None);
        records.insert("live.example.com".to_string(), Some(record("301", None)));

        let summary = db.write_batch("acme", &records, &HashMap::new()).unwrap();
        assert_eq!(summary.written, 1);
        assert_eq!(summary.skipped, 1);

        let domains: i64 = db
            .conn
            .query_row("SELECT COUNT(1) FROM domains", [], |r| r.get(0))
            .unwrap();
        assert_eq!(domains, 1);
    }

    #[test]
    fn domain_insert_is_idempotent_across_runs() {
        let mut db = store_with_program("acme");
        let mut records = BTreeMap::new();
        records.insert("a.example.com".to_string(), Some(record("200", None)));

        db.write_batch("acme", &records, &HashMap::new()).unwrap();
        db.write_batch("acme", &records, &HashMap::new()).unwrap();

        let domains: i64 = db
            .conn
            .query_row("SELECT COUNT(1) FROM domains", [], |r| r.get(0))
            .unwrap();
        let details: i64 = db
            .conn
            .query_row("SELECT COUNT(1) FROM domain_details", [], |r| r.get(0))
            .unwrap();
        // one Domain row, one DomainDetail row per run
        assert_eq!(domains, 1);
        assert_eq!(details, 2);
    }

    #[test]
    fn unknown_program_skips_the_batch_and_writes_nothing() {
        let mut db = Db::open_in_memory().unwrap();
        let mut records = BTreeMap::new();
        records.insert("a.example.com".to_string(), Some(record("200", None)));

        let err = db
            .write_batch("ghost", &records, &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownProgram(ref name) if name == "ghost"));

        let domains: i64 = db
            .conn
            .query_row("SELECT COUNT(1) FROM domains", [], |r| r.get(0))
            .unwrap();
        assert_eq!(domains, 0);
    }

    #[test]
    fn removing_a_program_cascades() {
        let mut db = store_with_program("acme");
        let mut records = BTreeMap::new();
        records.insert("a.example.com".to_string(), Some(record("200", None)));
        db.write_batch("acme", &records, &HashMap::new()).unwrap();

        assert!(db.remove_program("acme").unwrap());
        let details: i64 = db
            .conn
            .query_row("SELECT COUNT(1) FROM domain_details", [], |r| r.get(0))
            .unwrap();
        assert_eq!(details, 0);
    }

    #[test]
    fn wildcard_removal_deletes_all_matching_domains() {
        let mut db = store_with_program("acme");
        let mut records = BTreeMap::new();
        records.insert("a.example.com".to_string(), Some(record("200", None)));
        records.insert("b.example.com".to_string(), Some(record("200", None)));
        records.insert("other.net".to_string(), Some(record("200", None)));
        db.write_batch("acme", &records, &HashMap::new()).unwrap();

        assert_eq!(db.remove_domains("*.example.com").unwrap(), 2);
        assert_eq!(db.remove_domains("other.net").unwrap(), 1);
        assert_eq!(db.remove_domains("gone.example.com").unwrap(), 0);
    }

    #[test]
    fn annotate_updates_detail_comments() {
        let mut db = store_with_program("acme");
        let mut records = BTreeMap::new();
        records.insert("a.example.com".to_string(), Some(record("200", None)));
        db.write_batch("acme", &records, &HashMap::new()).unwrap();

        assert!(db.set_domain_comment("a.example.com", "staging box").unwrap());
        assert!(!db.set_domain_comment("nope.example.com", "x").unwrap());

        let com: String = db
            .conn
            .query_row("SELECT com FROM domain_details", [], |r| r.get(0))
            .unwrap();
        assert_eq!(com, "staging box");
    }

    #[test]
    fn append_url_builds_a_newline_joined_list() {
        let db = store_with_program("acme");
        db.append_url("acme", "https://example.com/a").unwrap();
        db.append_url("acme", "https://example.com/b").unwrap();
        let urls: String = db
            .conn
            .query_row("SELECT url FROM programs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(urls, "https://example.com/a\nhttps://example.com/b");

        let err = db.append_url("ghost", "https://x").unwrap_err();
        assert!(matches!(err, StoreError::UnknownProgram(_)));
    }
}
