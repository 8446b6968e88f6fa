use crate::{Db, DetailRecord, DomainDetailRow, ProgramId, ProgramRow, StoreError};
use rusqlite::params;

/// Detail columns the `list` filters may reference.
const FILTER_COLUMNS: &[&str] = &[
    "http_status", "techno", "ip", "title", "open_port", "spfdmarc", "ssltls", "method", "com",
];

/// Parse `"http_status:200,techno:nginx"` into (column, substring) pairs.
/// Unknown columns are dropped rather than interpolated into SQL.
pub fn parse_filters(spec: &str) -> Vec<(String, String)> {
    spec.split(',')
        .filter_map(|item| {
            let (key, value) = item.split_once(':')?;
            let key = key.trim();
            if FILTER_COLUMNS.contains(&key) {
                Some((key.to_string(), value.trim().to_string()))
            } else {
                None
            }
        })
        .collect()
}

impl Db {
    pub fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        let cnt: i64 = self.conn.query_row(
            "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name=?",
            [name],
            |r| r.get(0),
        )?;
        Ok(cnt > 0)
    }

    pub fn list_programs(&self) -> Result<Vec<ProgramRow>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, program_name, com, url FROM programs ORDER BY program_name")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(ProgramRow {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    comment: r.get(2)?,
                    urls: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn require_program(&self, program: &str) -> Result<ProgramId, StoreError> {
        self.program_id(program)?
            .ok_or_else(|| StoreError::UnknownProgram(program.to_string()))
    }

    /// Domain names for a program, optionally narrowed by detail-column
    /// filters (substring match, all filters must hold).
    pub fn list_domains(
        &self,
        program: &str,
        filters: &[(String, String)],
    ) -> Result<Vec<String>, StoreError> {
        let program_id = self.require_program(program)?;
        if filters.is_empty() {
            let mut stmt = self.conn.prepare(
                "SELECT domain_name FROM domains WHERE program_id = ? ORDER BY domain_name",
            )?;
            let rows = stmt
                .query_map(params![program_id], |r| r.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(rows);
        }

        let mut sql = String::from(
            "SELECT DISTINCT domains.domain_name
             FROM domains
             INNER JOIN domain_details ON domains.id = domain_details.domain_id
             WHERE domains.program_id = ?",
        );
        let mut bound: Vec<rusqlite::types::Value> = vec![program_id.into()];
        for (column, value) in filters {
            // columns come from the parse_filters allowlist
            sql.push_str(&format!(" AND domain_details.{} LIKE ?", column));
            bound.push(format!("%{}%", value).into());
        }
        sql.push_str(" ORDER BY domains.domain_name");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(bound), |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Distinct resolved IPs for a program, optionally filtered.
    pub fn list_ips(
        &self,
        program: &str,
        filters: &[(String, String)],
    ) -> Result<Vec<String>, StoreError> {
        let program_id = self.require_program(program)?;
        let mut sql = String::from(
            "SELECT DISTINCT domain_details.ip
             FROM domain_details
             JOIN domains ON domains.id = domain_details.domain_id
             WHERE domains.program_id = ? AND domain_details.ip IS NOT NULL",
        );
        let mut bound: Vec<rusqlite::types::Value> = vec![program_id.into()];
        for (column, value) in filters {
            sql.push_str(&format!(" AND domain_details.{} LIKE ?", column));
            bound.push(format!("%{}%", value).into());
        }
        sql.push_str(" ORDER BY domain_details.ip");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(bound), |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The program's aggregated URL list, one URL per line.
    pub fn list_urls(&self, program: &str) -> Result<Vec<String>, StoreError> {
        let program_id = self.require_program(program)?;
        let urls: Option<String> = self.conn.query_row(
            "SELECT url FROM programs WHERE id = ?",
            params![program_id],
            |r| r.get(0),
        )?;
        Ok(urls
            .map(|u| u.lines().map(str::to_string).collect())
            .unwrap_or_default())
    }

    pub fn domain_count(&self, program: &str) -> Result<i64, StoreError> {
        let program_id = self.require_program(program)?;
        let n = self.conn.query_row(
            "SELECT COUNT(1) FROM domains WHERE program_id = ?",
            params![program_id],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    /// All detail rows for a program: screenshot-bearing rows first, then by
    /// HTTP status (200, other, none). Callers decide which rows to display.
    pub fn details_for(&self, program: &str) -> Result<Vec<DomainDetailRow>, StoreError> {
        let program_id = self.require_program(program)?;
        let mut stmt = self.conn.prepare(
            "SELECT domains.domain_name, d.http_status, d.ip, d.title, d.techno, d.open_port,
                    d.screen, d.phash, d.spfdmarc, d.ssltls, d.method, d.com
             FROM domains
             INNER JOIN domain_details d ON domains.id = d.domain_id
             WHERE domains.program_id = ?
             ORDER BY d.screen IS NOT NULL DESC,
                      CASE
                         WHEN d.http_status = '200' THEN 1
                         WHEN d.http_status IS NULL THEN 3
                         ELSE 2
                      END",
        )?;
        let rows = stmt
            .query_map(params![program_id], row_to_detail)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Substring search across the domain name and every detail column,
    /// screenshot-bearing rows first.
    pub fn search(&self, program: &str, text: &str) -> Result<Vec<DomainDetailRow>, StoreError> {
        let program_id = self.require_program(program)?;
        let needle = format!("%{}%", text);
        let mut stmt = self.conn.prepare(
            "SELECT domains.domain_name, d.http_status, d.ip, d.title, d.techno, d.open_port,
                    d.screen, d.phash, d.spfdmarc, d.ssltls, d.method, d.com
             FROM domains
             INNER JOIN domain_details d ON domains.id = d.domain_id
             WHERE domains.program_id = ?1
             AND (
                 domains.domain_name LIKE ?2
                 OR d.http_status LIKE ?2 OR d.ip LIKE ?2 OR d.title LIKE ?2
                 OR d.techno LIKE ?2 OR d.open_port LIKE ?2 OR d.spfdmarc LIKE ?2
                 OR d.ssltls LIKE ?2 OR d.method LIKE ?2 OR d.com LIKE ?2
             )
             ORDER BY d.screen IS NOT NULL DESC, d.ip IS NOT NULL DESC",
        )?;
        let rows = stmt
            .query_map(params![program_id, needle], row_to_detail)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_detail(r: &rusqlite::Row<'_>) -> rusqlite::Result<DomainDetailRow> {
    Ok(DomainDetailRow {
        domain: r.get(0)?,
        detail: DetailRecord {
            http_status: r.get(1)?,
            ip: r.get(2)?,
            title: r.get(3)?,
            technologies: r.get(4)?,
            open_ports: r.get(5)?,
            screenshot: r.get(6)?,
            phash: r.get(7)?,
            mail_posture: r.get(8)?,
            tls: r.get(9)?,
            methods: r.get(10)?,
            comment: r.get(11)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    fn seeded() -> Db {
        let mut db = Db::open_in_memory().unwrap();
        db.add_program("acme").unwrap();
        let mut records = BTreeMap::new();
        records.insert(
            "app.example.com".to_string(),
            Some(DetailRecord {
                http_status: Some("200".to_string()),
                ip: Some("1.2.3.4".to_string()),
                technologies: Some("Nginx, React".to_string()),
                screenshot: Some("aGVsbG8=".to_string()),
                phash: Some("abcd".to_string()),
                ..Default::default()
            }),
        );
        records.insert(
            "old.example.com".to_string(),
            Some(DetailRecord {
                http_status: Some("404".to_string()),
                ip: Some("1.2.3.4".to_string()),
                technologies: Some("Apache".to_string()),
                ..Default::default()
            }),
        );
        db.write_batch("acme", &records, &HashMap::new()).unwrap();
        db
    }

    #[test]
    fn filters_drop_unknown_columns() {
        let filters = parse_filters("http_status:200,evil) OR 1=1 --:x,techno:nginx");
        assert_eq!(
            filters,
            vec![
                ("http_status".to_string(), "200".to_string()),
                ("techno".to_string(), "nginx".to_string()),
            ]
        );
    }

    #[test]
    fn list_domains_applies_filters() {
        let db = seeded();
        let all = db.list_domains("acme", &[]).unwrap();
        assert_eq!(all, vec!["app.example.com", "old.example.com"]);

        let filtered = db
            .list_domains("acme", &parse_filters("http_status:200"))
            .unwrap();
        assert_eq!(filtered, vec!["app.example.com"]);

        let both = db
            .list_domains("acme", &parse_filters("http_status:200,techno:React"))
            .unwrap();
        assert_eq!(both, vec!["app.example.com"]);
    }

    #[test]
    fn list_ips_is_distinct() {
        let db = seeded();
        assert_eq!(db.list_ips("acme", &[]).unwrap(), vec!["1.2.3.4"]);
    }

    #[test]
    fn unknown_program_is_a_typed_error() {
        let db = seeded();
        assert!(matches!(
            db.list_domains("ghost", &[]),
            Err(StoreError::UnknownProgram(_))
        ));
    }

    #[test]
    fn search_orders_screenshot_rows_first() {
        let db = seeded();
        let hits = db.search("acme", "example").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].domain, "app.example.com");
        assert!(hits[0].detail.screenshot.is_some());

        let techno_hits = db.search("acme", "Apache").unwrap();
        assert_eq!(techno_hits.len(), 1);
        assert_eq!(techno_hits[0].domain, "old.example.com");
    }

    #[test]
    fn details_order_prefers_screenshots_then_200() {
        let db = seeded();
        let rows = db.details_for("acme").unwrap();
        assert_eq!(rows[0].domain, "app.example.com");
    }

    #[test]
    fn count_and_urls() {
        let db = seeded();
        assert_eq!(db.domain_count("acme").unwrap(), 2);
        assert!(db.list_urls("acme").unwrap().is_empty());
        db.append_url("acme", "https://app.example.com/login").unwrap();
        assert_eq!(
            db.list_urls("acme").unwrap(),
            vec!["https://app.example.com/login"]
        );
    }
}
