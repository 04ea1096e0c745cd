//! Table and JSON rendering of license views.

use licman_client::ContentStore;
use licman_core::{Address, ContentAddress, LicenseId, LicenseRecord, LicenseStatus};
use serde::Serialize;

/// Shown when a record has no reviewer.
pub const NOT_REVIEWED: &str = "N/A";

/// Shown in the admin view for records awaiting a decision.
pub const ACTIONABLE: &str = "actionable";

/// Shown where a document reference has no gateway link.
pub const NO_LINK: &str = "-";

/// One line of the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminRow {
    pub id: LicenseId,
    pub company_name: String,
    pub company_address: String,
    pub document: ContentAddress,
    /// `None` when the reference has no safe gateway form.
    pub link: Option<String>,
    pub status: LicenseStatus,
    pub submitter: Address,
    /// `actionable` while pending, else the reviewer.
    pub action: String,
}

/// One line of a submitter's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitterRow {
    pub id: LicenseId,
    pub company_name: String,
    pub status: LicenseStatus,
    pub reviewer: String,
}

fn reviewer_label(record: &LicenseRecord) -> String {
    record
        .reviewer
        .map(|r| r.short())
        .unwrap_or_else(|| NOT_REVIEWED.to_string())
}

pub fn admin_rows<S: ContentStore>(records: &[LicenseRecord], store: &S) -> Vec<AdminRow> {
    records
        .iter()
        .map(|r| AdminRow {
            id: r.id,
            company_name: r.company_name.clone(),
            company_address: r.company_address.clone(),
            document: r.document.clone(),
            link: store.link(&r.document),
            status: r.status,
            submitter: r.submitter,
            action: if r.status == LicenseStatus::Pending {
                ACTIONABLE.to_string()
            } else {
                reviewer_label(r)
            },
        })
        .collect()
}

pub fn submitter_rows(records: &[LicenseRecord]) -> Vec<SubmitterRow> {
    records
        .iter()
        .map(|r| SubmitterRow {
            id: r.id,
            company_name: r.company_name.clone(),
            status: r.status,
            reviewer: reviewer_label(r),
        })
        .collect()
}

pub fn admin_table(rows: &[AdminRow]) -> String {
    table(
        &["ID", "COMPANY", "ADDRESS", "DOCUMENT", "STATUS", "SUBMITTER", "ACTION"],
        rows.iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.company_name.clone(),
                    r.company_address.clone(),
                    document_cell(r),
                    r.status.to_string(),
                    r.submitter.short(),
                    r.action.clone(),
                ]
            })
            .collect(),
    )
}

pub fn submitter_table(rows: &[SubmitterRow]) -> String {
    table(
        &["ID", "COMPANY", "STATUS", "REVIEWER"],
        rows.iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.company_name.clone(),
                    r.status.to_string(),
                    r.reviewer.clone(),
                ]
            })
            .collect(),
    )
}

/// Every field of one record, one per line.
pub fn detail<S: ContentStore>(record: &LicenseRecord, store: &S) -> String {
    let reviewer = record
        .reviewer
        .map(|r| r.to_string())
        .unwrap_or_else(|| NOT_REVIEWED.to_string());
    [
        ("License", record.id.to_string()),
        ("Company", record.company_name.clone()),
        ("Address", record.company_address.clone()),
        ("Status", record.status.to_string()),
        ("Document", format!("{:?}", record.document.as_str())),
        ("Link", store.link(&record.document).unwrap_or_else(|| NO_LINK.to_string())),
        ("Submitter", record.submitter.to_string()),
        ("Reviewer", reviewer),
    ]
    .iter()
    .map(|(k, v)| format!("{k:<10} {v}\n"))
    .collect()
}

/// The gateway link, else the raw reference so the record stays reviewable.
fn document_cell(row: &AdminRow) -> String {
    match (&row.link, row.document.as_str()) {
        (Some(link), _) => link.clone(),
        (None, "") => NO_LINK.to_string(),
        (None, raw) => format!("{raw:?}"),
    }
}

fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "No licenses.\n".to_string();
    }
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let mut out = String::new();
    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    for row in std::iter::once(&header).chain(rows.iter()) {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use licman_client::memory::InMemoryContentStore;

    const ADMIN: Address = Address::from_bytes([0xAB; 20]);

    fn record(id: u64, status: LicenseStatus) -> LicenseRecord {
        LicenseRecord {
            id: LicenseId(id),
            company_name: "Acme".to_string(),
            company_address: "123 Main St".to_string(),
            document: ContentAddress::new("QmDoc").unwrap(),
            status,
            submitter: Address::from_bytes([0x12; 20]),
            reviewer: status.is_terminal().then_some(ADMIN),
        }
    }

    #[test]
    fn admin_rows_mark_pending_as_actionable() {
        let store = InMemoryContentStore::default();
        let rows = admin_rows(
            &[record(1, LicenseStatus::Pending), record(2, LicenseStatus::Approved)],
            &store,
        );
        assert_eq!(rows[0].action, ACTIONABLE);
        assert_eq!(rows[1].action, "0xababab");
        assert_eq!(rows[0].link.as_deref(), Some("http://127.0.0.1:8081/ipfs/QmDoc"));
    }

    #[test]
    fn admin_table_shortens_submitter() {
        let store = InMemoryContentStore::default();
        let out = admin_table(&admin_rows(&[record(1, LicenseStatus::Pending)], &store));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("0x121212 "));
        assert!(!lines[1].contains("0x12121212"));
        assert!(lines[1].ends_with(ACTIONABLE));
    }

    #[test]
    fn unlinkable_document_still_listed() {
        let store = InMemoryContentStore::default();
        let mut odd = record(6, LicenseStatus::Pending);
        odd.document = ContentAddress::from_ledger("my scan.pdf");
        let mut empty = record(7, LicenseStatus::Pending);
        empty.document = ContentAddress::from_ledger("");
        let rows = admin_rows(&[odd.clone(), empty], &store);
        assert_eq!(rows[0].link, None);
        let out = admin_table(&rows);
        assert!(out.contains("\"my scan.pdf\""));
        assert_eq!(out.lines().count(), 3);
        assert!(detail(&odd, &store).contains(&format!("{:<10} {NO_LINK}", "Link")));
    }

    #[test]
    fn submitter_rows_show_missing_reviewer() {
        let rows = submitter_rows(&[record(3, LicenseStatus::Pending)]);
        assert_eq!(rows[0].reviewer, NOT_REVIEWED);
        assert!(submitter_table(&rows).contains("PENDING"));
    }

    #[test]
    fn empty_view_says_so() {
        assert_eq!(submitter_table(&[]), "No licenses.\n");
    }

    #[test]
    fn detail_lists_full_addresses() {
        let store = InMemoryContentStore::default();
        let out = detail(&record(4, LicenseStatus::Rejected), &store);
        assert!(out.contains(&ADMIN.to_string()));
        assert!(out.contains("REJECTED"));
        assert!(out.contains("/ipfs/QmDoc"));
    }

    #[test]
    fn rows_serialize_with_full_addresses() {
        let rows = submitter_rows(&[record(5, LicenseStatus::Approved)]);
        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(json[0]["id"], 5);
        assert_eq!(json[0]["status"], "APPROVED");
    }
}
