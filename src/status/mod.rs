//! Review-status ledger and scrape inbox.
//!
//! Two plain-text files cooperate here: the ledger, which a human edits to
//! record yes/no/maybe decisions and which is the source of truth for review
//! status, and the inbox, a transient list of URLs awaiting their first
//! scrape. The pipeline only ever appends new entries to the ledger; it
//! never rewrites or reorders what the human wrote.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Context;
use regex::Regex;
use tracing::{debug, info};

use crate::models::ReviewStatus;
use crate::repository::PropertyRepository;

/// Header written when a fresh ledger file is created.
pub const LEDGER_HEADER: &str = "# Property review ledger\n\n<!-- Status tags: [ ] = not reviewed, [YES] = interested, [NO] = not interested, [MAYBE] = maybe -->\n\n";

/// One parsed ledger line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub status: ReviewStatus,
    pub url: String,
}

fn ledger_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[(.*?)\]\s+(https?://\S+)").expect("valid pattern"))
}

/// Parse ledger text into entries, in file order.
///
/// Blank lines, comments, and lines not matching the `[TAG] url` shape are
/// ignored, as are lines with an unrecognized tag; a hand-edited file must
/// never make the run fail.
pub fn parse_ledger(text: &str) -> Vec<LedgerEntry> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let Some(caps) = ledger_line_re().captures(line.trim_start()) else {
            continue;
        };
        let Some(status) = ReviewStatus::from_tag(&caps[1]) else {
            debug!(line, "ignoring ledger line with unknown tag");
            continue;
        };
        entries.push(LedgerEntry {
            status,
            url: caps[2].to_string(),
        });
    }
    entries
}

/// Append inbox URLs not yet present in the ledger as unreviewed entries,
/// in inbox order. Returns the new ledger text and how many were added;
/// existing text is preserved verbatim.
pub fn absorb_into(ledger_text: &str, inbox_urls: &[String]) -> (String, usize) {
    let existing: HashSet<String> = parse_ledger(ledger_text)
        .into_iter()
        .map(|e| e.url)
        .collect();

    let mut out = ledger_text.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }

    let mut added = 0;
    let mut seen: HashSet<&str> = HashSet::new();
    for url in inbox_urls {
        if existing.contains(url.as_str()) || !seen.insert(url.as_str()) {
            continue;
        }
        out.push_str(ReviewStatus::Unset.to_tag());
        out.push(' ');
        out.push_str(url);
        out.push('\n');
        added += 1;
    }

    (out, added)
}

/// Report from a ledger-to-store sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records whose status column changed.
    pub updated: usize,
    /// Ledger entries with no matching record (not an error).
    pub skipped: usize,
}

/// Keeps the ledger file, the inbox file, and the store in agreement.
pub struct StatusReconciler {
    ledger_path: PathBuf,
    inbox_path: PathBuf,
}

impl StatusReconciler {
    pub fn new(ledger_path: PathBuf, inbox_path: PathBuf) -> Self {
        Self {
            ledger_path,
            inbox_path,
        }
    }

    /// Read the ledger text; a missing file is an empty ledger.
    pub fn read_ledger(&self) -> anyhow::Result<String> {
        match std::fs::read_to_string(&self.ledger_path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e).with_context(|| {
                format!("failed to read ledger {}", self.ledger_path.display())
            }),
        }
    }

    /// Push ledger statuses into the store. Entries whose URL has no record
    /// are counted as skipped and left alone.
    pub async fn sync(&self, repo: &PropertyRepository) -> anyhow::Result<SyncReport> {
        let entries = parse_ledger(&self.read_ledger()?);
        let mut report = SyncReport::default();

        for entry in &entries {
            if repo.get_by_url(&entry.url).await?.is_none() {
                report.skipped += 1;
                debug!(url = %entry.url, "ledger entry has no record yet, skipped");
                continue;
            }
            if repo.set_status(&entry.url, entry.status).await? {
                report.updated += 1;
            }
        }

        info!(
            updated = report.updated,
            skipped = report.skipped,
            "status sync complete"
        );
        Ok(report)
    }

    /// Read URLs from the inbox file, skipping comments and blank lines.
    pub fn read_inbox(&self) -> anyhow::Result<Vec<String>> {
        let text = match std::fs::read_to_string(&self.inbox_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read inbox {}", self.inbox_path.display())
                })
            }
        };

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| {
                !line.is_empty()
                    && !line.starts_with('#')
                    && !line.starts_with("<!--")
                    && line.starts_with("http")
            })
            .map(str::to_string)
            .collect())
    }

    /// Migrate successfully scraped URLs from the inbox into the ledger:
    /// append them as unreviewed entries and drop them from the inbox.
    /// URLs that failed this run are left in the inbox for the next one.
    pub fn absorb(&self, scraped_urls: &[String]) -> anyhow::Result<usize> {
        if scraped_urls.is_empty() {
            return Ok(0);
        }

        let ledger = match self.read_ledger()? {
            text if text.is_empty() => LEDGER_HEADER.to_string(),
            text => text,
        };
        let (new_ledger, added) = absorb_into(&ledger, scraped_urls);
        if let Some(parent) = self.ledger_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(&self.ledger_path)
            .with_context(|| format!("failed to write ledger {}", self.ledger_path.display()))?;
        file.write_all(new_ledger.as_bytes())?;

        self.remove_from_inbox(scraped_urls)?;

        info!(added, "absorbed inbox URLs into ledger");
        Ok(added)
    }

    fn remove_from_inbox(&self, urls: &[String]) -> anyhow::Result<()> {
        let text = match std::fs::read_to_string(&self.inbox_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let scraped: HashSet<&str> = urls.iter().map(String::as_str).collect();
        let kept: Vec<&str> = text
            .lines()
            .filter(|line| !scraped.contains(line.trim()))
            .collect();

        let mut out = kept.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        std::fs::write(&self.inbox_path, out)
            .with_context(|| format!("failed to write inbox {}", self.inbox_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_tolerant() {
        let text = "# comment\n\n[YES] https://a.example/1\nnot a ledger line\n[ ] https://a.example/2\n[LATER] https://a.example/3\n[MAYBE] https://a.example/4\n";
        let entries = parse_ledger(text);
        assert_eq!(
            entries,
            vec![
                LedgerEntry {
                    status: ReviewStatus::Yes,
                    url: "https://a.example/1".into()
                },
                LedgerEntry {
                    status: ReviewStatus::Unset,
                    url: "https://a.example/2".into()
                },
                LedgerEntry {
                    status: ReviewStatus::Maybe,
                    url: "https://a.example/4".into()
                },
            ]
        );
    }

    #[test]
    fn test_absorb_only_appends() {
        let ledger = "[YES] https://a.example/1\n[NO] https://a.example/2\n";
        let inbox = vec![
            "https://a.example/2".to_string(), // already present
            "https://a.example/3".to_string(),
            "https://a.example/3".to_string(), // duplicate inbox line
            "https://a.example/4".to_string(),
        ];

        let (new_ledger, added) = absorb_into(ledger, &inbox);
        assert_eq!(added, 2);
        // Existing content preserved verbatim, additions strictly appended.
        assert!(new_ledger.starts_with(ledger));
        assert!(new_ledger.ends_with("[ ] https://a.example/3\n[ ] https://a.example/4\n"));

        // A second absorb of the same inbox adds nothing.
        let (again, added_again) = absorb_into(&new_ledger, &inbox);
        assert_eq!(added_again, 0);
        assert_eq!(again, new_ledger);
    }

    #[test]
    fn test_reconciler_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("properties-status.md");
        let inbox_path = dir.path().join("links-to-scrap.md");
        std::fs::write(
            &inbox_path,
            "# add urls below\nhttps://a.example/1\n\nhttps://a.example/2\n",
        )
        .unwrap();

        let reconciler = StatusReconciler::new(ledger_path.clone(), inbox_path.clone());
        let inbox = reconciler.read_inbox().unwrap();
        assert_eq!(inbox, vec!["https://a.example/1", "https://a.example/2"]);

        // Only the first URL succeeded this run.
        let added = reconciler.absorb(&inbox[..1].to_vec()).unwrap();
        assert_eq!(added, 1);

        let ledger = std::fs::read_to_string(&ledger_path).unwrap();
        assert!(ledger.starts_with("# Property review ledger"));
        assert!(ledger.contains("[ ] https://a.example/1"));
        assert!(!ledger.contains("https://a.example/2"));

        // Failed URL stays in the inbox; the comment line survives.
        let inbox_text = std::fs::read_to_string(&inbox_path).unwrap();
        assert!(inbox_text.contains("# add urls below"));
        assert!(!inbox_text.contains("https://a.example/1"));
        assert!(inbox_text.contains("https://a.example/2"));
    }
}
