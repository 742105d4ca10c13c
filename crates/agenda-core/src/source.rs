use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info};

use crate::item::CalendarItem;

/// Read-only view of the item list owned by the surrounding application.
///
/// The file holds one JSON item per line, or a single JSON array.
#[derive(Debug)]
pub struct ItemSource {
    pub path: PathBuf,
}

impl ItemSource {
    #[tracing::instrument(skip(path))]
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            return Err(anyhow!("item file not found: {}", path.display()));
        }

        info!(path = %path.display(), "opened item source");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_items(&self) -> anyhow::Result<Vec<CalendarItem>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;

        let items = if text.trim_start().starts_with('[') {
            serde_json::from_str::<Vec<CalendarItem>>(&text)
                .with_context(|| format!("invalid item array in {}", self.path.display()))?
        } else {
            load_jsonl(&self.path)?
        };

        debug!(count = items.len(), "loaded items");
        Ok(items)
    }
}

fn load_jsonl(path: &Path) -> anyhow::Result<Vec<CalendarItem>> {
    let file =
        fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let item: CalendarItem = serde_json::from_str(&line).with_context(|| {
            format!(
                "invalid item on line {} of {}",
                idx + 1,
                path.display()
            )
        })?;
        out.push(item);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::item::Status;

    const WORKSHOP: &str = r#"{"id":"1","title":"Workshop de Inovação Digital","date":"2025-05-15","start_time":"09:00","end_time":"17:00","space_id":"aud1","status":"approved"}"#;
    const FORUM: &str = r#"{"id":"3","title":"Fórum ESG e Sustentabilidade","date":"2025-06-05","start_time":"10:00","end_time":"16:00","space_id":"esp1","status":"under-review","audience":"Híbrido"}"#;

    #[test]
    fn loads_json_lines_skipping_blanks() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "{WORKSHOP}").expect("write");
        writeln!(file).expect("write");
        writeln!(file, "{FORUM}").expect("write");

        let source = ItemSource::open(file.path()).expect("open");
        let items = source.load_items().expect("load");

        assert_eq!(items.len(), 2);
        assert_eq!(items[1].status, Status::UnderReview);
        assert_eq!(items[1].audience.as_deref(), Some("Híbrido"));
    }

    #[test]
    fn loads_json_array() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "[{WORKSHOP},\n{FORUM}]").expect("write");

        let items = ItemSource::open(file.path())
            .expect("open")
            .load_items()
            .expect("load");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "1");
    }

    #[test]
    fn reports_failing_line() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "{WORKSHOP}").expect("write");
        writeln!(
            file,
            r#"{{"id":"9","title":"bad","date":"2025-02-30","start_time":"09:00","end_time":"10:00","space_id":"aud1","status":"approved"}}"#
        )
        .expect("write");

        let err = ItemSource::open(file.path())
            .expect("open")
            .load_items()
            .expect_err("invalid date");
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(ItemSource::open(&dir.path().join("missing.jsonl")).is_err());
    }
}
