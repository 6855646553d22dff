use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Document,
    Archive,
}

impl ExportKind {
    pub fn extension(self) -> &'static str {
        match self {
            ExportKind::Document => "pdf",
            ExportKind::Archive => "zip",
        }
    }
}

/// Rendered bytes ready for a JSON response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub encoded_buffer: String,
    pub filename: String,
}

impl ExportPayload {
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.encoded_buffer)
    }
}

/// `bingo_boards_2024-05-01.pdf`
pub fn filename(kind: ExportKind, date: NaiveDate) -> String {
    format!("bingo_boards_{}.{}", date.format("%Y-%m-%d"), kind.extension())
}

pub fn package(bytes: &[u8], kind: ExportKind, date: NaiveDate) -> ExportPayload {
    ExportPayload {
        encoded_buffer: STANDARD.encode(bytes),
        filename: filename(kind, date),
    }
}

pub fn package_today(bytes: &[u8], kind: ExportKind) -> ExportPayload {
    package(bytes, kind, Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_filenames() {
        assert_eq!(filename(ExportKind::Document, date()), "bingo_boards_2024-05-01.pdf");
        assert_eq!(filename(ExportKind::Archive, date()), "bingo_boards_2024-05-01.zip");
    }

    #[test]
    fn test_payload_is_standard_base64() -> anyhow::Result<()> {
        let payload = package(b"%PDF-1.3 \xff\xfe", ExportKind::Document, date());

        assert_eq!(payload.encoded_buffer, "JVBERi0xLjMg//4=");
        assert_eq!(payload.decode()?, b"%PDF-1.3 \xff\xfe");

        let json = serde_json::to_value(&payload)?;
        assert!(json.get("encodedBuffer").is_some());
        assert_eq!(json["filename"], "bingo_boards_2024-05-01.pdf");

        Ok(())
    }
}
