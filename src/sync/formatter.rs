// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use thiserror::Error;

use crate::record::{IndexDocument, SearchableRecord};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("cannot format record {id}: {reason}")]
    Invalid { id: i64, reason: String },
    #[error("formatter produced document {document} for record {record}")]
    IdMismatch { record: i64, document: i64 },
}

/// Maps one record to the document pushed for it.
///
/// Closures `Fn(&SearchableRecord) -> Result<IndexDocument, FormatError>`
/// implement this directly.
pub trait RecordFormatter: Send + Sync {
    fn format(&self, record: &SearchableRecord) -> Result<IndexDocument, FormatError>;
}

impl<F> RecordFormatter for F
where
    F: Fn(&SearchableRecord) -> Result<IndexDocument, FormatError> + Send + Sync,
{
    fn format(&self, record: &SearchableRecord) -> Result<IndexDocument, FormatError> {
        self(record)
    }
}

/// Copies `language`, `title` and every free-form field onto the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughFormatter;

impl RecordFormatter for PassThroughFormatter {
    fn format(&self, record: &SearchableRecord) -> Result<IndexDocument, FormatError> {
        let mut document = IndexDocument::new(record.id)
            .field("language", record.language.clone())
            .field("title", record.title.clone());
        for (name, value) in &record.fields {
            document = document.field(name.clone(), value.clone());
        }
        Ok(document)
    }
}

/// Format and check the document keeps the record's id.
pub(crate) fn format_checked(
    formatter: &dyn RecordFormatter,
    record: &SearchableRecord,
) -> Result<IndexDocument, FormatError> {
    let document = formatter.format(record)?;
    if document.id != record.id {
        return Err(FormatError::IdMismatch {
            record: record.id,
            document: document.id,
        });
    }
    Ok(document)
}
