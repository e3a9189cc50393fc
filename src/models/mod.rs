//! Data model for uploaded documents and extraction results.

mod document;

pub use document::{
    DocumentRecord, ExtractionMethod, ExtractionResult, LineDetail, RawDocumentRecord, TextLine,
    UploadedDocument,
};
