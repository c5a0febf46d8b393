//! Source extraction and chunking

mod chunker;
mod extractor;
mod web;

pub use chunker::{chunk_text, TextChunker};
pub use extractor::{
    extract_text, too_large_message, FileKind, UploadedFile, UNSUPPORTED_TYPE_MESSAGE,
};
pub use web::{collapse_whitespace, extract_readable_text, parse_url, WebScraper};
