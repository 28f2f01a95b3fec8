//! JSONL report writer
//!
//! One JSON object per line, one line per outcome, written as outcomes
//! arrive so an interrupted run still leaves a usable report.

use crate::engine::Outcome;
use crate::policy::fetch::FetchedDocument;
use crate::policy::resolve::RedirectStep;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Report line for one fetch outcome
#[derive(Debug, Serialize)]
pub struct FetchRecord<'a> {
    pub url: &'a str,
    pub domain: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<'a> FetchRecord<'a> {
    pub fn from_outcome(outcome: &'a Outcome<String, FetchedDocument>) -> Self {
        match &outcome.result {
            Ok(doc) => Self {
                url: &outcome.url,
                domain: &outcome.domain,
                status: Some(doc.response.status),
                mime: doc.meta.mime.as_deref(),
                ext: doc.meta.ext.as_deref(),
                encoding: doc.meta.encoding.as_deref(),
                body_bytes: Some(doc.response.body.len()),
                error: None,
                message: None,
            },
            Err(err) => Self {
                url: &outcome.url,
                domain: &outcome.domain,
                status: None,
                mime: None,
                ext: None,
                encoding: None,
                body_bytes: None,
                error: Some(err.kind()),
                message: Some(err.to_string()),
            },
        }
    }
}

/// Report line for one resolve outcome
#[derive(Debug, Serialize)]
pub struct ResolveRecord<'a> {
    pub url: &'a str,
    pub domain: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirects: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<&'a [RedirectStep]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<'a> ResolveRecord<'a> {
    pub fn from_outcome(outcome: &'a Outcome<String, Vec<RedirectStep>>) -> Self {
        match &outcome.result {
            Ok(stack) => {
                let last = stack.last();
                Self {
                    url: &outcome.url,
                    domain: &outcome.domain,
                    status: last.map(|step| step.status),
                    resolved_url: last.map(|step| step.to.as_str()),
                    redirects: Some(stack.len().saturating_sub(1)),
                    stack: Some(stack),
                    error: None,
                    message: None,
                }
            }
            Err(err) => Self {
                url: &outcome.url,
                domain: &outcome.domain,
                status: None,
                resolved_url: None,
                redirects: None,
                stack: err.partial_stack(),
                error: Some(err.kind()),
                message: Some(err.to_string()),
            },
        }
    }
}

/// Line-oriented JSON report file
pub struct JsonlReport {
    writer: BufWriter<File>,
}

impl JsonlReport {
    /// Creates (truncating) the report file
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Appends one record as a JSON line
    pub fn write_record<R: Serialize>(&mut self, record: &R) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flushes buffered lines to disk
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
