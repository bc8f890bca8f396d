//! # Export Formatters
//!
//! Read-only consumers of the database iteration API that render the
//! snapshot as CSV, JSON or hashdeep audit format.

use std::collections::HashMap;
use std::io::Write;
use std::str::FromStr;

use chrono::SecondsFormat;
use serde::Serialize;

use crate::common::{AjfsError, AjfsResult, Visit};
use crate::database::DatabaseFile;

/// Supported export formats.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Hashdeep,
}

impl FromStr for ExportFormat {
    type Err = AjfsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "hashdeep" => Ok(ExportFormat::Hashdeep),
            _ => Err(AjfsError::InvalidExpression(format!(
                "unknown export format: {value}"
            ))),
        }
    }
}

/// Renders the whole database to `out` in the requested format.
pub fn export(db: &mut DatabaseFile, format: ExportFormat, out: &mut dyn Write) -> AjfsResult<()> {
    match format {
        ExportFormat::Csv => export_csv(db, out),
        ExportFormat::Json => export_json(db, out),
        ExportFormat::Hashdeep => export_hashdeep(db, out),
    }
}

fn digests_by_index(db: &mut DatabaseFile) -> AjfsResult<HashMap<u32, Vec<u8>>> {
    if db.has_hash_table() {
        db.read_hash_table()
    } else {
        Ok(HashMap::new())
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn export_csv(db: &mut DatabaseFile, out: &mut dyn Write) -> AjfsResult<()> {
    let digests = digests_by_index(db)?;
    let algorithm = db.hash_algorithm();
    match algorithm {
        Some(algorithm) => writeln!(
            out,
            "Id,Size,Mode,ModTime,IsDir,Hash ({}),Path",
            algorithm.name().to_ascii_uppercase()
        )?,
        None => writeln!(out, "Id,Size,Mode,ModTime,IsDir,Path")?,
    }
    let mut result = Ok(());
    db.read_all_entries(|index, entry| {
        let mtime = entry.mtime.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let line = if algorithm.is_some() {
            let digest = digests.get(&index).map(hex::encode).unwrap_or_default();
            format!(
                "{},{},{},{},{},{},{}",
                entry.id_hex(),
                entry.size,
                entry.mode,
                mtime,
                entry.is_directory(),
                digest,
                csv_escape(&entry.path)
            )
        } else {
            format!(
                "{},{},{},{},{},{}",
                entry.id_hex(),
                entry.size,
                entry.mode,
                mtime,
                entry.is_directory(),
                csv_escape(&entry.path)
            )
        };
        if let Err(e) = writeln!(out, "{line}") {
            result = Err(e.into());
            return Ok(Visit::SkipAll);
        }
        Ok(Visit::Continue)
    })?;
    result
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonMeta {
    os: String,
    arch: String,
    tool: String,
    created: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonDatabase {
    version: u16,
    db_path: String,
    root: String,
    features: u16,
    entries_count: u32,
    file_count: u32,
    meta: JsonMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash_table_algo: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonEntry {
    id: String,
    path: String,
    size: u64,
    mode: u32,
    mod_time: String,
    is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
}

#[derive(Serialize)]
struct JsonDocument {
    database: JsonDatabase,
    entries: Vec<JsonEntry>,
}

fn export_json(db: &mut DatabaseFile, out: &mut dyn Write) -> AjfsResult<()> {
    let digests = digests_by_index(db)?;
    let mut entries = Vec::with_capacity(db.entries_count() as usize);
    db.read_all_entries(|index, entry| {
        entries.push(JsonEntry {
            id: entry.id_hex(),
            size: entry.size,
            mode: entry.mode,
            mod_time: entry.mtime.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            is_dir: entry.is_directory(),
            hash: digests.get(&index).map(hex::encode),
            path: entry.path,
        });
        Ok(Visit::Continue)
    })?;
    let document = JsonDocument {
        database: JsonDatabase {
            version: db.header().version,
            db_path: db.path().display().to_string(),
            root: db.root().to_string(),
            features: db.header().feature_flags,
            entries_count: db.entries_count(),
            file_count: db.file_entries_count(),
            meta: JsonMeta {
                os: db.meta().os.clone(),
                arch: db.meta().arch.clone(),
                tool: db.meta().tool.clone(),
                created: db
                    .meta()
                    .created
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            },
            hash_table_algo: db.hash_algorithm().map(|a| a.name().to_string()),
        },
        entries,
    };
    serde_json::to_writer_pretty(&mut *out, &document)
        .map_err(|e| AjfsError::IO(e.to_string()))?;
    writeln!(out)?;
    Ok(())
}

fn export_hashdeep(db: &mut DatabaseFile, out: &mut dyn Write) -> AjfsResult<()> {
    let algorithm = db.hash_algorithm().ok_or_else(|| {
        AjfsError::InvalidFormat("hashdeep export requires a hash table".into())
    })?;
    if !db.has_hash_table() {
        return Err(AjfsError::InvalidFormat(
            "hashdeep export requires a hash table".into(),
        ));
    }
    writeln!(out, "%%%% HASHDEEP-1.0")?;
    writeln!(out, "%%%% size,{},filename", algorithm.name())?;
    writeln!(out, "## Invoked from: {}", db.root())?;
    writeln!(out, "## $ ajfs export")?;
    writeln!(out, "##")?;
    let mut result = Ok(());
    db.read_entries_with_hashes(|_, entry, digest| {
        if !entry.is_file() {
            return Ok(Visit::Continue);
        }
        let line = format!("{},{},./{}", entry.size, hex::encode(digest), entry.path);
        if let Err(e) = writeln!(out, "{line}") {
            result = Err(e.into());
            return Ok(Visit::SkipAll);
        }
        Ok(Visit::Continue)
    })?;
    result
}
