use crate::classify::{classify, ActivityType};
use crate::extract::{extract_row, Extraction, FillDown, RowFields};
use crate::group::{group_by_student, Extracted};
use crate::header::{resolve_header, DEFAULT_HEADER_SCAN_ROWS};
use crate::model::{Activity, BatchEntry};
use crate::workbook::{decode_workbook, SheetGrid};
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const TEMP_FILE_PREFIX: &str = "~$";

pub const DEFAULT_EXTENSIONS: &[&str] = &["xlsx", "xls", "xlsm", "xlsb", "ods"];

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub header_scan_rows: usize,
    pub extensions: Vec<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl IngestOptions {
    /// Spreadsheet extension and not an office lock/temp file.
    pub fn accepts(&self, file_name: &str) -> bool {
        if file_name.starts_with(TEMP_FILE_PREFIX) {
            return false;
        }
        let Some(ext) = Path::new(file_name).extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A unit that was skipped, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestIssue {
    pub code: &'static str,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub batch: Vec<BatchEntry>,
    pub files_processed: usize,
    pub failures: Vec<IngestIssue>,
    pub warnings: Vec<IngestIssue>,
}

fn build_activity(kind: ActivityType, file: &str, sheet: &str, fields: RowFields) -> Activity {
    let volunteer = kind == ActivityType::Volunteer;
    let only_volunteer = |v: String| if volunteer { v } else { String::new() };
    Activity {
        kind,
        source: file.to_string(),
        sheet: sheet.to_string(),
        content: fields.content,
        time: fields.time,
        date: fields.date,
        start_date: only_volunteer(fields.start_date),
        end_date: only_volunteer(fields.end_date),
        area: only_volunteer(fields.area),
        school_type: only_volunteer(fields.school_type),
        place: only_volunteer(fields.place),
    }
}

/// Extracts every identifiable row of one sheet. Fill-down state starts fresh
/// here and never leaves the sheet.
pub fn extract_sheet(
    file_name: &str,
    kind: ActivityType,
    sheet: &SheetGrid,
    header_scan_rows: usize,
) -> Result<Vec<Extracted>, IngestIssue> {
    let Some(header) = resolve_header(&sheet.rows, header_scan_rows) else {
        return Err(IngestIssue {
            code: "sheet_header_not_found",
            file: file_name.to_string(),
            sheet: Some(sheet.name.clone()),
            message: format!("no header row within the first {header_scan_rows} rows"),
        });
    };

    let mut out = Vec::new();
    let mut carry = FillDown::default();
    for row in sheet.rows.iter().skip(header.row_index + 1) {
        let extraction = extract_row(row, &header.columns, &carry);
        carry = extraction.carry().clone();
        if let Extraction::Identified { id, fields, .. } = extraction {
            let name = fields.name.clone();
            out.push(Extracted {
                id,
                name,
                activity: build_activity(kind, file_name, &sheet.name, fields),
            });
        }
    }
    debug!(
        file = file_name,
        sheet = %sheet.name,
        kind = kind.as_str(),
        header_row = header.row_index,
        rows = out.len(),
        "sheet extracted"
    );
    Ok(out)
}

fn extract_workbook(
    file_name: &str,
    sheets: &[SheetGrid],
    opts: &IngestOptions,
    warnings: &mut Vec<IngestIssue>,
) -> Vec<Extracted> {
    let kind = classify(file_name);
    let mut out = Vec::new();
    for sheet in sheets {
        if sheet.rows.len() < 2 {
            continue;
        }
        match extract_sheet(file_name, kind, sheet, opts.header_scan_rows) {
            Ok(rows) => out.extend(rows),
            Err(issue) => {
                warn!(file = file_name, sheet = %sheet.name, "could not find headers; sheet skipped");
                warnings.push(issue);
            }
        }
    }
    out
}

/// Parses files in the given order into a batch. Files that are not
/// spreadsheets are skipped silently; files that fail to decode are reported
/// and skipped.
pub fn ingest_files(files: &[SourceFile], opts: &IngestOptions) -> IngestReport {
    let mut report = IngestReport::default();
    let mut rows = Vec::new();
    for file in files {
        if !opts.accepts(&file.name) {
            continue;
        }
        match decode_workbook(&file.bytes) {
            Ok(sheets) => {
                rows.extend(extract_workbook(&file.name, &sheets, opts, &mut report.warnings));
                report.files_processed += 1;
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(file = %file.name, error = %message, "failed to parse file; skipped");
                report.failures.push(IngestIssue {
                    code: "file_read_failed",
                    file: file.name.clone(),
                    sheet: None,
                    message,
                });
            }
        }
    }
    report.batch = group_by_student(rows);
    info!(
        files = report.files_processed,
        students = report.batch.len(),
        failures = report.failures.len(),
        warnings = report.warnings.len(),
        "ingest finished"
    );
    report
}

/// Every regular file below `folder`, sorted by path. Only an unreadable
/// `folder` itself is an error; unreadable subdirectories and entries are
/// logged and skipped. Symlinked directories are not followed.
pub fn collect_folder(folder: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut pending = vec![folder.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if dir.as_path() == folder => {
                return Err(e).with_context(|| format!("read folder {}", folder.display()));
            }
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "unreadable folder; skipped");
                continue;
            }
        };
        for ent in entries {
            let ent = match ent {
                Ok(ent) => ent,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "unreadable folder entry; skipped");
                    continue;
                }
            };
            let p = ent.path();
            let file_type = match ent.file_type() {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "unreadable folder entry; skipped");
                    continue;
                }
            };
            if file_type.is_dir() {
                pending.push(p);
            } else if file_type.is_file() || (file_type.is_symlink() && p.is_file()) {
                out.push(p);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Reads accepted files from disk, keeping order. Unreadable files become
/// `file_read_failed` issues.
pub fn read_sources(paths: &[PathBuf], opts: &IngestOptions) -> (Vec<SourceFile>, Vec<IngestIssue>) {
    let mut files = Vec::new();
    let mut failures = Vec::new();
    for path in paths {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if !opts.accepts(&name) {
            continue;
        }
        match std::fs::read(path) {
            Ok(bytes) => files.push(SourceFile { name, bytes }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read file; skipped");
                failures.push(IngestIssue {
                    code: "file_read_failed",
                    file: name,
                    sheet: None,
                    message: e.to_string(),
                });
            }
        }
    }
    (files, failures)
}
