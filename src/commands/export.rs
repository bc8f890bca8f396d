//! Driver for `export`: renders a database as CSV, JSON or hashdeep.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::common::AjfsResult;
use crate::database::DatabaseFile;
use crate::export::{export, ExportFormat};

use super::CommonConfig;

#[derive(Debug)]
pub struct ExportArgs {
    pub db: PathBuf,
    pub output: PathBuf,
    pub format: ExportFormat,
}

pub fn run(args: &ExportArgs, _config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    let mut db = DatabaseFile::open(&args.db)?;
    if args.output.as_os_str() == "-" {
        export(&mut db, args.format, out)?;
    } else {
        let file = File::create(&args.output)?;
        let mut writer = BufWriter::new(file);
        export(&mut db, args.format, &mut writer)?;
        writer.flush()?;
        writeln!(
            out,
            "exported {} entries to {}",
            db.entries_count(),
            args.output.display()
        )?;
    }
    db.close()
}
