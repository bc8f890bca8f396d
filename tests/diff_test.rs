mod common;

use ajfs::common::{AjfsError, AjfsResult, Visit};
use ajfs::database::DatabaseFile;
use ajfs::diff::{diff_databases, tosync, Diff, DiffOptions, ToSyncMode};
use ajfs::hashing::HashAlgorithm;
use ajfs::path_entry::PathEntry;

use common::{build_db, build_hashed_db, dir_entry, fake_digest, file_entry, timestamp};

fn collect_lines(
    lhs: &mut DatabaseFile,
    rhs: &mut DatabaseFile,
    options: &DiffOptions,
) -> AjfsResult<Vec<String>> {
    let mut lines = Vec::new();
    diff_databases(lhs, rhs, options, |diff| {
        if !matches!(diff, Diff::Nothing(_)) {
            lines.push(diff.format_line());
        }
        Ok(Visit::Continue)
    })?;
    Ok(lines)
}

#[test]
fn test_diff_categories_and_flags() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let lhs_path = dir.path().join("lhs.ajfs");
    let rhs_path = dir.path().join("rhs.ajfs");

    let mut mode_changed = file_entry("both/7.txt", 7);
    mode_changed.mode |= 0o111;
    let mut time_changed = file_entry("both/8.txt", 8);
    time_changed.mtime = timestamp(23, 59, 59);

    let lhs_entries = vec![
        dir_entry("."),
        dir_entry("quick"),
        file_entry("quick/1.txt", 1),
        file_entry("quick/2.txt", 2),
        dir_entry("dir1"),
        file_entry("dir1/lhs-only", 5),
        dir_entry("both"),
        file_entry("both/6.txt", 600),
        mode_changed,
        time_changed,
    ];
    let rhs_entries = vec![
        dir_entry("."),
        dir_entry("fox"),
        file_entry("fox/3.txt", 3),
        dir_entry("hole"),
        file_entry("hole/4.txt", 4),
        dir_entry("dir2"),
        file_entry("dir2/rhs-only", 5),
        dir_entry("both"),
        file_entry("both/6.txt", 601),
        file_entry("both/7.txt", 7),
        file_entry("both/8.txt", 8),
    ];
    build_db(&lhs_path, dir.path(), &lhs_entries)?;
    build_db(&rhs_path, dir.path(), &rhs_entries)?;

    let mut lhs = DatabaseFile::open(&lhs_path)?;
    let mut rhs = DatabaseFile::open(&rhs_path)?;
    let mut lines = collect_lines(&mut lhs, &mut rhs, &DiffOptions::default())?;
    lines.sort();

    let mut expected: Vec<String> = [
        "d---- quick",
        "f---- quick/1.txt",
        "f---- quick/2.txt",
        "d---- dir1",
        "f---- dir1/lhs-only",
        "d++++ fox",
        "f++++ fox/3.txt",
        "d++++ hole",
        "f++++ hole/4.txt",
        "d++++ dir2",
        "f++++ dir2/rhs-only",
        "f~s~~ both/6.txt",
        "fm~~~ both/7.txt",
        "f~~l~ both/8.txt",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    expected.sort();
    assert_eq!(expected, lines);
    lhs.close()?;
    rhs.close()
}

#[test]
fn test_one_sided_ordering() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let lhs_path = dir.path().join("lhs.ajfs");
    let rhs_path = dir.path().join("rhs.ajfs");
    build_db(
        &lhs_path,
        dir.path(),
        &[
            dir_entry("."),
            file_entry("zebra.txt", 1),
            file_entry("alpha.txt", 1),
            file_entry("mid.txt", 1),
        ],
    )?;
    build_db(&rhs_path, dir.path(), &[dir_entry("."), file_entry("extra.txt", 1)])?;

    let mut lhs = DatabaseFile::open(&lhs_path)?;
    let mut rhs = DatabaseFile::open(&rhs_path)?;
    let options = DiffOptions {
        one_sided: true,
        with_hashes: false,
    };
    let lines = collect_lines(&mut lhs, &mut rhs, &options)?;
    // Left-only results arrive sorted by path; the right-only extra is
    // suppressed entirely.
    assert_eq!(
        vec!["f---- alpha.txt", "f---- mid.txt", "f---- zebra.txt"],
        lines
    );
    lhs.close()?;
    rhs.close()
}

#[test]
fn test_hash_difference_is_reported() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let lhs_path = dir.path().join("lhs.ajfs");
    let rhs_path = dir.path().join("rhs.ajfs");
    let algorithm = HashAlgorithm::Sha1;
    let entries = vec![dir_entry("."), file_entry("changed.txt", 484)];
    build_hashed_db(
        &lhs_path,
        dir.path(),
        &entries,
        algorithm,
        &[("changed.txt", fake_digest(0x0a, algorithm))],
    )?;
    build_hashed_db(
        &rhs_path,
        dir.path(),
        &entries,
        algorithm,
        &[("changed.txt", fake_digest(0x0b, algorithm))],
    )?;

    let mut lhs = DatabaseFile::open(&lhs_path)?;
    let mut rhs = DatabaseFile::open(&rhs_path)?;
    let options = DiffOptions {
        one_sided: false,
        with_hashes: true,
    };
    let lines = collect_lines(&mut lhs, &mut rhs, &options)?;
    assert_eq!(vec!["f~~~x changed.txt"], lines);
    lhs.close()?;
    rhs.close()
}

#[test]
fn test_differing_algorithms_skip_hash_comparison() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let lhs_path = dir.path().join("lhs.ajfs");
    let rhs_path = dir.path().join("rhs.ajfs");
    let entries = vec![dir_entry("."), file_entry("same.txt", 10)];
    build_hashed_db(
        &lhs_path,
        dir.path(),
        &entries,
        HashAlgorithm::Sha1,
        &[("same.txt", fake_digest(0x01, HashAlgorithm::Sha1))],
    )?;
    build_hashed_db(
        &rhs_path,
        dir.path(),
        &entries,
        HashAlgorithm::Sha256,
        &[("same.txt", fake_digest(0x02, HashAlgorithm::Sha256))],
    )?;

    let mut lhs = DatabaseFile::open(&lhs_path)?;
    let mut rhs = DatabaseFile::open(&rhs_path)?;
    let options = DiffOptions {
        one_sided: false,
        with_hashes: true,
    };
    // Digests differ but the algorithms do too, so no hash bit is raised.
    let lines = collect_lines(&mut lhs, &mut rhs, &options)?;
    assert!(lines.is_empty());
    lhs.close()?;
    rhs.close()
}

#[test]
fn test_tosync_suppresses_mode_and_time_drift() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let lhs_path = dir.path().join("lhs.ajfs");
    let rhs_path = dir.path().join("rhs.ajfs");

    let mut mode_changed = file_entry("modechange.txt", 10);
    mode_changed.mode |= 0o100;
    let mut time_changed = file_entry("timechange.txt", 10);
    time_changed.mtime = timestamp(12, 0, 0);

    build_db(
        &lhs_path,
        dir.path(),
        &[
            dir_entry("."),
            file_entry("only-left.txt", 1),
            mode_changed,
            file_entry("sizechange.txt", 20),
            time_changed,
        ],
    )?;
    build_db(
        &rhs_path,
        dir.path(),
        &[
            dir_entry("."),
            file_entry("modechange.txt", 10),
            file_entry("sizechange.txt", 21),
            file_entry("timechange.txt", 10),
            file_entry("right-only.txt", 3),
        ],
    )?;

    let mut lhs = DatabaseFile::open(&lhs_path)?;
    let mut rhs = DatabaseFile::open(&rhs_path)?;
    let mut lines = Vec::new();
    tosync(&mut lhs, &mut rhs, ToSyncMode::Entries, |diff| {
        lines.push(diff.format_line());
        Ok(Visit::Continue)
    })?;
    assert_eq!(vec!["f---- only-left.txt", "f~s~~ sizechange.txt"], lines);
    lhs.close()?;
    rhs.close()
}

#[test]
fn test_tosync_hash_mode_reports_orphan_digests() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let lhs_path = dir.path().join("lhs.ajfs");
    let rhs_path = dir.path().join("rhs.ajfs");
    let algorithm = HashAlgorithm::Sha1;
    let shared = fake_digest(0x33, algorithm);
    build_hashed_db(
        &lhs_path,
        dir.path(),
        &[
            dir_entry("."),
            file_entry("orphan.bin", 9),
            file_entry("kept.bin", 9),
        ],
        algorithm,
        &[
            ("orphan.bin", fake_digest(0x22, algorithm)),
            ("kept.bin", shared.clone()),
        ],
    )?;
    build_hashed_db(
        &rhs_path,
        dir.path(),
        &[dir_entry("."), file_entry("renamed.bin", 9)],
        algorithm,
        &[("renamed.bin", shared)],
    )?;

    let mut lhs = DatabaseFile::open(&lhs_path)?;
    let mut rhs = DatabaseFile::open(&rhs_path)?;
    let mut lines = Vec::new();
    tosync(&mut lhs, &mut rhs, ToSyncMode::OnlyHashes, |diff| {
        lines.push(diff.format_line());
        Ok(Visit::Continue)
    })?;
    // The content of kept.bin exists on the right under a different path, so
    // only the orphan digest is reported.
    assert_eq!(vec!["f---- orphan.bin"], lines);
    lhs.close()?;
    rhs.close()
}

#[test]
fn test_tosync_hash_mode_rejects_mixed_algorithms() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let lhs_path = dir.path().join("lhs.ajfs");
    let rhs_path = dir.path().join("rhs.ajfs");
    build_hashed_db(
        &lhs_path,
        dir.path(),
        &[dir_entry("."), file_entry("a.bin", 1)],
        HashAlgorithm::Sha1,
        &[("a.bin", fake_digest(0x01, HashAlgorithm::Sha1))],
    )?;
    build_hashed_db(
        &rhs_path,
        dir.path(),
        &[dir_entry("."), file_entry("a.bin", 1)],
        HashAlgorithm::Sha256,
        &[("a.bin", fake_digest(0x02, HashAlgorithm::Sha256))],
    )?;

    let mut lhs = DatabaseFile::open(&lhs_path)?;
    let mut rhs = DatabaseFile::open(&rhs_path)?;
    let result = tosync(&mut lhs, &mut rhs, ToSyncMode::OnlyHashes, |_| {
        Ok(Visit::Continue)
    });
    match result {
        Err(e @ AjfsError::AlgorithmMismatch(_, _)) => {
            assert!(e.to_string().contains("can't compare the two databases"));
        }
        other => panic!("expected AlgorithmMismatch, got {other:?}"),
    }
    lhs.close()?;
    rhs.close()
}

#[test]
fn test_visitor_skip_all_stops_the_diff() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let lhs_path = dir.path().join("lhs.ajfs");
    let rhs_path = dir.path().join("rhs.ajfs");
    let entries: Vec<PathEntry> = (0..10)
        .map(|i| file_entry(&format!("file-{i}.txt"), i))
        .collect();
    build_db(&lhs_path, dir.path(), &entries)?;
    build_db(&rhs_path, dir.path(), &[])?;

    let mut lhs = DatabaseFile::open(&lhs_path)?;
    let mut rhs = DatabaseFile::open(&rhs_path)?;
    let mut visited = 0;
    diff_databases(&mut lhs, &mut rhs, &DiffOptions::default(), |_| {
        visited += 1;
        Ok(if visited == 3 {
            Visit::SkipAll
        } else {
            Visit::Continue
        })
    })?;
    assert_eq!(3, visited);
    lhs.close()?;
    rhs.close()
}
