//! Opening book download and integrity check.
//!
//! Books live in the working directory under the name the coordinator gives
//! them. A missing book is fetched as `<source>.zip` and unpacked in place;
//! a gzip tarball served there is unpacked too, anything else is stored as
//! the book itself. Every workload re-hashes the file before the match starts.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use provisioning::{unpack_tarball, Downloader};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use worker_core::OpeningBook;

use crate::error::BookError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];

/// Where a book is downloaded from.
pub fn book_url(book: &OpeningBook) -> String {
    format!("{}.zip", book.source)
}

/// Make sure `book` is present in `dir` with the expected hash.
pub fn ensure_book(
    book: &OpeningBook,
    dir: &Path,
    downloader: &dyn Downloader,
) -> Result<PathBuf, BookError> {
    let path = dir.join(&book.name);
    if !path.is_file() {
        fetch_book(book, dir, downloader)?;
    }
    verify_book(book, &path)?;
    Ok(path)
}

fn fetch_book(book: &OpeningBook, dir: &Path, downloader: &dyn Downloader) -> Result<(), BookError> {
    let url = book_url(book);
    info!(book = %book.name, %url, "fetching opening book");
    let bytes = downloader.download(&url)?;

    if bytes.starts_with(&ZIP_MAGIC) {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).map_err(|error| BookError::Zip {
            source_url: url.clone(),
            error,
        })?;
        archive.extract(dir).map_err(|error| BookError::Zip {
            source_url: url.clone(),
            error,
        })?;
    } else if bytes.starts_with(&GZIP_MAGIC) {
        unpack_tarball(&bytes, dir).map_err(|source| BookError::Io {
            action: "unpack book into",
            path: dir.to_path_buf(),
            source,
        })?;
    } else {
        let path = dir.join(&book.name);
        return fs::write(&path, &bytes).map_err(|source| BookError::Io {
            action: "write",
            path,
            source,
        });
    }

    if !dir.join(&book.name).is_file() {
        return Err(BookError::NotInArchive {
            source_url: url,
            name: book.name.clone(),
        });
    }
    Ok(())
}

/// Hash the book at `path` and compare against the coordinator's digest.
pub fn verify_book(book: &OpeningBook, path: &Path) -> Result<(), BookError> {
    let bytes = fs::read(path).map_err(|source| BookError::Io {
        action: "read",
        path: path.to_path_buf(),
        source,
    })?;
    let actual = hex::encode(Sha256::digest(&bytes));

    if !actual.eq_ignore_ascii_case(book.sha256.trim()) {
        warn!(book = %book.name, expected = %book.sha256, %actual, "opening book hash mismatch");
        return Err(BookError::ShaMismatch {
            name: book.name.clone(),
            expected: book.sha256.clone(),
            actual,
        });
    }
    info!(book = %book.name, sha256 = %actual, "opening book verified");
    Ok(())
}

#[cfg(test)]
#[path = "book_tests.rs"]
mod book_tests;
