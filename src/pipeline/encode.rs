//! Output encoding: PNG bytes → base64, `data:` URLs and zip archives.
//!
//! Web clients drop a `data:image/png;base64,…` string straight into an
//! `<img src>`, so that is the default JSON shape. Carousel downloads are
//! packed into a single stored (uncompressed) zip: PNG is already deflated and
//! a second pass only costs CPU.

use crate::error::FlyerError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::{Cursor, Write};
use tracing::debug;

/// Plain base64 of `bytes`.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// `data:<mime>;base64,<payload>`.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", to_base64(bytes))
}

/// PNG bytes as a `data:image/png;base64,` URL.
pub fn to_data_url(png: &[u8]) -> String {
    data_url("image/png", png)
}

/// Name of the `n`th (1-based) slide inside a carousel archive.
pub fn slide_entry_name(n: usize) -> String {
    format!("slide-{n}.png")
}

/// Pack slides into a zip archive with entries `slide-1.png`, `slide-2.png`, ….
pub fn zip_slides<B: AsRef<[u8]>>(slides: &[B]) -> Result<Vec<u8>, FlyerError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options: zip::write::FileOptions<'_, ()> =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (i, png) in slides.iter().enumerate() {
        let name = slide_entry_name(i + 1);
        zip.start_file(name.as_str(), options)
            .map_err(|e| FlyerError::ArchiveFailed(format!("{name}: {e}")))?;
        zip.write_all(png.as_ref())
            .map_err(|e| FlyerError::ArchiveFailed(format!("{name}: {e}")))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| FlyerError::ArchiveFailed(e.to_string()))?;
    let bytes = cursor.into_inner();
    debug!("Packed {} slides → {} byte archive", slides.len(), bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn data_url_has_png_prefix() {
        let url = to_data_url(&[1, 2, 3]);
        assert_eq!(url, "data:image/png;base64,AQID");
        let decoded = STANDARD
            .decode(url.trim_start_matches("data:image/png;base64,"))
            .expect("valid base64");
        assert_eq!(decoded, vec![1, 2, 3]);
    }

    #[test]
    fn zip_entries_are_numbered_in_order() {
        let slides = vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()];
        let bytes = zip_slides(&slides).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);
        for (i, expected) in slides.iter().enumerate() {
            let mut entry = archive.by_index(i).unwrap();
            assert_eq!(entry.name(), format!("slide-{}.png", i + 1));
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            assert_eq!(&content, expected);
        }
    }

    #[test]
    fn empty_archive_is_valid() {
        let bytes = zip_slides::<Vec<u8>>(&[]).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
