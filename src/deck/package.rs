use std::{
    fs::{
        self,
        File,
    },
    io::Write,
    path::Path,
};

use uuid::Uuid;
use zip::{
    write::SimpleFileOptions,
    ZipWriter,
};

use crate::core::AnkitabError;

/// Packs the collection database and media files into an `.apkg` zip.
/// The archive is built at a sibling temp path and renamed into place
/// only on success, so a failed run never leaves a corrupt file at the
/// destination.
pub fn write_apkg(
    output_path: &Path,
    collection_path: &Path,
    media: &[(String, Vec<u8>)],
) -> Result<(), AnkitabError> {
    let file_name =
        output_path.file_name().and_then(|n| n.to_str()).unwrap_or("deck.apkg").to_string();
    let tmp_path = output_path.with_file_name(format!(".{}-{}.tmp", file_name, Uuid::new_v4()));

    let result = write_archive(&tmp_path, collection_path, media);
    match result {
        Ok(()) => {
            fs::rename(&tmp_path, output_path)?;
            Ok(())
        }
        Err(error) => {
            let _ = fs::remove_file(&tmp_path);
            Err(error)
        }
    }
}

fn write_archive(
    archive_path: &Path,
    collection_path: &Path,
    media: &[(String, Vec<u8>)],
) -> Result<(), AnkitabError> {
    let file = File::create(archive_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("collection.anki2", options)?;
    zip.write_all(&fs::read(collection_path)?)?;

    // Media manifest: zip entry index -> real filename
    let manifest: serde_json::Map<String, serde_json::Value> = media
        .iter()
        .enumerate()
        .map(|(idx, (name, _))| (idx.to_string(), serde_json::Value::String(name.clone())))
        .collect();
    zip.start_file("media", options)?;
    zip.write_all(serde_json::to_string(&manifest)?.as_bytes())?;

    for (idx, (_, bytes)) in media.iter().enumerate() {
        zip.start_file(idx.to_string(), options)?;
        zip.write_all(bytes)?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use zip::ZipArchive;

    use super::*;

    #[test]
    fn test_apkg_contains_collection_media_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let collection_path = dir.path().join("collection.anki2");
        fs::write(&collection_path, b"sqlite-bytes").unwrap();

        let media = vec![
            ("ankitab-aaaa.mp3".to_string(), b"front-audio".to_vec()),
            ("ankitab-bbbb.mp3".to_string(), b"back-audio".to_vec()),
        ];
        let output_path = dir.path().join("deck.apkg");
        write_apkg(&output_path, &collection_path, &media).unwrap();

        let mut archive = ZipArchive::new(File::open(&output_path).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"collection.anki2".to_string()));
        assert!(names.contains(&"media".to_string()));
        assert!(names.contains(&"0".to_string()));
        assert!(names.contains(&"1".to_string()));

        let mut manifest = String::new();
        archive.by_name("media").unwrap().read_to_string(&mut manifest).unwrap();
        let manifest: serde_json::Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(manifest["0"], "ankitab-aaaa.mp3");
        assert_eq!(manifest["1"], "ankitab-bbbb.mp3");

        // No temp files left next to the artifact
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
