//! Shared fixtures: authoring module archives for integration tests.
#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// Writes a module archive at `<home>/<name>/<version>/modules.zip` with the
/// given entries, returning the archive path.
pub fn write_archive(home: &Path, name: &str, version: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let dir = home.join(name).join(version);
    std::fs::create_dir_all(&dir).unwrap();
    let archive_path = dir.join("modules.zip");

    let file = File::create(&archive_path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (entry_path, bytes) in entries {
        writer
            .start_file(*entry_path, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
    archive_path
}

/// A tiny valid PNG (1×1 pixel), produced through the `image` crate.
pub fn tiny_png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([10, 20, 30, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
    bytes
}
