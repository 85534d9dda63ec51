use crate::model::{Catalog, Pinpoint, Tile};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];

/// Reads `catalog.json`. A missing file is an empty site, not an error.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no catalog file, starting empty");
        return Ok(Catalog::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let mut catalog: Catalog = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse catalog {}", path.display()))?;
    sort_tiles(&mut catalog.tiles);
    tracing::info!(
        path = %path.display(),
        tiles = catalog.tiles.len(),
        pinpoints = catalog.pinpoints.len(),
        "catalog loaded"
    );
    Ok(catalog)
}

pub fn save_catalog(path: &Path, catalog: &Catalog) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(catalog)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Admin ordering first, id as tie-break.
pub fn sort_tiles(tiles: &mut [Tile]) {
    tiles.sort_by_key(|tile| (tile.display_order, tile.id));
}

/// Builds tiles from a folder of pictures. An audio file sharing an image's
/// stem (in the same directory) becomes that tile's sound. References are
/// relative to `root`, so the folder should also be used as media directory.
pub fn scan_media_dir(root: &Path) -> Vec<Tile> {
    let mut images = Vec::new();
    let mut sounds: HashMap<PathBuf, PathBuf> = HashMap::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if has_extension(path, IMAGE_EXTENSIONS) {
            images.push(path.to_path_buf());
        } else if has_extension(path, AUDIO_EXTENSIONS) {
            sounds.insert(path.with_extension(""), path.to_path_buf());
        }
    }

    images.sort();
    let tiles: Vec<Tile> = images
        .iter()
        .enumerate()
        .map(|(index, image)| {
            let sound_url = sounds
                .get(&image.with_extension(""))
                .map(|sound| relative_ref(root, sound))
                .unwrap_or_default();
            Tile {
                id: index as i64 + 1,
                title: title_from_stem(image),
                description: String::new(),
                image_url: relative_ref(root, image),
                sound_url,
                style_config: serde_json::Value::Null,
                display_order: index as i64 + 1,
            }
        })
        .collect();

    tracing::info!(root = %root.display(), tiles = tiles.len(), "media folder scanned");
    tiles
}

/// Case- and accent-insensitive match on title and description. An empty
/// query keeps every point.
pub fn filter_pinpoints<'a>(points: &'a [Pinpoint], query: &str) -> Vec<&'a Pinpoint> {
    let needle = fold(query.trim());
    if needle.is_empty() {
        return points.iter().collect();
    }
    points
        .iter()
        .filter(|point| fold(&point.title).contains(&needle) || fold(&point.description).contains(&needle))
        .collect()
}

/// Lowercase with diacritics stripped: "Élysée" and "elysee" fold alike.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    extensions
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

fn relative_ref(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn title_from_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("untitled")
        .replace(['_', '-'], " ")
}
