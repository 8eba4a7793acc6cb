//! Load list generation for a converted tree.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use xtech_render::texture::list::LIST_FILE_NAME;
use xtech_render::texture::{sidecar, ListEntry, LoadList};

/// Image kinds the engine loads lazily by name.
pub const LISTED_KINDS: [&str; 17] = [
    "background", "background2", "block", "effect", "level", "link", "luigi", "mario", "npc",
    "path", "peach", "player", "scene", "tile", "toad", "yoshib", "yoshit",
];

/// Subdirectories of `graphics` left out of its list.
const UNLISTED_DIRS: [&str; 2] = ["touchscreen", "ui"];

const SIZE_SUFFIX: &str = ".size";

/// List entry for the sidecar `file_name` (`npc-5.png.size` becomes
/// "npc 5" -> `<prefix>npc-5.png`), if it names a listed kind.
fn entry_for(dir: &Path, file_name: &str, prefix: &str) -> Option<ListEntry> {
    let image_name = file_name.strip_suffix(SIZE_SUFFIX)?;
    let base = image_name.split('.').next()?;
    let (kind, index) = base.split_once('-')?;
    if index.contains('-') || !LISTED_KINDS.contains(&kind) {
        return None;
    }

    let Some((w, h)) = sidecar::read(&dir.join(image_name)) else {
        log::warn!("{}: malformed size sidecar", dir.join(file_name).display());
        return None;
    };
    Some(ListEntry {
        name: format!("{kind} {index}"),
        path: format!("{prefix}{image_name}"),
        w,
        h,
    })
}

fn sorted_names(dir: &Path) -> Result<Vec<(String, bool)>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("cannot read {}", dir.display()))? {
        let entry = entry?;
        let is_dir = entry.file_type()?.is_dir();
        names.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }
    names.sort();
    Ok(names)
}

/// Entries for the sidecars directly inside `dir`.
fn dir_entries(dir: &Path, prefix: &str, list: &mut LoadList) -> Result<()> {
    for (name, is_dir) in sorted_names(dir)? {
        if is_dir {
            continue;
        }
        if let Some(entry) = entry_for(dir, &name, prefix) {
            list.push(entry);
        }
    }
    Ok(())
}

fn save(list: &LoadList, dir: &Path) -> Result<()> {
    let path = dir.join(LIST_FILE_NAME);
    list.save(&path).with_context(|| format!("cannot write {}", path.display()))?;
    log::info!("{}: {} entries", path.display(), list.len());
    Ok(())
}

/// Writes a `graphics.list` into every directory of `root` that holds
/// listed images. A `graphics` directory gets one list covering its
/// subdirectories; those subdirectories get none of their own.
///
/// Returns the number of lists written.
pub fn write_load_lists(root: &Path) -> Result<usize> {
    let mut written = 0;
    visit(root, false, &mut written)?;
    Ok(written)
}

fn visit(dir: &Path, under_graphics: bool, written: &mut usize) -> Result<()> {
    let is_graphics = dir.file_name().is_some_and(|n| n == "graphics");
    let subdirs: Vec<String> = sorted_names(dir)?
        .into_iter()
        .filter_map(|(name, is_dir)| is_dir.then_some(name))
        .collect();

    if is_graphics {
        let mut list = LoadList::default();
        for sub in subdirs.iter().filter(|s| !UNLISTED_DIRS.contains(&s.as_str())) {
            dir_entries(&dir.join(sub), &format!("{sub}/"), &mut list)?;
        }
        save(&list, dir)?;
        *written += 1;
    } else if !under_graphics {
        let mut list = LoadList::default();
        dir_entries(dir, "", &mut list)?;
        if !list.is_empty() {
            save(&list, dir)?;
            *written += 1;
        }
    }

    for sub in &subdirs {
        visit(&dir.join(sub), is_graphics, written)?;
    }
    Ok(())
}
