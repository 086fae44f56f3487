//! Picture folders declared with `picture name[N] = load("folder");`.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::{ast::PictureDecl, common::Error};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Lists the image files directly inside `folder`, sorted by file name.
pub fn load_folder(folder: impl AsRef<Path>) -> Result<Vec<PathBuf>, Error> {
    let folder = folder.as_ref();
    let wrap = |source| Error::Assets {
        path: folder.to_path_buf(),
        source,
    };

    let mut images = Vec::new();
    for entry in fs::read_dir(folder).map_err(wrap)? {
        let path = entry.map_err(wrap)?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PictureSet {
    pub name: String,
    pub folder: String,
    pub images: Vec<PathBuf>,
}

impl PictureSet {
    /// Folder paths are resolved against `base`.
    pub fn load(decl: &PictureDecl, base: &Path) -> Result<Self, Error> {
        Ok(PictureSet {
            name: decl.name.clone(),
            folder: decl.folder.clone(),
            images: load_folder(base.join(&decl.folder))?,
        })
    }
}

impl fmt::Display for PictureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pictures {}: {} image(s) from {}",
            self.name,
            self.images.len(),
            self.folder
        )
    }
}
