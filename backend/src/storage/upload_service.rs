use image::ImageFormat;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct UploadService {
    upload_dir: PathBuf,
    max_size: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Unsupported image format")]
    UnsupportedFormat,
    #[error("File too large (limit {limit} bytes)")]
    FileTooLarge { limit: usize },
}

/// An upload that has passed validation and is ready to be persisted.
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ValidatedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub path: PathBuf,
    pub image_hash: String,
}

impl UploadService {
    pub fn new(upload_dir: PathBuf, max_size: usize) -> Self {
        Self {
            upload_dir,
            max_size,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn calculate_image_hash(image_data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(image_data);
        hex::encode(hasher.finalize())
    }

    /// The stored name only ever contains the content hash and a fixed extension.
    pub fn generate_file_name(image_hash: &str, format: ImageFormat) -> String {
        format!("{}.{}", image_hash, Self::file_extension(format))
    }

    pub fn file_extension(format: ImageFormat) -> &'static str {
        format.extensions_str().first().copied().unwrap_or("img")
    }

    pub fn validate_image_size(&self, image_data: &[u8]) -> Result<(), UploadError> {
        if image_data.len() > self.max_size {
            return Err(UploadError::FileTooLarge {
                limit: self.max_size,
            });
        }
        Ok(())
    }

    /// Sniffs the format from the bytes and makes sure they actually decode.
    pub fn validate_image(&self, image_data: Vec<u8>) -> Result<ValidatedImage, UploadError> {
        self.validate_image_size(&image_data)?;
        if image_data.is_empty() {
            return Err(UploadError::InvalidImage("empty upload".to_string()));
        }
        let format = image::guess_format(&image_data)
            .map_err(|_| UploadError::UnsupportedFormat)?;
        image::load_from_memory_with_format(&image_data, format)
            .map_err(|e| UploadError::InvalidImage(e.to_string()))?;
        Ok(ValidatedImage {
            bytes: image_data,
            format,
        })
    }

    /// Writes the image under the upload directory, creating it if needed.
    /// Identical content always lands on the same file, and a file is only
    /// ever visible at its final name once fully written.
    pub fn save(&self, image: &ValidatedImage) -> Result<StoredUpload, UploadError> {
        std::fs::create_dir_all(&self.upload_dir)?;

        let image_hash = Self::calculate_image_hash(&image.bytes);
        let path = self
            .upload_dir
            .join(Self::generate_file_name(&image_hash, image.format));

        let complete = std::fs::metadata(&path)
            .map(|meta| meta.len() == image.bytes.len() as u64)
            .unwrap_or(false);
        if complete {
            log::debug!("Upload {} already stored", path.display());
        } else {
            // Staged in the same directory so the rename never crosses filesystems.
            let mut staged = tempfile::NamedTempFile::new_in(&self.upload_dir)?;
            staged.write_all(&image.bytes)?;
            staged.as_file().sync_all()?;
            staged.persist(&path).map_err(|e| e.error)?;
            log::info!("Stored upload at {}", path.display());
        }

        Ok(StoredUpload { path, image_hash })
    }
}
