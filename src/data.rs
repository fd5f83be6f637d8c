//! Loading labelled image datasets in IDX format.
//!
//! [`DataLoader`] reads the image/label file pair used by MNIST and its
//! relatives and turns every example into network-ready column matrices:
//!
//! - images (IDX3, magic `0x00000803`): one `(rows * cols, 1)` matrix per
//!   image, pixels scaled from `0..=255` to `[0, 1]`
//! - labels (IDX1, magic `0x00000801`): one one-hot `(classes, 1)` matrix
//!   per label
//!
//! All header integers are big-endian. Files whose name ends in `.gz` are
//! decompressed on the fly.
//!
//! ```rust,no_run
//! use tiny_cnn::data::DataLoader;
//!
//! let data = DataLoader::new(
//!     "mnist/train-images-idx3-ubyte.gz",
//!     "mnist/train-labels-idx1-ubyte.gz",
//! )?;
//! assert_eq!(data.images().len(), data.labels().len());
//! # Ok::<(), tiny_cnn::CnnError>(())
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::{CnnError, Result};
use crate::matrix::Matrix;

const IDX3_MAGIC: [u8; 4] = [0, 0, 8, 3];
const IDX1_MAGIC: [u8; 4] = [0, 0, 8, 1];

/// Number of classes in MNIST-style datasets.
pub const DEFAULT_CLASSES: usize = 10;

/// A loaded dataset of matching image and label matrices.
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    images: Vec<Matrix>,
    labels: Vec<Matrix>,
}

impl DataLoader {
    /// Loads images and labels with [`DEFAULT_CLASSES`] one-hot classes.
    ///
    /// # Errors
    /// - [`CnnError::Io`] if a file cannot be read or decompressed
    /// - [`CnnError::Format`] for a wrong magic number, truncated body or out-of-range label
    /// - [`CnnError::DimensionMismatch`] if the image and label counts differ
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(image_path: P, label_path: Q) -> Result<Self> {
        Self::with_classes(image_path, label_path, DEFAULT_CLASSES)
    }

    /// Same as [`DataLoader::new`] with an explicit number of classes.
    ///
    /// # Errors
    /// As [`DataLoader::new`], plus [`CnnError::Configuration`] for zero classes.
    pub fn with_classes<P: AsRef<Path>, Q: AsRef<Path>>(
        image_path: P,
        label_path: Q,
        classes: usize,
    ) -> Result<Self> {
        let images = parse_images(&read_file(image_path.as_ref())?)?;
        let labels = parse_labels(&read_file(label_path.as_ref())?, classes)?;
        if images.len() != labels.len() {
            return Err(CnnError::count_mismatch("dataset", images.len(), labels.len()));
        }
        log::info!(
            "loaded {} examples from {}",
            images.len(),
            image_path.as_ref().display()
        );
        Ok(Self { images, labels })
    }

    /// Image column vectors.
    #[must_use]
    pub fn images(&self) -> &[Matrix] {
        &self.images
    }

    /// One-hot label column vectors.
    #[must_use]
    pub fn labels(&self) -> &[Matrix] {
        &self.labels
    }

    /// Number of examples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the dataset is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Consumes the loader, returning `(images, labels)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Matrix>, Vec<Matrix>) {
        (self.images, self.labels)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let file = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();
    if path.extension().is_some_and(|ext| ext == "gz") {
        GzDecoder::new(file).read_to_end(&mut buf)?;
    } else {
        let mut file = file;
        file.read_to_end(&mut buf)?;
    }
    Ok(buf)
}

fn be_u32(buf: &[u8], offset: usize) -> Result<usize> {
    let bytes: [u8; 4] = buf
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| CnnError::Format("truncated IDX header".into()))?;
    Ok(u32::from_be_bytes(bytes) as usize)
}

fn check_magic(buf: &[u8], magic: [u8; 4], what: &str) -> Result<()> {
    if buf.get(..4) != Some(&magic[..]) {
        return Err(CnnError::Format(format!("{what} file has the wrong IDX magic number")));
    }
    Ok(())
}

/// Parses an IDX3 image buffer into `(rows * cols, 1)` matrices in `[0, 1]`.
///
/// # Errors
/// [`CnnError::Format`] for a wrong magic number, zero-sized images or a truncated body.
pub fn parse_images(buf: &[u8]) -> Result<Vec<Matrix>> {
    check_magic(buf, IDX3_MAGIC, "image")?;
    let count = be_u32(buf, 4)?;
    let rows = be_u32(buf, 8)?;
    let cols = be_u32(buf, 12)?;
    if rows == 0 || cols == 0 {
        return Err(CnnError::Format(format!("image extent {rows}x{cols} has no pixels")));
    }
    let pixels = rows.saturating_mul(cols);

    let needed = count.saturating_mul(pixels);
    let body = &buf[16..];
    if body.len() < needed {
        return Err(CnnError::Format(format!(
            "image body holds {} bytes, header promises {needed}",
            body.len()
        )));
    }
    Ok(body
        .chunks_exact(pixels)
        .take(count)
        .map(|img| {
            let values: Vec<f32> = img.iter().map(|&b| f32::from(b) / 255.0).collect();
            Matrix::column(&values)
        })
        .collect())
}

/// Parses an IDX1 label buffer into one-hot `(classes, 1)` matrices.
///
/// # Errors
/// - [`CnnError::Configuration`] if `classes` is zero
/// - [`CnnError::Format`] for a wrong magic number, truncated body, or a
///   label `>= classes`
pub fn parse_labels(buf: &[u8], classes: usize) -> Result<Vec<Matrix>> {
    if classes == 0 {
        return Err(CnnError::Configuration("label classes must be positive".into()));
    }
    check_magic(buf, IDX1_MAGIC, "label")?;
    let count = be_u32(buf, 4)?;

    let body = &buf[8..];
    if body.len() < count {
        return Err(CnnError::Format(format!(
            "label body holds {} bytes, header promises {count}",
            body.len()
        )));
    }

    body[..count]
        .iter()
        .map(|&label| {
            let class = usize::from(label);
            if class >= classes {
                return Err(CnnError::Format(format!(
                    "label {class} out of range for {classes} classes"
                )));
            }
            let mut onehot = Matrix::new(classes, 1);
            onehot.as_mut_slice()[class] = 1.0;
            Ok(onehot)
        })
        .collect()
}
