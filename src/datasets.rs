//! MNIST IDX loading and the positional train/evaluation split.
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LABEL_MAGIC: i32 = 2049;
const IMAGE_MAGIC: i32 = 2051;
const GZIP_HEADER: [u8; 2] = [0x1f, 0x8b];

/// Rows before this index train the model; the rest evaluate it.
pub const MNIST_TRAIN_CUTOFF: usize = 60_000;

/// One decoded IDX file: dimensions from the header and the raw payload.
#[derive(Debug)]
struct IdxData {
    sizes: Vec<usize>,
    data: Vec<u8>,
}

impl IdxData {
    /// Reads an IDX file, gunzipping it first if it starts with the gzip header.
    fn open(path: &Path) -> Result<Self> {
        let mut raw = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut raw))
            .map_err(|e| Error::io(path, e))?;
        let contents = if raw.starts_with(&GZIP_HEADER) {
            let mut out = Vec::new();
            GzDecoder::new(raw.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| Error::io(path, e))?;
            out
        } else {
            raw
        };

        let mut r = Cursor::new(contents.as_slice());
        let header_err = |e| Error::io(path, e);
        let magic = r.read_i32::<BigEndian>().map_err(header_err)?;
        let dims = match magic {
            LABEL_MAGIC => 1,
            IMAGE_MAGIC => 3,
            _ => {
                return Err(Error::InvalidMagic {
                    path: path.to_path_buf(),
                    magic,
                })
            }
        };
        let mut sizes = Vec::with_capacity(dims);
        for _ in 0..dims {
            sizes.push(r.read_i32::<BigEndian>().map_err(header_err)?.max(0) as usize);
        }
        let offset = r.position() as usize;
        let available = contents.len() - offset;
        let needed = sizes
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .unwrap_or(usize::MAX);
        if available < needed {
            return Err(Error::Truncated {
                path: path.to_path_buf(),
                needed,
                available,
            });
        }
        let data = contents[offset..offset + needed].to_vec();
        debug!(path = %path.display(), ?sizes, "read IDX file");
        Ok(Self { sizes, data })
    }
}

/// Raw MNIST rows: 8-bit pixels and digit labels, index aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mnist {
    pixels: Vec<u8>,
    labels: Vec<u8>,
    image_size: usize,
}

impl Mnist {
    /// Reads an image file and its label file, which must hold the same
    /// number of rows.
    pub fn from_files(images: &Path, labels: &Path) -> Result<Self> {
        let image_data = IdxData::open(images)?;
        let label_data = IdxData::open(labels)?;
        if image_data.sizes.len() != 3 {
            return Err(Error::ShapeMismatch {
                what: "image file dimensions",
                expected: 3,
                actual: image_data.sizes.len(),
            });
        }
        if label_data.sizes.len() != 1 {
            return Err(Error::ShapeMismatch {
                what: "label file dimensions",
                expected: 1,
                actual: label_data.sizes.len(),
            });
        }
        if image_data.sizes[0] != label_data.sizes[0] {
            return Err(Error::ShapeMismatch {
                what: "label count",
                expected: image_data.sizes[0],
                actual: label_data.sizes[0],
            });
        }
        let image_size = image_data.sizes[1]
            .checked_mul(image_data.sizes[2])
            .ok_or(Error::ShapeMismatch {
                what: "image size",
                expected: usize::MAX,
                actual: image_data.sizes[1],
            })?;
        Ok(Self {
            pixels: image_data.data,
            labels: label_data.data,
            image_size,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Unscaled pixels of row `index`.
    pub fn raw_image(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(self.image_size)?;
        self.pixels.get(start..start + self.image_size)
    }

    /// Appends another set's rows after this one's.
    pub fn extend(&mut self, other: Mnist) -> Result<()> {
        if !self.is_empty() && self.image_size != other.image_size {
            return Err(Error::ShapeMismatch {
                what: "image size",
                expected: self.image_size,
                actual: other.image_size,
            });
        }
        self.image_size = other.image_size;
        self.pixels.extend(other.pixels);
        self.labels.extend(other.labels);
        Ok(())
    }

    /// Pixels divided by 255 and labels widened to class indices.
    pub fn to_dataset(&self) -> Dataset {
        let features = self
            .pixels
            .chunks(self.image_size.max(1))
            .map(|img| img.iter().map(|&b| b as f64 / 255.0).collect())
            .collect();
        let labels = self.labels.iter().map(|&l| l as usize).collect();
        Dataset { features, labels }
    }
}

/// Looks for `name.gz` then `name`, under `dir` first and then the working
/// directory.
fn locate(dir: &Path, name: &str) -> PathBuf {
    let gz = format!("{}.gz", name);
    let candidates = [dir.join(&gz), dir.join(name), PathBuf::from(&gz), PathBuf::from(name)];
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .unwrap_or_else(|| dir.join(gz))
}

/// Loads the training and t10k files from `dir` and concatenates them:
/// 70,000 rows, the first 60,000 being the training files.
pub fn load_mnist(dir: impl AsRef<Path>) -> Result<Mnist> {
    let dir = dir.as_ref();
    let mut all = Mnist::from_files(
        &locate(dir, "train-images-idx3-ubyte"),
        &locate(dir, "train-labels-idx1-ubyte"),
    )?;
    let test = Mnist::from_files(
        &locate(dir, "t10k-images-idx3-ubyte"),
        &locate(dir, "t10k-labels-idx1-ubyte"),
    )?;
    all.extend(test)?;
    Ok(all)
}

/// Scaled feature rows with their class labels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
}

impl Dataset {
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<usize>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(Error::ShapeMismatch {
                what: "labels",
                expected: features.len(),
                actual: labels.len(),
            });
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rows `[0, cutoff)` and `[cutoff, len)`, order preserved.
    ///
    /// A cutoff past the end is an error rather than a silently short
    /// training set; a cutoff exactly at the end leaves the evaluation set
    /// empty and logs a warning.
    pub fn split_at(mut self, cutoff: usize) -> Result<(Dataset, Dataset)> {
        let samples = self.len();
        if cutoff > samples {
            return Err(Error::InvalidSplit { cutoff, samples });
        }
        if cutoff == samples {
            warn!(cutoff, samples, "evaluation split is empty");
        }
        let eval = Dataset {
            features: self.features.split_off(cutoff),
            labels: self.labels.split_off(cutoff),
        };
        Ok((self, eval))
    }
}
