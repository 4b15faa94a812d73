//! Flat text dump of model parameters.
//!
//! Layout, per layer from input to output: the bias vector, then the weight
//! matrix (`fan_in × fan_out`) flattened row-major. One value per line, no
//! header. A reader must know the layer widths to cut the sequence back up;
//! for the 784-300-10 digit model that is 300 + 235,200 + 10 + 3,000 =
//! 238,510 lines.
use crate::activations::ActivationKind;
use crate::error::{Error, Result};
use crate::network::{Architecture, Mlp};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Default output file of the digit trainer.
pub const DEFAULT_EXPORT_PATH: &str = "pyweights.txt";

/// Which block of a flat dump a range of lines belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Bias,
    Weights,
}

/// A contiguous block of a flat dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub layer: usize,
    pub kind: SegmentKind,
    pub offset: usize,
    pub len: usize,
}

/// Blocks of the flat dump for `architecture`, in file order.
pub fn segments(architecture: &Architecture) -> Vec<Segment> {
    let mut offset = 0;
    let mut out = Vec::new();
    for (layer, (fan_in, fan_out)) in architecture.layer_shapes().enumerate() {
        for (kind, len) in [
            (SegmentKind::Bias, fan_out),
            (SegmentKind::Weights, fan_in * fan_out),
        ] {
            out.push(Segment {
                layer,
                kind,
                offset,
                len,
            });
            offset += len;
        }
    }
    out
}

/// Concatenates `bias[0], weights[0], bias[1], weights[1], ...`.
pub fn flatten_parameters(model: &Mlp) -> Vec<f64> {
    let mut flat = Vec::with_capacity(model.architecture().parameter_count());
    for (bias, weights) in model.intercepts().zip(model.coefs()) {
        flat.extend_from_slice(bias);
        for row in weights {
            flat.extend_from_slice(row);
        }
    }
    flat
}

/// Writes one value per line, creating or truncating `path`.
///
/// Values use the shortest decimal form that parses back to the same `f64`.
/// A failure part-way leaves whatever was already written.
pub fn write_parameters(path: impl AsRef<Path>, values: &[f64]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    for v in values {
        writeln!(out, "{}", v).map_err(|e| Error::io(path, e))?;
    }
    out.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Flattens `model` and writes it to `path`. Returns the value count.
pub fn export_parameters(model: &Mlp, path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let flat = flatten_parameters(model);
    write_parameters(path, &flat)?;
    info!(path = %path.display(), values = flat.len(), architecture = %model.architecture(), "exported parameters");
    Ok(flat.len())
}

/// Parses one float per line; blank lines are skipped.
pub fn read_parameters(path: impl AsRef<Path>) -> Result<Vec<f64>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut values = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| Error::io(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let v = trimmed.parse::<f64>().map_err(|_| Error::Parse {
            line: i + 1,
            value: trimmed.to_string(),
        })?;
        values.push(v);
    }
    Ok(values)
}

/// Reads a flat dump back into a network of the given shape.
pub fn import_parameters(
    path: impl AsRef<Path>,
    architecture: &Architecture,
    hidden: ActivationKind,
) -> Result<Mlp> {
    let values = read_parameters(path)?;
    Mlp::from_flat(architecture, hidden, &values)
}
