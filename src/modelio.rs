//! Saving and loading trained network parameters.
//!
//! # `.cnnp` Parameter Format
//!
//! A `.cnnp` file stores a network's topology, function choices and every
//! weight and bias, little-endian throughout:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────┐
//! │ "cnnp"[4]    │ magic                                        │
//! │ u8           │ format version (1)                           │
//! │ u8           │ activation tag                               │
//! │ u8           │ loss tag                                     │
//! │ u32          │ number of layer sizes L                      │
//! │ [u32; L]     │ layer sizes, input first                     │
//! │ per layer i  │ [f32; s[i+1]*s[i]] weights, row-major        │
//! │              │ [f32; s[i+1]] bias                           │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! The tensor count is implied by the layer sizes, so a file cannot describe
//! parameters that disagree with its own topology.
//!
//! # Example
//!
//! ```rust,no_run
//! use tiny_cnn::modelio::{load_network, save_network};
//! use tiny_cnn::network::Network;
//!
//! fn main() -> tiny_cnn::Result<()> {
//!     let net = Network::new(&[784, 64, 10])?;
//!     save_network("mnist.cnnp", &net)?;
//!     let restored = load_network("mnist.cnnp")?;
//!     assert_eq!(net, restored);
//!     Ok(())
//! }
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::activation::{Activation, Loss};
use crate::error::{CnnError, Result};
use crate::matrix::Matrix;
use crate::network::{Layer, Network};

const CNNP_MAGIC: &[u8; 4] = b"cnnp";
const CNNP_VERSION: u8 = 1;

/// Upper bound on a single layer size accepted from a file.
const MAX_LAYER_SIZE: u32 = 1 << 24;

/// Upper bound on the total weights and biases accepted from a file (1 GiB of `f32`).
const MAX_PARAMETERS: usize = 1 << 28;

/// Writes `network` to `path` in `.cnnp` format.
///
/// # Errors
/// [`CnnError::Io`] if the file cannot be created or written;
/// [`CnnError::Format`] if a layer size does not fit in `u32`.
pub fn save_network<P: AsRef<Path>>(path: P, network: &Network) -> Result<()> {
    let path = path.as_ref();
    let mut file = BufWriter::new(File::create(path)?);
    write_network(&mut file, network)?;
    file.flush()?;
    log::info!("saved {} parameters to {}", network.parameter_count(), path.display());
    Ok(())
}

/// Reads a network previously written by [`save_network`].
///
/// # Errors
/// [`CnnError::Io`] on read failure or truncation; [`CnnError::Format`] for a
/// wrong magic, unknown version/tags, or an invalid topology.
pub fn load_network<P: AsRef<Path>>(path: P) -> Result<Network> {
    let path = path.as_ref();
    let mut file = BufReader::new(File::open(path)?);
    let network = read_network(&mut file)?;
    log::info!("loaded network {:?} from {}", network.layer_sizes(), path.display());
    Ok(network)
}

/// Serializes `network` into any writer.
///
/// # Errors
/// As [`save_network`].
pub fn write_network<W: Write>(w: &mut W, network: &Network) -> Result<()> {
    w.write_all(CNNP_MAGIC)?;
    w.write_all(&[
        CNNP_VERSION,
        network.activation() as u8,
        network.loss() as u8,
    ])?;

    let sizes = network.layer_sizes();
    w.write_all(&to_u32(sizes.len())?.to_le_bytes())?;
    for &size in sizes {
        w.write_all(&to_u32(size)?.to_le_bytes())?;
    }

    for layer in network.layers() {
        write_values(w, layer.weights())?;
        write_values(w, layer.bias())?;
    }
    Ok(())
}

/// Deserializes a network from any reader.
///
/// # Errors
/// As [`load_network`].
pub fn read_network<R: Read>(r: &mut R) -> Result<Network> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != CNNP_MAGIC {
        return Err(CnnError::Format("invalid magic header".into()));
    }

    let mut header = [0u8; 3];
    r.read_exact(&mut header)?;
    if header[0] != CNNP_VERSION {
        return Err(CnnError::Format(format!("unsupported version {}", header[0])));
    }
    let activation = Activation::try_from(header[1])?;
    let loss = Loss::try_from(header[2])?;

    let count = read_u32(r)?;
    if count < 2 || count > 1024 {
        return Err(CnnError::Format(format!("implausible layer count {count}")));
    }
    let mut sizes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let size = read_u32(r)?;
        if size == 0 || size > MAX_LAYER_SIZE {
            return Err(CnnError::Format(format!("implausible layer size {size}")));
        }
        sizes.push(size as usize);
    }
    parameter_count(&sizes)?;

    let mut layers = Vec::with_capacity(sizes.len() - 1);
    for pair in sizes.windows(2) {
        let weights = read_matrix(r, pair[1], pair[0])?;
        let bias = read_matrix(r, pair[1], 1)?;
        layers.push(Layer::new(weights, bias)?);
    }

    Network::from_layers(sizes, layers, activation, loss)
}

fn to_u32(x: usize) -> Result<u32> {
    u32::try_from(x).map_err(|_| CnnError::Format(format!("{x} does not fit in u32")))
}

fn write_values<W: Write>(w: &mut W, m: &Matrix) -> Result<()> {
    for &val in m.as_slice() {
        w.write_all(&val.to_le_bytes())?;
    }
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Total parameters implied by `sizes`, rejecting topologies too large to load.
fn parameter_count(sizes: &[usize]) -> Result<usize> {
    let too_large = || CnnError::Format(format!("topology {sizes:?} is too large to load"));
    let mut total = 0usize;
    for pair in sizes.windows(2) {
        let layer = pair[1]
            .checked_mul(pair[0])
            .and_then(|w| w.checked_add(pair[1]))
            .ok_or_else(too_large)?;
        total = total.checked_add(layer).ok_or_else(too_large)?;
    }
    if total > MAX_PARAMETERS {
        return Err(too_large());
    }
    Ok(total)
}

fn read_matrix<R: Read>(r: &mut R, rows: usize, cols: usize) -> Result<Matrix> {
    let bytes = rows * cols * size_of::<f32>();
    let mut buf = Vec::new();
    r.by_ref().take(bytes as u64).read_to_end(&mut buf)?;
    if buf.len() != bytes {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("parameter block holds {} bytes, expected {bytes}", buf.len()),
        )
        .into());
    }
    let values = buf
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Matrix::from_vec(rows, cols, values)
}
