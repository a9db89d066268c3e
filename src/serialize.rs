//! Binary persistence for polynomial matrices and coefficient export.
//!
//! Matrix layout (all integers little endian):
//!
//! ```text
//! magic "DCRM" | version u16 | n u32 | L u32 | q_0..q_{L-1} u64
//! rows u32 | cols u32 | per entry, row-major: format u8 | L·n residues u64
//! ```
//!
//! The ring is not reconstructed from the stream. The caller supplies its
//! `RingParams` and the header must match it exactly.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_bigint::BigUint;
use tracing::{debug, warn};

use crate::dcrt_matrix::DcrtMatrix;
use crate::dcrt_poly::{DcrtPoly, Format};
use crate::error::{DcrtError, Result};
use crate::params::ParamsHandle;

const MATRIX_MAGIC: [u8; 4] = *b"DCRM";
const FORMAT_VERSION: u16 = 1;
const STREAM_LABEL: &str = "<stream>";

/// Upper bound on rows·cols, enforced on both write and read.
const MAX_SERIALIZED_ENTRIES: usize = 1 << 24;

/// Entries reserved up front while reading; the rest grow with the stream.
const INITIAL_ENTRY_RESERVATION: usize = 1024;

/// Header fields narrowed to their on-disk width.
struct MatrixHeader {
    ring_dimension: u32,
    tower_count: u32,
    rows: u32,
    cols: u32,
}

fn check_entry_count(rows: usize, cols: usize) -> std::result::Result<(), String> {
    if rows == 0 || cols == 0 || rows.saturating_mul(cols) > MAX_SERIALIZED_ENTRIES {
        return Err(format!("unsupported shape {}x{}", rows, cols));
    }
    Ok(())
}

fn to_u32(value: usize, field: &str) -> std::result::Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("{} {} does not fit in u32", field, value))
}

/// Output of `DcrtPoly::parse_coefficient_bytes`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCoefficients {
    pub modulus: BigUint,
    pub coefficients: Vec<BigUint>,
}

impl DcrtMatrix {
    /// Writes the matrix to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let header = self
            .header()
            .map_err(|reason| DcrtError::serialization(STREAM_LABEL, reason))?;
        self.write_raw(&header, writer)
            .map_err(|e| DcrtError::serialization(STREAM_LABEL, e.to_string()))
    }

    /// Reads a matrix written by `write_to`, validating it against `params`.
    pub fn read_from<R: Read>(params: &ParamsHandle, reader: &mut R) -> Result<Self> {
        read_matrix(params, reader, STREAM_LABEL)
    }

    /// Writes the matrix to a file, replacing any existing content.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let header = self
            .header()
            .map_err(|reason| DcrtError::serialization(&label, reason))?;
        let file = File::create(path).map_err(|e| DcrtError::serialization(&label, e.to_string()))?;
        let mut writer = BufWriter::new(file);
        self.write_raw(&header, &mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| DcrtError::serialization(&label, e.to_string()))?;
        debug!(path = %label, rows = self.rows(), cols = self.cols(), "saved matrix");
        Ok(())
    }

    /// Loads a matrix saved by `save_to_file`.
    ///
    /// # Errors
    /// `SerializationError` carrying the path if the file cannot be read, is
    /// malformed, or was written for a different ring.
    pub fn load_from_file<P: AsRef<Path>>(params: &ParamsHandle, path: P) -> Result<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let file = File::open(path).map_err(|e| DcrtError::serialization(&label, e.to_string()))?;
        let mut reader = BufReader::new(file);
        let matrix = read_matrix(params, &mut reader, &label)?;
        debug!(path = %label, rows = matrix.rows(), cols = matrix.cols(), "loaded matrix");
        Ok(matrix)
    }

    fn header(&self) -> std::result::Result<MatrixHeader, String> {
        check_entry_count(self.rows(), self.cols())?;
        let params = self.params();
        Ok(MatrixHeader {
            ring_dimension: to_u32(params.ring_dimension(), "ring dimension")?,
            tower_count: to_u32(params.tower_count(), "tower count")?,
            rows: to_u32(self.rows(), "row count")?,
            cols: to_u32(self.cols(), "column count")?,
        })
    }

    fn write_raw<W: Write>(&self, header: &MatrixHeader, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&MATRIX_MAGIC)?;
        writer.write_u16::<LittleEndian>(FORMAT_VERSION)?;
        writer.write_u32::<LittleEndian>(header.ring_dimension)?;
        writer.write_u32::<LittleEndian>(header.tower_count)?;
        for q in self.params().moduli() {
            writer.write_u64::<LittleEndian>(q.value())?;
        }
        writer.write_u32::<LittleEndian>(header.rows)?;
        writer.write_u32::<LittleEndian>(header.cols)?;
        for poly in self.elements() {
            writer.write_u8(poly.format().to_byte())?;
            for tower in poly.towers() {
                for &residue in tower {
                    writer.write_u64::<LittleEndian>(residue)?;
                }
            }
        }
        Ok(())
    }
}

fn read_matrix<R: Read>(params: &ParamsHandle, reader: &mut R, label: &str) -> Result<DcrtMatrix> {
    let io = |e: std::io::Error| DcrtError::serialization(label, e.to_string());
    let invalid = |reason: String| {
        warn!(path = %label, reason = %reason.as_str(), "rejected serialized matrix");
        DcrtError::serialization(label, reason)
    };

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(io)?;
    if magic != MATRIX_MAGIC {
        return Err(invalid("not a serialized DcrtMatrix".to_string()));
    }
    let version = reader.read_u16::<LittleEndian>().map_err(io)?;
    if version != FORMAT_VERSION {
        return Err(invalid(format!("unsupported version {}", version)));
    }

    let n = reader.read_u32::<LittleEndian>().map_err(io)? as usize;
    if n != params.ring_dimension() {
        return Err(invalid(format!(
            "ring dimension {} does not match {}",
            n,
            params.ring_dimension()
        )));
    }
    let towers = reader.read_u32::<LittleEndian>().map_err(io)? as usize;
    if towers != params.tower_count() {
        return Err(invalid(format!(
            "tower count {} does not match {}",
            towers,
            params.tower_count()
        )));
    }
    for (i, q) in params.moduli().iter().enumerate() {
        let stored = reader.read_u64::<LittleEndian>().map_err(io)?;
        if stored != q.value() {
            return Err(invalid(format!(
                "tower {} modulus {} does not match {}",
                i,
                stored,
                q.value()
            )));
        }
    }

    let rows = reader.read_u32::<LittleEndian>().map_err(io)? as usize;
    let cols = reader.read_u32::<LittleEndian>().map_err(io)? as usize;
    check_entry_count(rows, cols).map_err(invalid)?;

    let mut elements = Vec::with_capacity((rows * cols).min(INITIAL_ENTRY_RESERVATION));
    for _ in 0..rows * cols {
        let tag = reader.read_u8().map_err(io)?;
        let format = Format::from_byte(tag).ok_or_else(|| invalid(format!("unknown format tag {}", tag)))?;
        let mut residues = Vec::with_capacity(towers);
        for _ in 0..towers {
            let mut tower = vec![0u64; n];
            reader.read_u64_into::<LittleEndian>(&mut tower).map_err(io)?;
            residues.push(tower);
        }
        let poly = DcrtPoly::from_towers(params, residues, format).map_err(|e| invalid(e.to_string()))?;
        elements.push(poly);
    }

    DcrtMatrix::from_elements(params, rows, cols, elements).map_err(|e| invalid(e.to_string()))
}

impl DcrtPoly {
    /// Encodes Q and the coefficients modulo Q as length-prefixed
    /// little-endian byte strings.
    ///
    /// ```text
    /// len u32 | Q bytes | n u32 | per coefficient: len u32 | bytes
    /// ```
    pub fn coefficient_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let io = |e: std::io::Error| DcrtError::serialization(STREAM_LABEL, e.to_string());
        write_biguint(&mut out, &self.modulus()).map_err(io)?;
        let coefficients = self.coefficients();
        out.write_u32::<LittleEndian>(coefficients.len() as u32).map_err(io)?;
        for c in &coefficients {
            write_biguint(&mut out, c).map_err(io)?;
        }
        Ok(out)
    }

    /// Decodes the output of `coefficient_bytes`.
    pub fn parse_coefficient_bytes(bytes: &[u8]) -> Result<ParsedCoefficients> {
        let mut cursor = Cursor::new(bytes);
        let io = |e: std::io::Error| DcrtError::serialization(STREAM_LABEL, e.to_string());
        let modulus = read_biguint(&mut cursor).map_err(io)?;
        let count = cursor.read_u32::<LittleEndian>().map_err(io)? as usize;
        let mut coefficients = Vec::with_capacity(count.min(bytes.len()));
        for _ in 0..count {
            let c = read_biguint(&mut cursor).map_err(io)?;
            if c >= modulus {
                return Err(DcrtError::serialization(
                    STREAM_LABEL,
                    "coefficient not reduced modulo Q",
                ));
            }
            coefficients.push(c);
        }
        if (cursor.position() as usize) != bytes.len() {
            return Err(DcrtError::serialization(STREAM_LABEL, "trailing bytes"));
        }
        Ok(ParsedCoefficients { modulus, coefficients })
    }
}

fn write_biguint<W: Write>(writer: &mut W, value: &BigUint) -> std::io::Result<()> {
    let bytes = value.to_bytes_le();
    writer.write_u32::<LittleEndian>(bytes.len() as u32)?;
    writer.write_all(&bytes)
}

fn read_biguint<R: Read>(reader: &mut R) -> std::io::Result<BigUint> {
    let len = reader.read_u32::<LittleEndian>()? as usize;
    let mut bytes = Vec::new();
    reader.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated integer",
        ));
    }
    Ok(BigUint::from_bytes_le(&bytes))
}
