use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScfError};

use super::{
    batch::Batch,
    buffer::Stream,
    index::{index2, pk_pairs},
};

const F64_SIZE: u64 = std::mem::size_of::<f64>() as u64;

pub fn label(stream: Stream, batch: usize) -> String {
    match stream {
        Stream::J => format!("J Block (Batch {batch})"),
        Stream::K => format!("K Block (Batch {batch})"),
    }
}

/// A labeled region of the data file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub label: String,
    /// Byte offset from the start of the data file
    pub offset: u64,
    /// Number of doubles
    pub len: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TableOfContents {
    n_basis: usize,
    batches: Vec<Batch>,
    records: Vec<Record>,
}

/// Supermatrices on disk: one data file holding the J and K record of every batch, plus
/// a JSON table of contents next to it.
#[derive(Debug)]
pub struct PkFile {
    path: PathBuf,
    toc: TableOfContents,
}

impl PkFile {
    /// Create a fresh file with every record zero-filled, so later writes only overwrite
    /// existing bytes.
    pub fn create(path: impl AsRef<Path>, n_basis: usize, batches: Vec<Batch>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut records = Vec::with_capacity(2 * batches.len());
        let mut offset = 0;
        for (number, batch) in batches.iter().enumerate() {
            for stream in [Stream::J, Stream::K] {
                records.push(Record {
                    label: label(stream, number),
                    offset,
                    len: batch.len(),
                });
                offset += batch.len() as u64 * F64_SIZE;
            }
        }

        let mut writer = BufWriter::new(File::create(&path)?);
        let zeros = [0u8; 1 << 16];
        let mut remaining = offset;
        while remaining > 0 {
            let chunk = remaining.min(zeros.len() as u64) as usize;
            writer.write_all(&zeros[..chunk])?;
            remaining -= chunk as u64;
        }
        writer.flush()?;

        let toc = TableOfContents {
            n_basis,
            batches,
            records,
        };
        serde_json::to_writer_pretty(
            BufWriter::new(File::create(Self::toc_path(&path))?),
            &toc,
        )?;

        log::info!(
            "created PK file {} with {} records, {offset} bytes",
            path.display(),
            toc.records.len()
        );

        Ok(Self { path, toc })
    }

    /// Reopen an existing file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let toc: TableOfContents =
            serde_json::from_reader(BufReader::new(File::open(Self::toc_path(&path))?))?;

        let expected = toc
            .records
            .iter()
            .map(|record| record.offset + record.len as u64 * F64_SIZE)
            .max()
            .unwrap_or(0);
        let actual = fs::metadata(&path)?.len();
        if actual < expected {
            return Err(ScfError::Config(format!(
                "PK file {} holds {actual} bytes, its table of contents expects {expected}",
                path.display()
            )));
        }

        log::debug!("opened PK file {} with {} batches", path.display(), toc.batches.len());
        Ok(Self { path, toc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn n_basis(&self) -> usize {
        self.toc.n_basis
    }

    pub fn batches(&self) -> &[Batch] {
        &self.toc.batches
    }

    pub fn records(&self) -> &[Record] {
        &self.toc.records
    }

    pub fn record(&self, label: &str) -> Result<&Record> {
        self.toc
            .records
            .iter()
            .find(|record| record.label == label)
            .ok_or_else(|| ScfError::MissingRecord(label.to_string()))
    }

    /// Read a whole record.
    pub fn read_record(&self, label: &str) -> Result<Vec<f64>> {
        let record = self.record(label)?;

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(record.offset))?;

        let mut bytes = vec![0u8; record.len * F64_SIZE as usize];
        file.read_exact(&mut bytes)?;

        Ok(bytes
            .chunks_exact(F64_SIZE as usize)
            .map(|chunk| {
                let mut value = [0u8; 8];
                value.copy_from_slice(chunk);
                f64::from_le_bytes(value)
            })
            .collect())
    }

    /// Coulomb matrices J = sum_rs (pq|rs) D_rs for each of the given symmetric densities.
    pub fn form_j(&self, densities: &[DMatrix<f64>]) -> Result<Vec<DMatrix<f64>>> {
        self.contract(Stream::J, densities)
    }

    /// Exchange matrices K = sum_rs (pr|qs) D_rs for each of the given symmetric densities.
    pub fn form_k(&self, densities: &[DMatrix<f64>]) -> Result<Vec<DMatrix<f64>>> {
        self.contract(Stream::K, densities)
    }

    fn contract(&self, stream: Stream, densities: &[DMatrix<f64>]) -> Result<Vec<DMatrix<f64>>> {
        let n_basis = self.n_basis();
        let n_pairs = pk_pairs(n_basis);

        // off-diagonal pairs stand for both (pq) and (qp)
        let density_vectors = densities
            .iter()
            .map(|density| {
                let mut vector = vec![0.0; n_pairs];
                for p in 0..n_basis {
                    for q in 0..=p {
                        vector[index2(p, q)] = if p == q {
                            density[(p, p)]
                        } else {
                            density[(p, q)] + density[(q, p)]
                        };
                    }
                }
                vector
            })
            .collect::<Vec<_>>();

        let mut results = vec![vec![0.0; n_pairs]; densities.len()];

        for (number, batch) in self.batches().iter().enumerate() {
            let block = self.read_record(&label(stream, number))?;

            let mut values = block.iter();
            for pq in batch.pq_min..batch.pq_max {
                for rs in 0..=pq {
                    let Some(&value) = values.next() else {
                        return Err(ScfError::InvalidWindow {
                            start: batch.index_min,
                            stop: batch.index_max,
                        });
                    };

                    // the stored diagonal is pre-halved, so both updates apply unconditionally
                    for (result, density) in results.iter_mut().zip(&density_vectors) {
                        result[pq] += value * density[rs];
                        result[rs] += value * density[pq];
                    }
                }
            }
        }

        Ok(results
            .into_iter()
            .map(|result| {
                DMatrix::from_fn(n_basis, n_basis, |p, q| result[index2(p, q)])
            })
            .collect())
    }

    /// Delete the data file and its table of contents.
    pub fn remove(self) -> Result<()> {
        fs::remove_file(Self::toc_path(&self.path))?;
        fs::remove_file(&self.path)?;
        log::debug!("removed PK file {}", self.path.display());
        Ok(())
    }

    fn toc_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".toc.json");
        PathBuf::from(name)
    }
}
