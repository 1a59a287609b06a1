//! Dense vector index: exact flat scan or IVF-probed scan over `vectors.bin`.

pub mod ivf;
pub mod metric;
pub mod storage;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use quarry_core::config::{BackendVariant, DenseIndexConfig, DenseStructure};
use quarry_core::errors::{QuarryError, QuarryResult};
use quarry_core::models::RecordId;

use crate::backend::{
    BuildContext, IndexBackend, IndexBuilder, IndexHandle, IndexItem, ScoredId, SearchQuery,
};
use crate::manifest::IndexManifest;
use crate::corrupt;
use crate::topk::TopK;
use ivf::{IvfLists, IVF_FILE};
use storage::{VectorFileReader, VectorFileWriter, VectorRows, VECTORS_FILE};

pub struct DenseBackend {
    config: DenseIndexConfig,
}

impl DenseBackend {
    pub fn new(config: DenseIndexConfig) -> Self {
        Self { config }
    }
}

impl IndexBackend for DenseBackend {
    fn variant(&self) -> BackendVariant {
        BackendVariant::Dense
    }

    fn begin(&self, staging_dir: &Path, ctx: &BuildContext) -> QuarryResult<Box<dyn IndexBuilder>> {
        let dims = ctx.require_dimensions()?;
        Ok(Box::new(DenseBuilder::create(staging_dir, self.config.clone(), dims)?))
    }

    fn open(
        &self,
        dir: &Path,
        manifest: &IndexManifest,
        _ctx: &BuildContext,
    ) -> QuarryResult<Arc<dyn IndexHandle>> {
        let index = DenseIndex::open_for(dir, &self.config, manifest)?;
        Ok(Arc::new(DenseHandle {
            manifest: manifest.clone(),
            index,
        }))
    }
}

/// Streams prepared vectors to `vectors.bin` in `insert_batch_size` chunks,
/// buffering only the IVF training sample.
pub struct DenseBuilder {
    dir: PathBuf,
    config: DenseIndexConfig,
    dims: usize,
    writer: VectorFileWriter,
    pending: Vec<(RecordId, Vec<f32>)>,
    training: Vec<f32>,
}

impl DenseBuilder {
    pub fn create(dir: &Path, config: DenseIndexConfig, dims: usize) -> QuarryResult<Self> {
        let writer = VectorFileWriter::create(&dir.join(VECTORS_FILE), dims)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            pending: Vec::with_capacity(config.insert_batch_size),
            config,
            dims,
            writer,
            training: Vec::new(),
        })
    }

    pub fn push(&mut self, id: RecordId, vector: &[f32]) -> QuarryResult<()> {
        if vector.len() != self.dims {
            return Err(QuarryError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        let mut prepared = vector.to_vec();
        metric::prepare(self.config.metric, &mut prepared);
        if self.config.structure == DenseStructure::Ivf
            && self.training.len() < self.config.train_size * self.dims
        {
            self.training.extend_from_slice(&prepared);
        }
        self.pending.push((id, prepared));
        if self.pending.len() >= self.config.insert_batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> QuarryResult<()> {
        for (id, v) in self.pending.drain(..) {
            self.writer.push(id, &v)?;
        }
        Ok(())
    }

    /// Write remaining rows and, for IVF, train and persist the lists.
    /// Returns the files written, relative to the builder's directory.
    pub fn finish_files(mut self) -> QuarryResult<Vec<String>> {
        self.flush()?;
        let Self {
            dir,
            config,
            dims,
            writer,
            training,
            ..
        } = self;
        let rows = writer.finish()?;
        let mut files = vec![VECTORS_FILE.to_string()];

        if config.structure == DenseStructure::Ivf {
            let centroids = ivf::train(config.metric, &training, dims, config.n_lists, config.kmeans_iterations);
            drop(training);
            let mut lists = IvfLists::with_centroids(centroids);
            let mut reader = VectorFileReader::open(&dir.join(VECTORS_FILE), Some(dims))?;
            let mut buf = Vec::with_capacity(dims);
            let mut row = 0u32;
            while reader.next_row(&mut buf)?.is_some() {
                lists.assign(config.metric, row, &buf);
                row += 1;
            }
            lists.write(&dir)?;
            info!(rows, lists = lists.centroids.len(), "ivf lists trained");
            files.push(IVF_FILE.to_string());
        }
        Ok(files)
    }
}

impl IndexBuilder for DenseBuilder {
    fn add_batch(&mut self, items: &[IndexItem]) -> QuarryResult<()> {
        for item in items {
            let vector = item.vector.as_deref().ok_or_else(|| QuarryError::InvalidArgument {
                reason: format!("record {} has no vector", item.id),
            })?;
            self.push(item.id, vector)?;
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> QuarryResult<Vec<String>> {
        (*self).finish_files()
    }
}

/// Loaded dense rows plus the optional quantizer.
pub struct DenseIndex {
    config: DenseIndexConfig,
    rows: VectorRows,
    ivf: Option<IvfLists>,
}

impl DenseIndex {
    pub fn load(dir: &Path, config: &DenseIndexConfig, dims: usize) -> QuarryResult<Self> {
        let rows = VectorRows::load(&dir.join(VECTORS_FILE), dims)?;
        let ivf = match config.structure {
            DenseStructure::Ivf => Some(IvfLists::load(dir, rows.len(), dims)?),
            DenseStructure::Flat => None,
        };
        Ok(Self {
            config: config.clone(),
            rows,
            ivf,
        })
    }

    /// Load and check the row count against the manifest.
    pub(crate) fn open_for(dir: &Path, config: &DenseIndexConfig, manifest: &IndexManifest) -> QuarryResult<Self> {
        let dims = manifest
            .encoder
            .as_ref()
            .map(|fp| fp.dimensions)
            .ok_or_else(|| corrupt(dir, "manifest has no encoder fingerprint"))?;
        let index = Self::load(dir, config, dims)?;
        if index.len() as u64 != manifest.record_count {
            return Err(corrupt(
                dir,
                format!(
                    "{} vector rows, manifest records {}",
                    index.len(),
                    manifest.record_count
                ),
            ));
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.rows.dims()
    }

    pub fn search(&self, query: &[f32], k: usize) -> QuarryResult<Vec<ScoredId>> {
        if query.len() != self.dims() {
            return Err(QuarryError::DimensionMismatch {
                expected: self.dims(),
                actual: query.len(),
            });
        }
        if k == 0 || self.rows.is_empty() {
            return Ok(Vec::new());
        }
        let mut q = query.to_vec();
        metric::prepare(self.config.metric, &mut q);

        let top = match &self.ivf {
            None => self.scan_all(&q, k),
            Some(ivf) => {
                let probes = ivf.probe(self.config.metric, &q, self.config.n_probe);
                let candidates: Vec<usize> = probes
                    .iter()
                    .flat_map(|&p| ivf.lists[p].iter().map(|&r| r as usize))
                    .collect();
                debug!(probes = probes.len(), candidates = candidates.len(), "ivf probe");
                self.scan_rows(&candidates, &q, k)
            }
        };
        Ok(top.into_sorted_vec())
    }

    fn hit(&self, row: usize, q: &[f32]) -> ScoredId {
        ScoredId {
            id: self.rows.id(row),
            score: metric::score(self.config.metric, q, self.rows.row(row)),
        }
    }

    fn scan_all(&self, q: &[f32], k: usize) -> TopK {
        let n = self.rows.len();
        if n < self.config.parallel_scan_threshold {
            self.top_sequential(0..n, q, k)
        } else {
            self.top_parallel((0..n).into_par_iter(), q, k)
        }
    }

    fn scan_rows(&self, rows: &[usize], q: &[f32], k: usize) -> TopK {
        if rows.len() < self.config.parallel_scan_threshold {
            self.top_sequential(rows.iter().copied(), q, k)
        } else {
            self.top_parallel(rows.par_iter().copied(), q, k)
        }
    }

    fn top_sequential(&self, rows: impl Iterator<Item = usize>, q: &[f32], k: usize) -> TopK {
        let mut top = TopK::new(k);
        rows.for_each(|r| top.push(self.hit(r, q)));
        top
    }

    fn top_parallel(&self, rows: impl ParallelIterator<Item = usize>, q: &[f32], k: usize) -> TopK {
        rows.fold(
            || TopK::new(k),
            |mut top, r| {
                top.push(self.hit(r, q));
                top
            },
        )
        .reduce(
            || TopK::new(k),
            |mut a, b| {
                a.merge(b);
                a
            },
        )
    }
}

pub struct DenseHandle {
    manifest: IndexManifest,
    index: DenseIndex,
}

impl IndexHandle for DenseHandle {
    fn search(&self, query: &SearchQuery, k: usize) -> QuarryResult<Vec<ScoredId>> {
        let hits = self.index.search(query.require_vector()?, k)?;
        debug!(k, hits = hits.len(), "dense search");
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }
}
