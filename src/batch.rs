//! Batch digitization on a bounded worker pool.
//!
//! Jobs are spawned onto a dedicated rayon pool and report back over a
//! channel in completion order. Every job builds its own [`Digitizer`] from
//! the shared configuration. The collector sorts results by submission index
//! before returning them.
use crate::config::DigitizerConfig;
use crate::error::Result;
use crate::image::RasterImage;
use crate::pipeline::{Digitization, Digitizer};
use crate::types::LeadRegion;
use log::{debug, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::mpsc;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Worker threads; 0 uses rayon's default.
    pub workers: usize,
}

/// One file to digitize.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchJob {
    pub path: PathBuf,
    pub regions: Vec<LeadRegion>,
}

/// Result of the job submitted at `index`.
#[derive(Debug)]
pub struct BatchItem {
    pub index: usize,
    pub outcome: Result<Digitization>,
}

pub struct BatchProcessor {
    config: DigitizerConfig,
    pool: ThreadPool,
}

impl BatchProcessor {
    pub fn new(config: DigitizerConfig) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.batch.workers)
            .thread_name(|i| format!("digitize-{i}"))
            .build()?;
        debug!("batch: pool with {} workers", pool.current_num_threads());
        Ok(Self { config, pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn process_files(&self, jobs: &[BatchJob]) -> Vec<BatchItem> {
        self.run(jobs.len(), |digitizer, i| {
            digitizer.process_path(&jobs[i].path, &jobs[i].regions)
        })
    }

    pub fn process_images(&self, jobs: &[(RasterImage, Vec<LeadRegion>)]) -> Vec<BatchItem> {
        self.run(jobs.len(), |digitizer, i| {
            let (image, regions) = &jobs[i];
            digitizer.process(image, regions)
        })
    }

    fn run<F>(&self, count: usize, job: F) -> Vec<BatchItem>
    where
        F: Fn(&Digitizer, usize) -> Result<Digitization> + Sync,
    {
        let (tx, rx) = mpsc::channel::<BatchItem>();
        let job = &job;
        let config = &self.config;
        self.pool.scope(|s| {
            for index in 0..count {
                let tx = tx.clone();
                s.spawn(move |_| {
                    let digitizer = Digitizer::new(config.clone());
                    let outcome = job(&digitizer, index);
                    if let Err(e) = &outcome {
                        warn!("batch: job {index} failed: {e}");
                    }
                    // The receiver outlives the scope.
                    let _ = tx.send(BatchItem { index, outcome });
                });
            }
        });
        drop(tx);
        let mut items: Vec<BatchItem> = rx.into_iter().collect();
        items.sort_by_key(|item| item.index);
        debug!("batch: {} of {} jobs collected", items.len(), count);
        items
    }
}
