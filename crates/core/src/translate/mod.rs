//! Translation orchestration utilities.
//! This module batches subtitle dialogue, drives a [`Translator`] with retries
//! and writes the translated file next to its validation verdict.

use crate::retry::{retry_delay, TranslateError};
use crate::srt::{self, SubtitleBlock};
use crate::validate::{self, ValidationResult};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, trace, warn};

pub mod openai;
pub mod prompt;

/// Default number of subtitle blocks translated per request.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Default number of batch requests of one file in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Default number of retries after the first attempt of a batch.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default number of files translated at once.
pub const DEFAULT_PARALLEL_FILES: usize = 2;

/// One block's dialogue, labelled by its 1-based position within a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedLine {
    pub index: usize,
    pub text: String,
}

/// Translates a batch of labelled lines, returning the same labels.
#[async_trait]
pub trait Translator: Send + Sync + Clone {
    async fn translate_batch(
        &self,
        lines: &[IndexedLine],
        target_language: &str,
    ) -> Result<Vec<IndexedLine>, TranslateError>;
}

/// Batching, concurrency and retry settings for a translation run.
/// The model and prompt context belong to the [`Translator`] itself.
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Spoken blocks per request.
    pub batch_size: usize,
    /// Batches of one file in flight at once.
    pub concurrency: usize,
    /// Retries after the first attempt before a batch is given up.
    pub max_retries: u32,
    /// Multiplied by the backoff seconds; tests set it to zero.
    pub backoff_unit: Duration,
    /// Files translated at once by [`crate::pipeline::translate_all`].
    pub parallel_files: usize,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: Duration::from_secs(1),
            parallel_files: DEFAULT_PARALLEL_FILES,
        }
    }
}

impl TranslateOptions {
    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(retry_delay(attempt).as_secs().try_into().unwrap_or(u32::MAX))
    }
}

/// Translated blocks plus the source block ranges whose batch gave up.
#[derive(Debug, Clone)]
pub struct TranslatedFile {
    pub blocks: Vec<SubtitleBlock>,
    pub failed_batches: Vec<Range<usize>>,
}

/// Result of translating and validating one file into one language.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub output: PathBuf,
    pub failed_batches: usize,
    pub validation: ValidationResult,
}

#[derive(Clone)]
struct BatchJob {
    id: usize,
    /// Positions in the source block list, one per line.
    positions: Vec<usize>,
    lines: Vec<IndexedLine>,
}

type BatchMessage = (usize, Result<Vec<IndexedLine>, TranslateError>, u128);

/// Spawn a new asynchronous producer for a translation batch.
/// This function sends the translated lines back to the central consumer.
/// Every attempt sends exactly one message; a panicking translator is
/// reported as [`TranslateError::Panicked`].
fn spawn_batch<T: Translator + 'static>(
    job: BatchJob,
    tr: T,
    language: String,
    delay: Duration,
    permits: Arc<Semaphore>,
    tx: mpsc::Sender<BatchMessage>,
) {
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let Ok(_permit) = permits.acquire_owned().await else {
            return;
        };
        let begin = Instant::now();
        let res = AssertUnwindSafe(tr.translate_batch(&job.lines, &language))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(TranslateError::Panicked));
        let elapsed = begin.elapsed().as_millis();
        let _ = tx.send((job.id, res, elapsed)).await;
    });
}

/// Dialogue of a block collapsed to one request line.
fn request_text(block: &SubtitleBlock) -> String {
    block
        .text_lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn plan_batches(blocks: &[SubtitleBlock], batch_size: usize) -> Vec<BatchJob> {
    let spoken: Vec<usize> = (0..blocks.len()).filter(|&i| blocks[i].has_text()).collect();
    spoken
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(id, positions)| BatchJob {
            id,
            positions: positions.to_vec(),
            lines: positions
                .iter()
                .enumerate()
                .map(|(n, &p)| IndexedLine {
                    index: n + 1,
                    text: request_text(&blocks[p]),
                })
                .collect(),
        })
        .collect()
}

/// Why a batch response cannot be accepted as-is, if it cannot.
fn rejection(
    job: &BatchJob,
    res: &Result<Vec<IndexedLine>, TranslateError>,
) -> Option<(String, bool)> {
    match res {
        Ok(lines) if lines.len() != job.lines.len() => Some((
            format!("expected {} lines, got {}", job.lines.len(), lines.len()),
            true,
        )),
        Ok(lines) if lines.iter().any(|l| l.text.trim().is_empty()) => {
            Some(("translator skipped some lines".to_string(), true))
        }
        Ok(_) => None,
        Err(err) => Some((err.to_string(), err.is_retryable())),
    }
}

/// Translate every spoken block of `blocks` into `language`.
///
/// Blocks keep their index and timestamps; silent blocks are never sent.
/// A batch that exhausts its retries keeps whatever usable lines it last
/// produced and is listed in [`TranslatedFile::failed_batches`].
pub async fn translate_blocks<T>(
    blocks: &[SubtitleBlock],
    translator: T,
    language: &str,
    options: &TranslateOptions,
) -> Result<TranslatedFile>
where
    T: Translator + 'static,
{
    trace!("translate_blocks blocks={} lang={}", blocks.len(), language);
    let jobs = plan_batches(blocks, options.batch_size);
    let mut out: Vec<SubtitleBlock> = blocks.to_vec();
    let mut failed_batches = Vec::new();
    if jobs.is_empty() {
        return Ok(TranslatedFile {
            blocks: out,
            failed_batches,
        });
    }

    let permits = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let (tx, mut rx) = mpsc::channel(jobs.len());
    for job in &jobs {
        spawn_batch(
            job.clone(),
            translator.clone(),
            language.to_string(),
            Duration::ZERO,
            permits.clone(),
            tx.clone(),
        );
    }

    let mut attempts = vec![0u32; jobs.len()];
    let mut pending: BTreeMap<usize, (Option<Vec<IndexedLine>>, u128)> = BTreeMap::new();
    let mut next = 0;
    let mut last_ms: Option<u128> = None;
    let mut done_lines = 0;
    let total_lines: usize = jobs.iter().map(|j| j.lines.len()).sum();

    while next < jobs.len() {
        let (id, res, elapsed) = rx
            .recv()
            .await
            .ok_or_else(|| anyhow!("translation channel closed unexpectedly"))?;
        let job = &jobs[id];
        let (first, last) = (job.positions[0] + 1, job.positions[job.positions.len() - 1] + 1);
        match rejection(job, &res) {
            None => {
                pending.insert(id, (res.ok(), elapsed));
            }
            Some((reason, retryable)) if retryable && attempts[id] < options.max_retries => {
                let delay = options.backoff(attempts[id]);
                attempts[id] += 1;
                info!(
                    "retrying blocks {first}-{last} (attempt {}) in {:?}: {reason}",
                    attempts[id], delay
                );
                spawn_batch(
                    job.clone(),
                    translator.clone(),
                    language.to_string(),
                    delay,
                    permits.clone(),
                    tx.clone(),
                );
                continue;
            }
            Some((reason, _)) => {
                warn!("giving up on blocks {first}-{last} for {language}: {reason}");
                failed_batches.push(job.positions[0]..job.positions[job.positions.len() - 1] + 1);
                let partial = res.ok().filter(|lines| lines.len() == job.lines.len());
                pending.insert(id, (partial, elapsed));
            }
        }

        while let Some((lines, elapsed)) = pending.remove(&next) {
            let job = &jobs[next];
            for (n, &pos) in job.positions.iter().enumerate() {
                let text = lines
                    .as_ref()
                    .map(|l| l[n].text.split_whitespace().collect::<Vec<_>>().join(" "))
                    .unwrap_or_default();
                out[pos].text_lines = if text.is_empty() { Vec::new() } else { vec![text] };
            }
            done_lines += job.lines.len();
            if let Some(prev) = last_ms {
                let remaining = total_lines - done_lines;
                if remaining > 0 {
                    let estimate = estimate_remaining(prev, elapsed, remaining, options.batch_size);
                    info!("ETA: {}", format_eta(estimate));
                }
            }
            last_ms = Some(elapsed);
            next += 1;
            info!("{language}: completed {}%", done_lines * 100 / total_lines);
        }
    }

    failed_batches.sort_by_key(|r| r.start);
    Ok(TranslatedFile {
        blocks: out,
        failed_batches,
    })
}

/// Name of the translated file: an `_EN` marker becomes `_<LANG>`, otherwise
/// `_<LANG>` is appended before the extension.
pub fn output_file_name(source_name: &str, language: &str) -> String {
    let tag = format!("_{}", language.to_uppercase());
    let stem = match source_name.len().checked_sub(4) {
        Some(cut)
            if source_name.is_char_boundary(cut)
                && source_name[cut..].eq_ignore_ascii_case(".srt") =>
        {
            &source_name[..cut]
        }
        _ => source_name,
    };
    let renamed = stem.replace("_EN", &tag);
    if renamed.ends_with(&tag) {
        format!("{renamed}.srt")
    } else {
        format!("{stem}{tag}.srt")
    }
}

/// Translate one SRT file into `language` under `output_dir/<language>/`
/// and validate the written result against the source.
pub async fn translate_file<T>(
    source: &Path,
    output_dir: &Path,
    language: &str,
    translator: T,
    options: &TranslateOptions,
) -> Result<FileOutcome>
where
    T: Translator + 'static,
{
    trace!("translate_file source={} lang={}", source.display(), language);
    let filename = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("{} has no file name", source.display()))?;
    let content = String::from_utf8_lossy(&fs::read(source)?).to_string();
    let english = srt::parse(&content);
    let stamp_lines = srt::count_timestamp_lines(&content);
    if stamp_lines != english.len() {
        warn!(
            "{filename}: {stamp_lines} timestamp lines but {} blocks parsed",
            english.len()
        );
    }
    if english.is_empty() {
        warn!("{filename}: no subtitle blocks found");
    }

    let begin = Instant::now();
    let translated = translate_blocks(&english, translator, language, options).await?;

    let lang_dir = output_dir.join(language);
    fs::create_dir_all(&lang_dir)?;
    let output = lang_dir.join(output_file_name(&filename, language));
    let rendered = srt::format(&translated.blocks);
    fs::write(&output, &rendered)?;
    debug!("wrote {}", output.display());

    let validation = validate::validate(&english, &srt::parse(&rendered), &filename, language);
    info!(
        "{filename} -> {} ({:.1}s, match rate {:.1}%)",
        output.display(),
        begin.elapsed().as_secs_f64(),
        validation.match_rate
    );
    Ok(FileOutcome {
        source: source.to_path_buf(),
        output,
        failed_batches: translated.failed_batches.len(),
        validation,
    })
}

/// Estimate remaining time in milliseconds for the translation.
/// The way this works is by averaging `prev_ms` and `curr_ms` and
/// multiplying by the number of batches left.
fn estimate_remaining(prev_ms: u128, curr_ms: u128, remaining: usize, batch: usize) -> u128 {
    let avg = (prev_ms + curr_ms) / 2;
    let batches = remaining.div_ceil(batch.max(1));
    avg * batches as u128
}

/// Format a duration in milliseconds as "X minute Y seconds".
fn format_eta(ms: u128) -> String {
    let total_secs = ms / 1000;
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    let plural = |n: u128| if n == 1 { "" } else { "s" };
    if minutes > 0 {
        format!(
            "{} minute{} {} second{}",
            minutes,
            plural(minutes),
            seconds,
            plural(seconds)
        )
    } else {
        format!("{} second{}", seconds, plural(seconds))
    }
}
