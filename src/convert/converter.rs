use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn};
use walkdir::WalkDir;

use super::report::{write_report, ConversionStats, FileOutcome, OutcomeStatus};
use crate::config::Settings;
use crate::error::{ConvertError, Result};
use crate::progress::{interpolate, NoProgress, ProgressSink};
use crate::utils::{EpubTextExtractor, PdfTextExtractor};

/// Name of the summary written to the output root after a directory run
pub const REPORT_FILE_NAME: &str = "conversion_report.txt";

/// Input formats the converter dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Epub,
    Pdf,
}

impl DocumentKind {
    /// Detect the kind from the file extension, ignoring case
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "epub" => Some(Self::Epub),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// One input file and where its text goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub skip_existing: bool,
}

impl ConversionJob {
    pub fn new(input: &Path, output_dir: &Path, skip_existing: bool) -> Self {
        Self {
            input: input.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            skip_existing,
        }
    }

    /// Job for `file` found under `input_root`; with `preserve_structure` the
    /// file's relative directory is mirrored under `output_root`
    pub fn in_batch(
        input_root: &Path,
        file: &Path,
        output_root: &Path,
        preserve_structure: bool,
        skip_existing: bool,
    ) -> Self {
        let output_dir = match file.strip_prefix(input_root).ok().and_then(Path::parent) {
            Some(relative_dir) if preserve_structure => output_root.join(relative_dir),
            _ => output_root.to_path_buf(),
        };

        Self {
            input: file.to_path_buf(),
            output_dir,
            skip_existing,
        }
    }

    /// `<output_dir>/<input stem>.txt`
    pub fn output_path(&self) -> PathBuf {
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        self.output_dir.join(format!("{}.txt", stem))
    }
}

enum JobResult {
    Converted { output: PathBuf, chars: usize },
    Skipped { output: PathBuf },
}

/// Converts EPUB and PDF files, singly or a directory at a time, into `.txt` files.
///
/// Conversions take `&mut self`: statistics and outcomes belong to the latest run
/// and are reset when the next one starts.
#[derive(Debug)]
pub struct DocumentConverter {
    epub: EpubTextExtractor,
    pdf: PdfTextExtractor,
    pub preserve_structure: bool,
    pub skip_existing: bool,
    stats: ConversionStats,
    outcomes: Vec<FileOutcome>,
}

impl DocumentConverter {
    /// Converter with the default policy (preserve structure, skip existing)
    pub fn new() -> Result<Self> {
        Ok(Self::with_extractors(
            EpubTextExtractor::new(),
            PdfTextExtractor::new()?,
        ))
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut converter = Self::new()?;
        converter.preserve_structure = settings.preserve_structure;
        converter.skip_existing = settings.skip_existing;
        Ok(converter)
    }

    pub fn with_extractors(epub: EpubTextExtractor, pdf: PdfTextExtractor) -> Self {
        info!("DocumentConverter initialized");
        Self {
            epub,
            pdf,
            preserve_structure: true,
            skip_existing: true,
            stats: ConversionStats::default(),
            outcomes: Vec::new(),
        }
    }

    /// Statistics of the latest run
    pub fn stats(&self) -> &ConversionStats {
        &self.stats
    }

    /// Per-file outcomes of the latest run
    pub fn outcomes(&self) -> &[FileOutcome] {
        &self.outcomes
    }

    /// Convert one file into `<output_dir>/<stem>.txt`.
    ///
    /// Never fails outright: missing inputs, unsupported types and extraction
    /// failures are logged, counted and reported as `false`.
    pub fn convert_file(&mut self, input: &Path, output_dir: &Path, progress: &dyn ProgressSink) -> bool {
        let _span = info_span!("convert_file", input = %input.display()).entered();
        self.reset(1);

        let result = prepare(input, output_dir).and_then(|()| {
            progress.report(10, &format!("Processing {}...", file_name(input)));
            let job = ConversionJob::new(input, output_dir, self.skip_existing);
            self.run_job(&job, progress)
        });

        let success = self.record(input, result);
        if success {
            progress.report(100, "Conversion completed successfully");
        } else {
            progress.report(100, "Conversion failed");
        }

        success
    }

    /// Convert every EPUB and PDF under `input_dir`, then write
    /// `conversion_report.txt` to `output_dir`.
    ///
    /// Returns true if at least one file was converted (or skipped as already
    /// converted). A failing file never stops the batch.
    pub fn convert_directory(&mut self, input_dir: &Path, output_dir: &Path, progress: &dyn ProgressSink) -> bool {
        let _span = info_span!("convert_directory", input = %input_dir.display()).entered();
        self.reset(0);

        if !input_dir.is_dir() {
            error!("Input directory does not exist: {:?}", input_dir);
            return false;
        }

        if let Err(e) = fs::create_dir_all(output_dir) {
            error!("Cannot create output directory {:?}: {}", output_dir, e);
            return false;
        }

        let files = find_supported_files(input_dir);
        if files.is_empty() {
            warn!("No supported files found in {:?}", input_dir);
            return false;
        }

        let total = files.len();
        self.stats.total_files = total;
        progress.report(5, &format!("Found {} files to convert...", total));

        for (index, file) in files.iter().enumerate() {
            let relative = file.strip_prefix(input_dir).unwrap_or(file);
            let _file_span = info_span!("file", path = %relative.display()).entered();

            progress.report(
                interpolate(10, 80, index, total),
                &format!("Converting {}... ({}/{})", file_name(file), index + 1, total),
            );

            let job = ConversionJob::in_batch(
                input_dir,
                file,
                output_dir,
                self.preserve_structure,
                self.skip_existing,
            );
            let result = fs::create_dir_all(&job.output_dir)
                .map_err(ConvertError::from)
                .and_then(|()| self.run_job(&job, &NoProgress));

            self.record(relative, result);
        }

        progress.report(
            100,
            &format!(
                "Completed: {} successful, {} failed",
                self.stats.successful, self.stats.failed
            ),
        );

        let report_path = output_dir.join(REPORT_FILE_NAME);
        match write_report(&report_path, &self.stats, &self.outcomes) {
            Ok(()) => info!("Conversion report written to {:?}", report_path),
            Err(e) => error!("Cannot write conversion report {:?}: {}", report_path, e),
        }

        info!("Directory conversion finished: {}", self.stats);
        self.stats.successful > 0
    }

    fn reset(&mut self, total_files: usize) {
        self.stats = ConversionStats {
            total_files,
            ..Default::default()
        };
        self.outcomes.clear();
    }

    fn run_job(&self, job: &ConversionJob, progress: &dyn ProgressSink) -> Result<JobResult> {
        let kind = DocumentKind::from_path(&job.input).ok_or_else(|| {
            let ext = job
                .input
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_else(|| "(none)".to_string());
            ConvertError::UnsupportedType(ext)
        })?;

        let output = job.output_path();
        if job.skip_existing && output.exists() {
            info!("Skipping existing file: {:?}", output);
            return Ok(JobResult::Skipped { output });
        }

        let text = match kind {
            DocumentKind::Epub => self.epub.extract(&job.input, progress)?,
            DocumentKind::Pdf => self.pdf.extract(&job.input, progress)?,
        };

        if text.is_empty() {
            return Err(ConvertError::NoText(job.input.clone()));
        }

        fs::write(&output, &text)?;
        info!("Successfully converted {:?} to {:?}", job.input, output);

        Ok(JobResult::Converted {
            output,
            chars: text.chars().count(),
        })
    }

    /// Update stats and outcomes; returns whether the job succeeded
    fn record(&mut self, input: &Path, result: Result<JobResult>) -> bool {
        let (success, status) = match result {
            Ok(JobResult::Converted { output, chars }) => (true, OutcomeStatus::Converted { output, chars }),
            Ok(JobResult::Skipped { output }) => {
                self.stats.skipped += 1;
                (true, OutcomeStatus::Skipped { output })
            }
            Err(e) => {
                match &e {
                    ConvertError::UnsupportedType(_) | ConvertError::NoText(_) => {
                        warn!("{}", e)
                    }
                    _ => error!("Error converting file {:?}: {}", input, e),
                }
                (
                    false,
                    OutcomeStatus::Failed {
                        reason: e.to_string(),
                    },
                )
            }
        };

        if success {
            self.stats.successful += 1;
        } else {
            self.stats.failed += 1;
        }

        self.outcomes.push(FileOutcome {
            input: input.to_path_buf(),
            status,
        });

        success
    }
}

fn prepare(input: &Path, output_dir: &Path) -> Result<()> {
    if !input.exists() {
        return Err(ConvertError::NotFound(input.to_path_buf()));
    }
    fs::create_dir_all(output_dir)?;
    Ok(())
}

/// All `.epub` and `.pdf` files under `dir`, sorted by path.
///
/// Symbolic links are followed, so linked files and directories are included;
/// link cycles are reported by walkdir and skipped.
pub fn find_supported_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Cannot read directory entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| DocumentKind::from_path(entry.path()).is_some())
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
