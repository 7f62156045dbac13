/*!
 * Joins per-segment audio into the final artifacts.
 *
 * Planning is pure: it decides which segments go into which file. Assembly
 * then concatenates the WAV samples of each planned artifact. A missing or
 * exhausted segment breaks the sequence, so every contiguous run of
 * succeeded segments is assembled on its own and the gaps are reported.
 */

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::app_config::{OutputConfig, OutputMode};
use crate::errors::OutputError;
use crate::file_utils::FileManager;
use crate::job::{JobProgress, SegmentStatus};
use crate::synthesis::AudioSegmentResult;

/// Assembly settings
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblySettings {
    pub mode: OutputMode,
    /// Longest duration of one artifact in seconds
    pub max_artifact_duration_secs: f64,
}

impl From<&OutputConfig> for AssemblySettings {
    fn from(config: &OutputConfig) -> Self {
        Self {
            mode: config.mode,
            max_artifact_duration_secs: config.max_artifact_duration_secs,
        }
    }
}

/// One artifact to be written
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPlan {
    /// 1-based part number
    pub part: usize,
    pub path: PathBuf,
    pub segments: Vec<AudioSegmentResult>,
    pub duration_seconds: f64,
}

/// Consecutive segments without audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentGap {
    pub first_index: usize,
    pub last_index: usize,
}

impl SegmentGap {
    pub fn segment_count(&self) -> usize {
        self.last_index - self.first_index + 1
    }
}

/// Everything `assemble` will write
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyPlan {
    pub artifacts: Vec<ArtifactPlan>,
    pub gaps: Vec<SegmentGap>,
}

impl AssemblyPlan {
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.artifacts.iter().map(|a| a.duration_seconds).sum()
    }
}

/// A written artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub part: usize,
    pub first_index: usize,
    pub last_index: usize,
    pub segment_count: usize,
    /// Measured from the written samples
    pub duration_seconds: f64,
}

/// Result of an assembly
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblyReport {
    pub artifacts: Vec<OutputArtifact>,
    pub gaps: Vec<SegmentGap>,
}

impl AssemblyReport {
    pub fn total_duration(&self) -> f64 {
        self.artifacts.iter().map(|a| a.duration_seconds).sum()
    }

    pub fn has_gaps(&self) -> bool {
        !self.gaps.is_empty()
    }
}

/// Output assembler for one document
#[derive(Debug, Clone)]
pub struct OutputAssembler {
    settings: AssemblySettings,
    output_dir: PathBuf,
    stem: String,
}

impl OutputAssembler {
    pub fn new(settings: AssemblySettings, output_dir: impl AsRef<Path>, stem: impl Into<String>) -> Self {
        Self {
            settings,
            output_dir: output_dir.as_ref().to_path_buf(),
            stem: stem.into(),
        }
    }

    /// Artifacts of `source` go to the configured directory or next to the source
    pub fn for_source(config: &OutputConfig, source: &Path) -> Self {
        let output_dir = config.output_dir.clone().unwrap_or_else(|| {
            source
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });
        Self::new(AssemblySettings::from(config), output_dir, FileManager::file_stem(source))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<stem>.wav` for a single artifact, `<stem>_partNN.wav` otherwise
    pub fn artifact_path(&self, part: usize, total_parts: usize) -> PathBuf {
        if total_parts <= 1 {
            self.output_dir.join(format!("{}.wav", self.stem))
        } else {
            self.output_dir.join(format!("{}_part{:02}.wav", self.stem, part))
        }
    }

    /// Decide the artifacts for the succeeded segments of `progress`
    pub fn plan(&self, progress: &JobProgress, results: &[AudioSegmentResult]) -> AssemblyPlan {
        let by_index: HashMap<usize, &AudioSegmentResult> = results.iter().map(|r| (r.index, r)).collect();
        let ceiling = self.settings.max_artifact_duration_secs;

        let mut groups: Vec<Vec<AudioSegmentResult>> = Vec::new();
        let mut gaps: Vec<SegmentGap> = Vec::new();
        let mut current: Vec<AudioSegmentResult> = Vec::new();
        let mut current_duration = 0.0;

        for segment in &progress.segments {
            let result = by_index
                .get(&segment.index)
                .filter(|_| segment.status == SegmentStatus::Succeeded);

            let Some(result) = result else {
                // whitespace-only segment, nothing to play
                if segment.status == SegmentStatus::Succeeded && segment.audio_path.is_none() {
                    continue;
                }
                // a gap closes the running artifact
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                    current_duration = 0.0;
                }
                match gaps.last_mut() {
                    Some(gap) if gap.last_index + 1 == segment.index => gap.last_index = segment.index,
                    _ => gaps.push(SegmentGap { first_index: segment.index, last_index: segment.index }),
                }
                continue;
            };

            let closes = match self.settings.mode {
                OutputMode::Separate => !current.is_empty(),
                OutputMode::Single => {
                    !current.is_empty() && current_duration + result.duration_seconds > ceiling
                }
            };
            if closes {
                groups.push(std::mem::take(&mut current));
                current_duration = 0.0;
            }

            current_duration += result.duration_seconds;
            current.push((*result).clone());
        }
        if !current.is_empty() {
            groups.push(current);
        }

        let total_parts = groups.len();
        let artifacts = groups
            .into_iter()
            .enumerate()
            .map(|(i, segments)| ArtifactPlan {
                part: i + 1,
                path: self.artifact_path(i + 1, total_parts),
                duration_seconds: segments.iter().map(|s| s.duration_seconds).sum(),
                segments,
            })
            .collect();

        AssemblyPlan { artifacts, gaps }
    }

    /// Write every planned artifact
    pub async fn assemble(&self, plan: &AssemblyPlan) -> Result<AssemblyReport, OutputError> {
        if plan.is_empty() {
            return Err(OutputError::Empty);
        }

        let output_dir = self.output_dir.clone();
        let plan = plan.clone();
        tokio::task::spawn_blocking(move || assemble_blocking(&output_dir, &plan))
            .await
            .map_err(|e| OutputError::Io(format!("assembly task failed: {}", e)))?
    }
}

fn assemble_blocking(output_dir: &Path, plan: &AssemblyPlan) -> Result<AssemblyReport, OutputError> {
    std::fs::create_dir_all(output_dir)?;

    let mut artifacts = Vec::with_capacity(plan.artifacts.len());
    for artifact in &plan.artifacts {
        artifacts.push(write_artifact(output_dir, artifact)?);
    }

    if !plan.gaps.is_empty() {
        let missing: usize = plan.gaps.iter().map(SegmentGap::segment_count).sum();
        warn!("{} segment(s) missing from the output in {} gap(s)", missing, plan.gaps.len());
    }

    Ok(AssemblyReport { artifacts, gaps: plan.gaps.clone() })
}

fn write_artifact(output_dir: &Path, artifact: &ArtifactPlan) -> Result<OutputArtifact, OutputError> {
    let (first, last) = match (artifact.segments.first(), artifact.segments.last()) {
        (Some(first), Some(last)) => (first.index, last.index),
        _ => return Err(OutputError::Empty),
    };

    let spec = WavReader::open(&first_path(artifact)?)?.spec();
    let temp = NamedTempFile::new_in(output_dir)?;
    let mut frames: u64 = 0;
    {
        let mut writer = WavWriter::new(BufWriter::new(temp.as_file()), spec)?;
        for segment in &artifact.segments {
            let reader = WavReader::open(&segment.audio_path)?;
            if !same_format(&reader.spec(), &spec) {
                return Err(OutputError::Format(format!(
                    "segment {} has format {:?}, expected {:?}",
                    segment.index,
                    reader.spec(),
                    spec
                )));
            }
            frames += u64::from(reader.duration());
            copy_samples(reader, &mut writer)?;
        }
        writer.finalize()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(&artifact.path).map_err(|e| OutputError::Io(e.error.to_string()))?;

    let duration_seconds = frames as f64 / f64::from(spec.sample_rate);
    info!(
        "Wrote {} ({} segments, {:.1}s)",
        artifact.path.display(),
        artifact.segments.len(),
        duration_seconds
    );

    Ok(OutputArtifact {
        path: artifact.path.clone(),
        part: artifact.part,
        first_index: first,
        last_index: last,
        segment_count: artifact.segments.len(),
        duration_seconds,
    })
}

fn first_path(artifact: &ArtifactPlan) -> Result<PathBuf, OutputError> {
    artifact
        .segments
        .first()
        .map(|s| s.audio_path.clone())
        .ok_or(OutputError::Empty)
}

fn same_format(a: &WavSpec, b: &WavSpec) -> bool {
    a.channels == b.channels
        && a.sample_rate == b.sample_rate
        && a.bits_per_sample == b.bits_per_sample
        && a.sample_format == b.sample_format
}

/// Append every sample of `reader` to `writer` in the reader's own format
fn copy_samples<R, W>(reader: WavReader<R>, writer: &mut WavWriter<W>) -> Result<(), OutputError>
where
    R: Read,
    W: Write + Seek,
{
    let spec = reader.spec();
    debug!("Copying {} frames", reader.duration());
    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, _) => {
            for sample in reader.into_samples::<f32>() {
                writer.write_sample(sample?)?;
            }
        }
        (SampleFormat::Int, bits) if bits <= 16 => {
            for sample in reader.into_samples::<i16>() {
                writer.write_sample(sample?)?;
            }
        }
        (SampleFormat::Int, _) => {
            for sample in reader.into_samples::<i32>() {
                writer.write_sample(sample?)?;
            }
        }
    }
    Ok(())
}

/// Read the duration of a committed segment file
pub fn wav_duration(path: &Path) -> Result<f64, OutputError> {
    let reader = WavReader::new(BufReader::new(std::fs::File::open(path)?))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(OutputError::Format(format!("{} has a sample rate of zero", path.display())));
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobIdentity, SegmentState};
    use crate::providers::audio::silent_wav;
    use tempfile::TempDir;

    const RATE: u32 = 8000;

    fn progress_with(statuses: &[SegmentStatus]) -> JobProgress {
        let identity = JobIdentity {
            source_path: PathBuf::from("livro.txt"),
            source_hash: "h".to_string(),
            provider: "mock".to_string(),
            model: "silence".to_string(),
            voice: "v".to_string(),
            max_unit_size: 100,
        };
        let mut progress = JobProgress::new("job", &identity, statuses.len());
        for (segment, status) in progress.segments.iter_mut().zip(statuses) {
            segment.status = status.clone();
        }
        progress
    }

    fn results_for(progress: &JobProgress, dir: &Path, duration: f64) -> Vec<AudioSegmentResult> {
        progress
            .segments
            .iter()
            .filter(|s| s.status == SegmentStatus::Succeeded)
            .map(|s: &SegmentState| {
                let path = dir.join(format!("seg_{:05}.wav", s.index));
                std::fs::write(&path, silent_wav(duration, RATE).unwrap()).unwrap();
                AudioSegmentResult { index: s.index, audio_path: path, duration_seconds: duration }
            })
            .collect()
    }

    fn assembler(dir: &Path, mode: OutputMode, ceiling: f64) -> OutputAssembler {
        let settings = AssemblySettings { mode, max_artifact_duration_secs: ceiling };
        OutputAssembler::new(settings, dir.join("out"), "livro")
    }

    #[test]
    fn test_plan_allSucceeded_shouldMakeSingleArtifact() {
        let temp = TempDir::new().unwrap();
        let progress = progress_with(&vec![SegmentStatus::Succeeded; 3]);
        let results = results_for(&progress, temp.path(), 1.0);

        let plan = assembler(temp.path(), OutputMode::Single, 43_200.0).plan(&progress, &results);

        assert_eq!(plan.artifacts.len(), 1);
        assert!(plan.gaps.is_empty());
        assert_eq!(plan.artifacts[0].path, temp.path().join("out").join("livro.wav"));
        assert!((plan.total_duration() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_ceiling_shouldSplitAtSegmentBoundary() {
        let temp = TempDir::new().unwrap();
        let progress = progress_with(&vec![SegmentStatus::Succeeded; 5]);
        let results = results_for(&progress, temp.path(), 1.0);

        let plan = assembler(temp.path(), OutputMode::Single, 2.0).plan(&progress, &results);

        let sizes: Vec<usize> = plan.artifacts.iter().map(|a| a.segments.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(plan.artifacts.iter().all(|a| a.duration_seconds <= 2.0));
        assert!(plan.artifacts[0].path.ends_with("livro_part01.wav"));
        assert!(plan.artifacts[2].path.ends_with("livro_part03.wav"));
    }

    #[test]
    fn test_plan_gaps_shouldBreakSequence() {
        let temp = TempDir::new().unwrap();
        let progress = progress_with(&[
            SegmentStatus::Succeeded,
            SegmentStatus::Exhausted,
            SegmentStatus::Exhausted,
            SegmentStatus::Succeeded,
            SegmentStatus::Succeeded,
            SegmentStatus::Pending,
        ]);
        let results = results_for(&progress, temp.path(), 1.0);

        let plan = assembler(temp.path(), OutputMode::Single, 43_200.0).plan(&progress, &results);

        assert_eq!(plan.artifacts.len(), 2);
        assert_eq!(plan.artifacts[1].segments.iter().map(|s| s.index).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(
            plan.gaps,
            vec![
                SegmentGap { first_index: 1, last_index: 2 },
                SegmentGap { first_index: 5, last_index: 5 }
            ]
        );
    }

    #[test]
    fn test_plan_silentSegment_shouldNotBeGap() {
        let temp = TempDir::new().unwrap();
        let progress = progress_with(&vec![SegmentStatus::Succeeded; 3]);
        let mut results = results_for(&progress, temp.path(), 1.0);
        results.remove(1);

        let plan = assembler(temp.path(), OutputMode::Single, 43_200.0).plan(&progress, &results);

        assert!(plan.gaps.is_empty());
        assert_eq!(plan.artifacts.len(), 1);
        assert_eq!(plan.artifacts[0].segments.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_plan_separateMode_shouldKeepOneArtifactPerSegment() {
        let temp = TempDir::new().unwrap();
        let progress = progress_with(&vec![SegmentStatus::Succeeded; 3]);
        let results = results_for(&progress, temp.path(), 1.0);

        let plan = assembler(temp.path(), OutputMode::Separate, 43_200.0).plan(&progress, &results);

        assert_eq!(plan.artifacts.len(), 3);
        assert!(plan.artifacts.iter().all(|a| a.segments.len() == 1));
    }

    #[tokio::test]
    async fn test_assemble_shouldConcatenateSamples() {
        let temp = TempDir::new().unwrap();
        let progress = progress_with(&vec![SegmentStatus::Succeeded; 3]);
        let results = results_for(&progress, temp.path(), 0.5);
        let assembler = assembler(temp.path(), OutputMode::Single, 43_200.0);

        let plan = assembler.plan(&progress, &results);
        let report = assembler.assemble(&plan).await.unwrap();

        assert_eq!(report.artifacts.len(), 1);
        let artifact = &report.artifacts[0];
        assert_eq!((artifact.first_index, artifact.last_index), (0, 2));
        assert!((artifact.duration_seconds - 1.5).abs() < 1e-9);
        assert!((wav_duration(&artifact.path).unwrap() - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_assemble_mismatchedFormats_shouldFail() {
        let temp = TempDir::new().unwrap();
        let progress = progress_with(&vec![SegmentStatus::Succeeded; 2]);
        let mut results = results_for(&progress, temp.path(), 0.5);
        std::fs::write(&results[1].audio_path, silent_wav(0.5, 16_000).unwrap()).unwrap();
        results[1].duration_seconds = 0.5;
        let assembler = assembler(temp.path(), OutputMode::Single, 43_200.0);

        let plan = assembler.plan(&progress, &results);
        assert!(matches!(assembler.assemble(&plan).await, Err(OutputError::Format(_))));
    }

    #[tokio::test]
    async fn test_assemble_nothingSucceeded_shouldBeEmpty() {
        let temp = TempDir::new().unwrap();
        let progress = progress_with(&vec![SegmentStatus::Exhausted; 2]);
        let assembler = assembler(temp.path(), OutputMode::Single, 43_200.0);

        let plan = assembler.plan(&progress, &[]);
        assert_eq!(plan.gaps.len(), 1);
        assert!(matches!(assembler.assemble(&plan).await, Err(OutputError::Empty)));
    }
}
