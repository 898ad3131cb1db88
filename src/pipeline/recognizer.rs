// Expression style recognizer
// Runs the detection stages of one audio item in order and owns its tables

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::trace::{Stage, TraceBuilder, TraceEntry, TraceWriter};
use crate::audio::{AudioClip, AudioError, SpectralFeatureExtractor};
use crate::classify::{
    fuse_classification, select_candidates, CandidateClassifier, ClassifiedCandidate, ClassifierError,
    FusionSummary, TransitionClassifier,
};
use crate::config::RecognizerConfig;
use crate::contour::{
    CadPatternProvider, Direction, Melody, MonotonicCadProvider, OscillationVibratoEstimator,
    VibratoEstimator,
};
use crate::detectors::{LongSlideDetector, SlowBendDetector, SoftVibratoDetector, WildVibratoDetector};
use crate::notes::{prune_short_notes, EsnTable, Interval, RawNote, TsList};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing {input} for item '{item}'")]
    MissingInput { item: String, input: &'static str },

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Worker failed: {0}")]
    Worker(String),
}

/// Inputs of one recording
#[derive(Debug, Clone, Default)]
pub struct AudioItem {
    pub name: String,

    /// Raw transcription; required
    pub notes: Option<Vec<RawNote>>,

    /// Pitch contours; without them the contour stages are skipped
    pub melody: Option<Melody>,

    /// Audio; without it the classification stage is skipped
    pub audio: Option<AudioClip>,
}

impl AudioItem {
    pub fn new(name: impl Into<String>, notes: Vec<RawNote>) -> Self {
        AudioItem {
            name: name.into(),
            notes: Some(notes),
            melody: None,
            audio: None,
        }
    }

    pub fn with_melody(mut self, melody: Melody) -> Self {
        self.melody = Some(melody);
        self
    }

    pub fn with_audio(mut self, audio: AudioClip) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Attach audio decoded from a WAV file
    pub fn with_wav_file(self, path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let audio = AudioClip::from_wav_file(path)?;
        Ok(self.with_audio(audio))
    }
}

/// Per-stage detection counts of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub wild_vibrato: usize,
    pub long_slide: usize,
    pub ascending_patterns: usize,
    pub descending_patterns: usize,
    pub slow_bend: usize,
    pub candidates: usize,
    pub fusion: FusionSummary,
    pub soft_vibrato: usize,
    pub pruned: usize,
}

/// Result of recognizing one item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recognition {
    pub esn: EsnTable,
    pub ts: TsList,
    pub counts: StageCounts,
}

/// Per-item driver of the recognition stages
///
/// Collaborators are shared so one recognizer can serve many items concurrently.
#[derive(Clone)]
pub struct Recognizer {
    config: RecognizerConfig,
    cad_provider: Arc<dyn CadPatternProvider>,
    vibrato_estimator: Arc<dyn VibratoEstimator>,
    classifier: Option<TransitionClassifier>,
    trace: Option<TraceWriter>,
}

impl Default for Recognizer {
    fn default() -> Self {
        Recognizer::new(RecognizerConfig::default())
    }
}

impl Recognizer {
    /// Recognizer with the default CAD provider and vibrato estimator and no classifier
    pub fn new(config: RecognizerConfig) -> Self {
        let vibrato_estimator = Arc::new(OscillationVibratoEstimator::new(config.vibrato.clone()));
        Recognizer {
            config,
            cad_provider: Arc::new(MonotonicCadProvider),
            vibrato_estimator,
            classifier: None,
            trace: None,
        }
    }

    pub fn with_classifier(mut self, classifier: TransitionClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Classify candidates with the spectral feature extractor of the configuration
    pub fn with_candidate_classifier(self, classifier: Arc<dyn CandidateClassifier>) -> Self {
        let extractor = Arc::new(SpectralFeatureExtractor::new(self.config.features.clone()));
        self.with_classifier(TransitionClassifier::new(extractor, classifier))
    }

    pub fn with_cad_provider(mut self, provider: Arc<dyn CadPatternProvider>) -> Self {
        self.cad_provider = provider;
        self
    }

    pub fn with_vibrato_estimator(mut self, estimator: Arc<dyn VibratoEstimator>) -> Self {
        self.vibrato_estimator = estimator;
        self
    }

    pub fn with_trace(mut self, writer: TraceWriter) -> Self {
        self.trace = Some(writer);
        self
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Recognize the expression styles of one item
    pub fn recognize(&self, item: &AudioItem) -> Result<Recognition, PipelineError> {
        let trace = TraceBuilder::run(&item.name);
        log::debug!("Run {} started for '{}'", trace.run_id(), item.name);
        let mut entries = vec![trace.entry(Stage::Start, "recognition started")];

        let result = self.run_stages(item, &trace, &mut entries);
        match &result {
            Ok(recognition) => {
                log::info!(
                    "Recognized '{}': {} notes, {} time segments",
                    item.name,
                    recognition.esn.len(),
                    recognition.ts.len()
                );
                entries.push(trace.with_data(
                    Stage::Complete,
                    "recognition finished",
                    serde_json::json!({ "notes": recognition.esn.len(), "segments": recognition.ts.len() }),
                ));
            }
            Err(e) => {
                log::warn!("Recognition of '{}' failed: {}", item.name, e);
                entries.push(trace.entry(Stage::Complete, format!("recognition failed: {}", e)));
            }
        }

        self.write_trace(&entries);
        result
    }

    fn run_stages(
        &self,
        item: &AudioItem,
        trace: &TraceBuilder,
        entries: &mut Vec<TraceEntry>,
    ) -> Result<Recognition, PipelineError> {
        let raw_notes = item.notes.as_deref().ok_or_else(|| PipelineError::MissingInput {
            item: item.name.clone(),
            input: "raw notes",
        })?;
        let mut counts = StageCounts::default();

        let wild = WildVibratoDetector::new(self.config.wild_vibrato.clone()).detect(raw_notes);
        counts.wild_vibrato = wild.detected;
        entries.push(detected_entry(trace, Stage::WildVibrato, wild.detected));
        let (mut esn, mut ts) = (wild.esn, wild.ts);

        let mut ascending = Vec::new();
        let mut descending = Vec::new();
        match &item.melody {
            Some(melody) => {
                let slides = LongSlideDetector::new(self.config.long_slide.clone()).detect(esn, ts, melody);
                counts.long_slide = slides.detected;
                entries.push(detected_entry(trace, Stage::LongSlide, slides.detected));
                esn = slides.esn;
                ts = slides.ts;

                ascending = self.cad_provider.find_patterns(melody, Direction::Ascending, &self.config.cad);
                descending = self.cad_provider.find_patterns(melody, Direction::Descending, &self.config.cad);
                counts.ascending_patterns = ascending.len();
                counts.descending_patterns = descending.len();
                entries.push(trace.with_data(
                    Stage::Cad,
                    "CAD patterns found",
                    serde_json::json!({ "ascending": ascending.len(), "descending": descending.len() }),
                ));
            }
            None => log::warn!("No melody for '{}', skipping long slide and CAD stages", item.name),
        }

        let bends = SlowBendDetector::new(self.config.slow_bend.clone()).detect(esn, ts, &ascending, &descending);
        counts.slow_bend = bends.detected;
        entries.push(detected_entry(trace, Stage::SlowBend, bends.detected));
        let (esn, ts) = (bends.esn, bends.ts);

        let notes = esn.notes();
        let ascending_windows = select_candidates(&notes, &bends.short_ascending);
        let descending_windows = select_candidates(&notes, &bends.short_descending);
        entries.push(trace.with_data(
            Stage::Candidates,
            "candidate windows selected",
            serde_json::json!({
                "ascending": ascending_windows.len(),
                "descending": descending_windows.len(),
            }),
        ));

        let (classified_ascending, classified_descending) =
            self.classify_candidates(item, &ascending_windows, &descending_windows)?;
        counts.candidates = classified_ascending.len() + classified_descending.len();
        entries.push(trace.with_data(
            Stage::Classification,
            "candidates classified",
            serde_json::json!({
                "ascending": classified_ascending.len(),
                "descending": classified_descending.len(),
            }),
        ));

        let (esn, ts, summary) = fuse_classification(
            esn,
            ts,
            &classified_ascending,
            &classified_descending,
            &self.config.labels,
        );
        counts.fusion = summary;
        entries.push(trace.with_data(
            Stage::Fusion,
            "classifier verdicts fused",
            serde_json::json!({
                "logged": summary.logged,
                "verdicts": summary.verdicts,
                "merged_notes": summary.merged_notes,
            }),
        ));

        let (esn, ts) = match &item.melody {
            Some(melody) => {
                let vibrato = SoftVibratoDetector::new(Arc::clone(&self.vibrato_estimator)).detect(esn, ts, melody);
                counts.soft_vibrato = vibrato.detected;
                entries.push(detected_entry(trace, Stage::SoftVibrato, vibrato.detected));
                (vibrato.esn, vibrato.ts)
            }
            None => {
                log::warn!("No melody for '{}', skipping soft vibrato", item.name);
                (esn, ts)
            }
        };

        let (esn, pruned) = prune_short_notes(esn, &self.config.pruning);
        counts.pruned = pruned;
        entries.push(trace.with_data(
            Stage::Pruning,
            format!("{} short notes pruned", pruned),
            serde_json::json!({ "pruned": pruned }),
        ));

        Ok(Recognition { esn, ts, counts })
    }

    /// Classify the candidate windows of both directions
    fn classify_candidates(
        &self,
        item: &AudioItem,
        ascending_windows: &[Interval],
        descending_windows: &[Interval],
    ) -> Result<(Vec<ClassifiedCandidate>, Vec<ClassifiedCandidate>), PipelineError> {
        log::debug!(
            "Candidate windows: {} ascending, {} descending",
            ascending_windows.len(),
            descending_windows.len()
        );

        if ascending_windows.is_empty() && descending_windows.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let Some(classifier) = &self.classifier else {
            log::warn!("No classifier configured, skipping classification for '{}'", item.name);
            return Ok((Vec::new(), Vec::new()));
        };
        let Some(audio) = &item.audio else {
            log::warn!("No audio for '{}', skipping classification", item.name);
            return Ok((Vec::new(), Vec::new()));
        };

        let ascending_labels = classifier.classify_windows(Direction::Ascending, audio, ascending_windows)?;
        let descending_labels = classifier.classify_windows(Direction::Descending, audio, descending_windows)?;

        Ok((
            ClassifiedCandidate::from_windows(ascending_windows, &ascending_labels)?,
            ClassifiedCandidate::from_windows(descending_windows, &descending_labels)?,
        ))
    }

    fn write_trace(&self, entries: &[TraceEntry]) {
        if let Some(writer) = &self.trace {
            if let Err(e) = writer.write_batch(entries) {
                log::error!("Failed to write trace to {}: {}", writer.path().display(), e);
            }
        }
    }
}

fn detected_entry(trace: &TraceBuilder, stage: Stage, detected: usize) -> TraceEntry {
    trace.with_data(
        stage,
        format!("{} detections", detected),
        serde_json::json!({ "detected": detected }),
    )
}

impl std::fmt::Debug for Recognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recognizer")
            .field("config", &self.config)
            .field("classifier", &self.classifier)
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}
