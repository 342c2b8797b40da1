//! Result annotation: attach codec/system labels to parsed test files

use crate::model::{SubjectResult, Trial};
use crate::normalize::{codec_name, CodecMap};
use crate::Result;
use tracing::debug;

/// Label every test file of one trial
pub fn annotate_trial(trial: &mut Trial, codec_map: Option<&CodecMap>) -> Result<()> {
    for file in trial.files.iter_mut() {
        let mut label = codec_name(&file.file_name, &trial.name)?;
        if let Some(map) = codec_map {
            label = map.remap(&label)?;
        }
        file.label = Some(label);
    }
    Ok(())
}

/// Label every test file of a freshly parsed subject result
///
/// Labels are derived from the file and trial names only, so annotating twice
/// yields the same labels. Returns the number of files labelled.
///
/// # Errors
/// Fails on the first file whose label cannot be extracted or is missing from
/// the supplied codec map; the result is then partially annotated and should
/// be discarded.
pub fn annotate(result: &mut SubjectResult, codec_map: Option<&CodecMap>) -> Result<usize> {
    let mut labelled = 0;
    for trial in result.trials.iter_mut() {
        annotate_trial(trial, codec_map)?;
        labelled += trial.files.len();
    }

    debug!(
        subject = %result.key,
        files = labelled,
        remapped = codec_map.is_some(),
        "Annotated result with codec labels"
    );

    Ok(labelled)
}
