//! Parallel transform stage.
//!
//! Frame files are independent, so reading and transforming them is spread
//! over the [`rayon`] thread pool. Each worker owns the frame it works on;
//! the transform chain is shared read-only. Results are tagged with their
//! source index and put back in index order before encoding.

use std::path::PathBuf;
use std::sync::Mutex;

use ::rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::ReframeError;
use crate::frame::{IndexedFrame, read_frame};
use crate::progress::{CancellationToken, ProgressTracker};
use crate::transform::TransformChain;

pub(crate) fn transform_files(
    chain: &TransformChain,
    files: Vec<(u64, PathBuf)>,
    cancellation: Option<&CancellationToken>,
    tracker: &mut ProgressTracker,
) -> Result<Vec<IndexedFrame>, ReframeError> {
    let tracker = Mutex::new(tracker);

    let results: Result<Vec<IndexedFrame>, ReframeError> = files
        .into_par_iter()
        .map(|(index, path)| {
            if cancellation.is_some_and(CancellationToken::is_cancelled) {
                return Err(ReframeError::Cancelled);
            }
            let frame = chain.apply(IndexedFrame::new(index, read_frame(&path)?))?;
            if let Ok(mut tracker) = tracker.lock() {
                tracker.advance(Some(index));
            }
            Ok(frame)
        })
        .collect();

    let mut frames = results?;
    frames.sort_by_key(|frame| frame.index);
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use image::{Rgb, RgbImage};

    use super::*;
    use crate::error::PipelineStage;
    use crate::progress::NoOpProgress;
    use crate::transform::{Resize, TransformSpec};

    #[test]
    fn results_come_back_in_index_order() {
        let directory = tempfile::tempdir().unwrap();
        let files: Vec<(u64, PathBuf)> = (0..24)
            .map(|index| {
                let path = directory.path().join(format!("{index:03}.png"));
                RgbImage::from_pixel(8, 8, Rgb([index as u8, 0, 0]))
                    .save(&path)
                    .unwrap();
                (index, path)
            })
            .collect();

        let chain = TransformChain::from_spec(
            &TransformSpec::new().with_resize(Resize::Factor(0.5)),
        )
        .unwrap();
        let mut tracker = ProgressTracker::new(Arc::new(NoOpProgress), PipelineStage::Transforming, Some(24), 1);
        let frames = transform_files(&chain, files, None, &mut tracker).unwrap();

        let indices: Vec<u64> = frames.iter().map(|frame| frame.index).collect();
        assert_eq!(indices, (0..24).collect::<Vec<_>>());
        assert!(frames.iter().all(|frame| frame.dimensions() == (4, 4)));
        assert_eq!(frames[7].image.get_pixel(0, 0), &Rgb([7, 0, 0]));
    }

    #[test]
    fn cancelled_token_stops_the_stage() {
        let token = CancellationToken::new();
        token.cancel();
        let chain = TransformChain::from_spec(&TransformSpec::new()).unwrap();
        let mut tracker = ProgressTracker::new(Arc::new(NoOpProgress), PipelineStage::Transforming, None, 1);
        let result = transform_files(&chain, vec![(0, PathBuf::from("x.png"))], Some(&token), &mut tracker);
        assert!(matches!(result, Err(ReframeError::Cancelled)));
    }
}
