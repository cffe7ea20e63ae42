/// The stage of the pipeline a status message refers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Capturing,
    Splitting,
    Merging,
    Writing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Capturing => "Capturing",
            Self::Splitting => "Splitting",
            Self::Merging => "Merging",
            Self::Writing => "Writing",
        };
        write!(f, "{name}")
    }
}

/// Progress message sent from the pipeline to whoever is watching (the CLI progress bar)
///
/// `run_number` is 0 until the run directory has been allocated, which happens after capture.
#[derive(Debug, Clone, Default)]
pub struct PipelineStatus {
    pub progress: f32,
    pub stage: Stage,
    pub run_number: u32,
}

impl PipelineStatus {
    pub fn new(progress: f32, stage: Stage, run_number: u32) -> Self {
        Self {
            progress,
            stage,
            run_number,
        }
    }
}
