/// Events emitted while a docking run advances.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// A docking run over `total_poses` start poses begins.
    RunStart { total_poses: u64 },
    /// One start pose went through every minimization stage.
    PoseFinished {
        pose: usize,
        energy: f64,
        iterations: usize,
    },
    /// Minimization of a pose stopped early on a minimizer failure; the pose is kept.
    PoseFailed { pose: usize, reason: String },
    RunFinish,
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Optional sink for [`Progress`] events. Reporting is a no-op without a callback.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.callback.is_none()
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
