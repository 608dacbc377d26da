use std::fmt;

/// Where a provisioning run is, or where it stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisionStage {
    Start,
    Locked,
    Inspecting,
    Creating,
    Installing,
    Finalizing,
    Done,
    Failed,
}

impl ProvisionStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProvisionStage::Start => "start",
            ProvisionStage::Locked => "locked",
            ProvisionStage::Inspecting => "inspecting",
            ProvisionStage::Creating => "creating",
            ProvisionStage::Installing => "installing",
            ProvisionStage::Finalizing => "finalizing",
            ProvisionStage::Done => "done",
            ProvisionStage::Failed => "failed",
        }
    }
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered record of the stages one run passed through.
#[derive(Debug, Default)]
pub(crate) struct StageTrail {
    stages: Vec<ProvisionStage>,
}

impl StageTrail {
    pub(crate) fn started() -> Self {
        let mut trail = Self::default();
        trail.enter(ProvisionStage::Start);
        trail
    }

    pub(crate) fn enter(&mut self, stage: ProvisionStage) {
        tracing::debug!(%stage, "provision stage");
        self.stages.push(stage);
    }

    pub(crate) fn into_stages(self) -> Vec<ProvisionStage> {
        self.stages
    }
}
