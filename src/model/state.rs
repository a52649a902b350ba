/// Registration lifecycle of the Qt installation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    /// No root folder registered yet.
    #[default]
    Unconfigured,
    /// A root is registered and a scan is running.
    Scanning,
    /// A scan finished; the persisted set may still be empty.
    Configured,
}

impl FlowState {
    pub fn label(&self) -> &'static str {
        match self {
            FlowState::Unconfigured => "UNCONFIGURED",
            FlowState::Scanning => "SCANNING",
            FlowState::Configured => "CONFIGURED",
        }
    }
}
