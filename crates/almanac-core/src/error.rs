use thiserror::Error;

/// Failures that make it impossible to build any view.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// Every day of the week is hidden, so no calendar can be rendered.
    #[error("invalid hidden days: all seven weekdays are hidden ({hidden:?})")]
    AllDaysHidden { hidden: Vec<u8> },

    /// The requested view type is not registered.
    #[error("unknown view type `{0}`")]
    UnknownView(String),
}
