//! Attribution credits displayed on screen.

/// A data-source credit. Two credits are the same when their names match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScreenCredit {
    pub name: String,
    pub link: Option<String>,
}

impl ScreenCredit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}
