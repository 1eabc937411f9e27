/// Optional backend behaviour exercised by the suite.
#[derive(Clone, Copy, Debug, Default)]
pub struct Capabilities {
    /// Honors sub-second expiries, so the expiry case can run without long sleeps.
    pub short_expiry: bool,
}

impl Capabilities {
    pub const fn with_short_expiry(mut self) -> Self {
        self.short_expiry = true;
        self
    }
}
