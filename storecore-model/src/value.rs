/// The payload an [`crate::Update`] carries: a byte-string value, or a
/// tombstone recording that the key was deleted at this version. A
/// distinguished "no such version visible" value is represented at the
/// API boundary as `Option<Vec<u8>>`, not as a variant here, so a
/// tombstone and "never existed" both read back as `None` to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateValue {
    Data(Vec<u8>),
    Tombstone,
}

impl UpdateValue {
    /// Project this update's payload to the `Option<Vec<u8>>` callers see:
    /// `None` for a tombstone, `Some(bytes)` for live data.
    pub fn as_visible(&self) -> Option<Vec<u8>> {
        match self {
            UpdateValue::Data(bytes) => Some(bytes.clone()),
            UpdateValue::Tombstone => None,
        }
    }
}
